//! Languages the bot can run, pinned to the Piston runtime versions.

use std::fmt;

/// A runtime on the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// Piston language identifier.
    pub name: &'static str,
    pub version: &'static str,
    /// Human-readable name for replies.
    pub display: &'static str,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display, self.version)
    }
}

pub const PYTHON: Language = Language { name: "python", version: "3.10.0", display: "Python" };
pub const DART: Language = Language { name: "dart", version: "2.19.6", display: "Dart" };
pub const JAVASCRIPT: Language = Language { name: "javascript", version: "18.15.0", display: "JavaScript" };
pub const CSHARP: Language = Language { name: "csharp", version: "6.12.0", display: "C#" };
pub const JAVA: Language = Language { name: "java", version: "15.0.2", display: "Java" };
pub const KOTLIN: Language = Language { name: "kotlin", version: "1.8.20", display: "Kotlin" };
pub const LUA: Language = Language { name: "lua", version: "5.4.4", display: "Lua" };
pub const PHP: Language = Language { name: "php", version: "8.2.3", display: "PHP" };
pub const PERL: Language = Language { name: "perl", version: "5.36.0", display: "Perl" };
pub const RUBY: Language = Language { name: "ruby", version: "3.0.1", display: "Ruby" };
pub const RUST: Language = Language { name: "rust", version: "1.68.2", display: "Rust" };
pub const SWIFT: Language = Language { name: "swift", version: "5.3.3", display: "Swift" };
pub const SQLITE3: Language = Language { name: "sqlite3", version: "3.36.0", display: "SQLite" };

/// Every supported runtime, in the order commands are listed.
pub const ALL: [Language; 13] = [
    PYTHON, DART, JAVASCRIPT, CSHARP, JAVA, KOTLIN, LUA, PHP, PERL, RUBY, RUST, SWIFT, SQLITE3,
];
