//! Live tests against the public Piston API.
//!
//! Run with: cargo test --features integ_test --test piston_live

#[cfg(feature = "integ_test")]
mod tests {
    use std::time::Duration;

    use codebot::languages::{PYTHON, RUST};
    use codebot::piston::PISTON_EXECUTE_URL;
    use codebot::{CodeRunner, PistonClient};

    fn client() -> PistonClient {
        let url = std::env::var("PISTON_URL").unwrap_or_else(|_| PISTON_EXECUTE_URL.to_string());
        PistonClient::new(url, Duration::from_secs(30)).expect("Failed to build client")
    }

    #[tokio::test]
    async fn test_python_prints() {
        let response = client()
            .execute("print(1)\nprint(2)", PYTHON)
            .await
            .expect("Piston call failed");
        assert_eq!(response.run.output, "1\n2\n");
        assert_eq!(response.language, "python");
    }

    #[tokio::test]
    async fn test_rust_compile_error_is_reported() {
        let response = client()
            .execute("fn main() { let x: i32 = \"no\"; }", RUST)
            .await
            .expect("Piston call failed");
        assert!(response.output_text().contains("mismatched types"));
    }
}
