use std::path::PathBuf;
use std::sync::Arc;

use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;

use codebot::commands::{busy_text, prompt_text};
use codebot::telegram_log::TelegramLogLayer;
use codebot::{CodeDialogue, Command, Config, PistonClient, SessionRegistry, TelegramClient};

struct BotState {
    dialogue: CodeDialogue<PistonClient, TelegramClient>,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("codebot: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "codebot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = TelegramLogLayer::new(bot.clone(), log_chat_id);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting codebot...");
    info!("Execute endpoint: {}", config.execute_url);
    info!("Collection window: {}s", config.collect_window.as_secs());

    let runner = match PistonClient::new(config.execute_url.clone(), config.request_timeout) {
        Ok(runner) => runner,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let dialogue = CodeDialogue::new(
        SessionRegistry::new(config.collect_window),
        Arc::new(runner),
        Arc::new(TelegramClient::new(bot.clone())),
    );
    let state = Arc::new(BotState { dialogue });

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register command list: {e}");
    }

    let handler = Update::filter_message()
        .branch(teloxide::filter_command::<Command, _>().endpoint(handle_command))
        .branch(dptree::endpoint(handle_text));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match config.webhook {
        Some(webhook) => {
            info!("Receiving updates via webhook {} on {}", webhook.url, webhook.addr);
            let options = webhooks::Options::new(webhook.addr, webhook.url);
            let listener = match webhooks::axum(bot, options).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to set up webhook: {e}");
                    std::process::exit(1);
                }
            };
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Receiving updates via long polling");
            if let Err(e) = bot.delete_webhook().await {
                warn!("Failed to delete webhook: {e}");
            }
            dispatcher.dispatch().await;
        }
    }
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let language = cmd.language();

    let reply = match state.dialogue.start(msg.chat.id, language).await {
        Ok(_) => prompt_text(language, state.dialogue.registry().window()),
        Err(e) => {
            info!("Chat {} asked for {} while busy: {e}", msg.chat.id, language.name);
            busy_text(&e)
        }
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_text(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if state.dialogue.receive_text(msg.chat.id, text).await {
        debug!("Collected line from chat {}", msg.chat.id);
    }

    Ok(())
}
