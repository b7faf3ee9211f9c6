use std::sync::Arc;

use travessia_bot::aggregator::Aggregator;
use travessia_bot::config::Config;
use travessia_bot::engine::Engine;
use travessia_bot::llm::{Fallback, NoFallback, OpenAiFallback};
use travessia_bot::notify::{LogNotifier, Notifier, TelegramNotifier};
use travessia_bot::server::{AppState, routes};
use travessia_bot::store::{ClientStore, LibSqlStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stdout and to a daily-rolled file under ./logs.
    let file_appender = tracing_appender::rolling::daily("./logs", "travessia-bot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("🚢 Travessia dos Sonhos v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/zap", config.port);
    eprintln!("   Health:  http://0.0.0.0:{}/health", config.port);

    let store: Arc<dyn ClientStore> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: failed to open database at {}: {e}",
                    config.db_path.display()
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    let notifier: Arc<dyn Notifier> = match (
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    ) {
        (Some(token), Some(chat_id)) => {
            eprintln!("   Telegram: enabled (chat {chat_id})");
            Arc::new(TelegramNotifier::new(token, chat_id))
        }
        _ => {
            eprintln!("   Telegram: disabled (notifications go to the log)");
            Arc::new(LogNotifier)
        }
    };

    let fallback: Arc<dyn Fallback> = match config.openai_api_key.clone() {
        Some(key) => {
            eprintln!("   Fallback: OpenAI ({})", config.openai_model);
            Arc::new(OpenAiFallback::new(key, Some(config.openai_model.clone())))
        }
        None => {
            eprintln!("   Fallback: disabled (canned replies only)");
            Arc::new(NoFallback)
        }
    };

    let state = AppState::new(
        Arc::new(Engine::new(fallback)),
        store,
        Arc::new(Aggregator::new(Arc::clone(&notifier))),
        notifier,
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "webhook server started");
    axum::serve(listener, routes(state)).await?;

    Ok(())
}
