use anyhow::Result;
use flowcall_core::{config_path, load_config};
use flowcall_server::state::AppState;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = load_config(&path)?;

    std::fs::create_dir_all(&config.logging.dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.logging.dir, "flowcall-server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    tracing::info!(config = %path.display(), model = %config.llm.model, "configuration loaded");

    let state = AppState::from_config(&config)?;
    flowcall_server::serve(state, &config.server.bind).await
}
