use invoicing_api::config::Config;
use invoicing_api::services::metrics::init_metrics;
use invoicing_api::Application;
use platform_core::observability::logging::init_tracing;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    let log_level = env::var("INVOICING_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_json = env::var("INVOICING_LOG_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    init_tracing(&config.service_name, &log_level, log_json);

    init_metrics();

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    info!("Listening on port {}", application.port());
    application.run_until_stopped().await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
