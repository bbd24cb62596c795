mod bootstrap;
mod health;

use anyhow::Result;
use faqbot_core::config::{AppConfig, LoadOptions};
use tracing::warn;

fn init_logging(config: &AppConfig) {
    use faqbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.catalog.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bot_title = %app.config.telegram.bot_title,
        "faqbot-server started"
    );

    let outcome = app.runner.run_until(wait_for_shutdown()).await;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "faqbot-server stopping"
    );
    app.analytics_worker.shutdown().await;

    outcome
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "could not listen for ctrl-c; shutting down");
    }
}
