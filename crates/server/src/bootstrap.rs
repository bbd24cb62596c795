use std::sync::Arc;

use faqbot_core::config::AppConfig;
use faqbot_core::{FaqCatalog, IndexError, SpreadsheetClient, RESERVED_SHEET_PREFIX};
use faqbot_sheets::{AnalyticsWorker, AuthError, GoogleSheetsClient, SheetAnalyticsSink};
use faqbot_telegram::{
    faq_dispatcher, BotApiTransport, BotTransport, FaqBotService, PollingRunner, ReconnectPolicy,
    TransportError,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<FaqCatalog>,
    pub runner: PollingRunner,
    pub analytics_worker: AnalyticsWorker,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("google credentials unusable: {0}")]
    Credentials(#[from] AuthError),
    #[error("telegram transport setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("initial FAQ load failed: {0}")]
    InitialLoad(#[source] IndexError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        spreadsheet_id = %config.sheets.spreadsheet_id,
        "starting application bootstrap"
    );

    let sheets = GoogleSheetsClient::from_config(&config.sheets)?;
    let transport = BotApiTransport::from_config(&config.telegram)?;

    assemble(config, Arc::new(sheets), Arc::new(transport)).await
}

/// Wires the application around already-built backends. The initial load
/// must succeed; there is nothing to serve otherwise.
pub async fn assemble(
    config: AppConfig,
    sheets: Arc<dyn SpreadsheetClient>,
    transport: Arc<dyn BotTransport>,
) -> Result<Application, BootstrapError> {
    let catalog = Arc::new(FaqCatalog::new(RESERVED_SHEET_PREFIX));
    let summary = catalog.reload(sheets.as_ref()).await.map_err(BootstrapError::InitialLoad)?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        sections = summary.sections,
        questions = summary.questions,
        skipped_sheets = ?summary.skipped_sheets,
        "initial FAQ content loaded"
    );

    let (analytics, analytics_worker) = SheetAnalyticsSink::spawn(
        sheets.clone(),
        config.analytics.sheet_name.clone(),
        config.analytics.queue_capacity,
    );
    let service = FaqBotService::new(
        catalog.clone(),
        sheets,
        config.admin_allow_list(),
        Arc::new(analytics),
        config.telegram.bot_title.clone(),
    );
    let runner = PollingRunner::new(
        transport,
        faq_dispatcher(Arc::new(service)),
        ReconnectPolicy::default(),
        config.telegram.poll_timeout_secs,
    );

    Ok(Application { config, catalog, runner, analytics_worker })
}
