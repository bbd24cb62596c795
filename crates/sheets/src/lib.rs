//! Google Sheets backend: service-account auth, the Sheets API v4 client,
//! an in-memory spreadsheet and the queued analytics sink.

pub mod analytics;
pub mod auth;
pub mod client;
pub mod memory;

pub use analytics::{AnalyticsWorker, SheetAnalyticsSink};
pub use auth::{AuthError, ServiceAccountTokenSource, StaticTokenSource, TokenSource};
pub use client::GoogleSheetsClient;
pub use memory::InMemorySpreadsheet;
