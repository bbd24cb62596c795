//! FAQ bot core: the spreadsheet-backed FAQ index and the seams around it.
//!
//! - **Domain** (`domain`) - question keys, sheet rows, sections and the index
//! - **Catalog** (`catalog`) - the published snapshot and its reload path
//! - **Ports** (`sheets`, `analytics`) - spreadsheet access and analytics sinks
//! - **Config** (`config`) - layered file/env configuration

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod sheets;

pub use analytics::{AnalyticsRecord, AnalyticsSink, InMemoryAnalyticsSink, NoopAnalyticsSink};
pub use catalog::{FaqCatalog, ReloadSummary, Snapshot};
pub use domain::index::{FaqIndex, SheetContent, RESERVED_SHEET_PREFIX};
pub use domain::key::QuestionKey;
pub use domain::row::Row;
pub use domain::section::{FaqEntry, QuestionButton, Section};
pub use domain::user::{AdminAllowList, ChatUser};
pub use errors::{IndexError, SheetError};
pub use sheets::SpreadsheetClient;
