use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::domain::user::ChatUser;

/// Label recorded for the `/start` command.
pub const START_LABEL: &str = "/START";

/// One user interaction, appended as a row to the analytics sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalyticsRecord {
    pub occurred_at: DateTime<Local>,
    pub username: Option<String>,
    pub display_name: String,
    pub label: String,
    pub question: Option<String>,
}

impl AnalyticsRecord {
    pub fn new(user: &ChatUser, label: impl Into<String>, question: Option<String>) -> Self {
        Self::at(Local::now(), user, label, question)
    }

    pub fn at(
        occurred_at: DateTime<Local>,
        user: &ChatUser,
        label: impl Into<String>,
        question: Option<String>,
    ) -> Self {
        Self {
            occurred_at,
            username: user.username.clone(),
            display_name: user.display_name(),
            label: label.into(),
            question,
        }
    }

    /// Cells in sheet column order: timestamp, username, display name,
    /// section or command, question. User-supplied cells are kept literal.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.occurred_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            literal_cell(self.username.as_deref().unwrap_or_default()),
            literal_cell(&self.display_name),
            literal_cell(&self.label),
            literal_cell(self.question.as_deref().unwrap_or_default()),
        ]
    }
}

/// Rows are appended with `USER_ENTERED`, so text starting with a formula
/// trigger would be evaluated. A leading `'` makes Sheets store it as text.
fn literal_cell(text: &str) -> String {
    if text.starts_with(['=', '+', '-', '@']) {
        format!("'{text}")
    } else {
        text.to_owned()
    }
}

/// Best-effort destination for analytics records.
///
/// `record` never fails and never blocks on I/O; delivery problems are the
/// sink's to log.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, record: AnalyticsRecord);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAnalyticsSink;

impl AnalyticsSink for NoopAnalyticsSink {
    fn record(&self, _record: AnalyticsRecord) {}
}

/// Keeps records in memory; used by tests and local dry runs.
#[derive(Debug, Default)]
pub struct InMemoryAnalyticsSink {
    records: Mutex<Vec<AnalyticsRecord>>,
}

impl InMemoryAnalyticsSink {
    pub fn records(&self) -> Vec<AnalyticsRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

impl AnalyticsSink for InMemoryAnalyticsSink {
    fn record(&self, record: AnalyticsRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
