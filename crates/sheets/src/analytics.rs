use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use faqbot_core::{AnalyticsRecord, AnalyticsSink, SpreadsheetClient};

/// Queues analytics records for a background worker that appends them to
/// the analytics sheet. Recording never waits on the network.
#[derive(Clone, Debug)]
pub struct SheetAnalyticsSink {
    sender: mpsc::Sender<AnalyticsRecord>,
}

/// Handle to the task draining a [`SheetAnalyticsSink`] queue.
#[derive(Debug)]
pub struct AnalyticsWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SheetAnalyticsSink {
    pub fn spawn(
        client: Arc<dyn SpreadsheetClient>,
        sheet_name: impl Into<String>,
        capacity: usize,
    ) -> (Self, AnalyticsWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(drain(client, sheet_name.into(), receiver, stopped));

        (Self { sender }, AnalyticsWorker { stop, handle })
    }
}

impl AnalyticsSink for SheetAnalyticsSink {
    fn record(&self, record: AnalyticsRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => warn!(
                event_name = "analytics.queue_full",
                label = %record.label,
                "analytics queue full, dropping record"
            ),
            Err(TrySendError::Closed(record)) => warn!(
                event_name = "analytics.queue_closed",
                label = %record.label,
                "analytics worker stopped, dropping record"
            ),
        }
    }
}

impl AnalyticsWorker {
    /// Stops accepting records and waits until everything already queued
    /// has been written.
    pub async fn shutdown(self) {
        // The worker may already be gone if every sink was dropped.
        let _ = self.stop.send(());
        if let Err(error) = self.handle.await {
            warn!(
                event_name = "analytics.worker_failed",
                error = %error,
                "analytics worker failed"
            );
        }
    }
}

async fn drain(
    client: Arc<dyn SpreadsheetClient>,
    sheet_name: String,
    mut receiver: mpsc::Receiver<AnalyticsRecord>,
    mut stopped: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            next = receiver.recv() => match next {
                Some(record) => append(client.as_ref(), &sheet_name, record).await,
                None => return,
            },
            _ = &mut stopped => break,
        }
    }

    receiver.close();
    let mut drained = 0usize;
    while let Some(record) = receiver.recv().await {
        append(client.as_ref(), &sheet_name, record).await;
        drained += 1;
    }
    debug!(event_name = "analytics.worker_stopped", drained, "analytics worker stopped");
}

async fn append(client: &dyn SpreadsheetClient, sheet_name: &str, record: AnalyticsRecord) {
    if let Err(error) = client.append_rows(sheet_name, vec![record.to_row()]).await {
        warn!(
            event_name = "analytics.append_failed",
            sheet = sheet_name,
            label = %record.label,
            error = %error,
            "failed to append analytics record"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Local, TimeZone};

    use faqbot_core::{AnalyticsRecord, AnalyticsSink, ChatUser, SpreadsheetClient};

    use super::SheetAnalyticsSink;
    use crate::memory::InMemorySpreadsheet;

    fn user() -> ChatUser {
        ChatUser {
            id: 7,
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
            last_name: Some("Archer".to_string()),
        }
    }

    fn record(label: &str, question: Option<&str>) -> AnalyticsRecord {
        let at = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("valid local time");
        AnalyticsRecord::at(at, &user(), label, question.map(str::to_string))
    }

    #[tokio::test]
    async fn shutdown_flushes_queued_records_in_order() {
        let sheets = Arc::new(InMemorySpreadsheet::new().with_sheet("_Analytics", vec![]));
        let (sink, worker) = SheetAnalyticsSink::spawn(sheets.clone(), "_Analytics", 16);

        sink.record(record("/START", None));
        sink.record(record("General", Some("What are hours?")));
        worker.shutdown().await;

        let rows = sheets.rows("_Analytics").await.expect("analytics sheet");
        assert_eq!(
            rows,
            vec![
                vec![
                    "2026-03-01 09:30:00.000000".to_string(),
                    "alice".to_string(),
                    "Alice Archer".to_string(),
                    "/START".to_string(),
                    String::new(),
                ],
                vec![
                    "2026-03-01 09:30:00.000000".to_string(),
                    "alice".to_string(),
                    "Alice Archer".to_string(),
                    "General".to_string(),
                    "What are hours?".to_string(),
                ],
            ]
        );
    }

    #[tokio::test]
    async fn append_failures_do_not_stop_the_worker() {
        let sheets = Arc::new(InMemorySpreadsheet::new().with_sheet("_Analytics", vec![]));
        sheets.fail_appends(true);
        let (sink, worker) = SheetAnalyticsSink::spawn(sheets.clone(), "_Analytics", 16);

        sink.record(record("General", None));
        sink.record(record("Billing", None));
        worker.shutdown().await;

        assert_eq!(sheets.append_calls(), 2);
        assert_eq!(sheets.rows("_Analytics").await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn recording_after_shutdown_is_dropped_quietly() {
        let sheets = Arc::new(InMemorySpreadsheet::new().with_sheet("_Analytics", vec![]));
        let (sink, worker) = SheetAnalyticsSink::spawn(sheets.clone(), "_Analytics", 4);
        worker.shutdown().await;

        sink.record(record("Late", None));

        assert_eq!(sheets.append_calls(), 0);
        let names = sheets.list_sheet_names().await.expect("names");
        assert_eq!(names, vec!["_Analytics"]);
    }
}
