use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::index::{is_reserved_sheet, FaqIndex, SheetContent};
use crate::errors::IndexError;
use crate::sheets::SpreadsheetClient;

/// A published index together with the moment it was published.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub index: FaqIndex,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadSummary {
    pub sections: usize,
    pub questions: usize,
    pub skipped_sheets: Vec<String>,
}

/// Owner of the current FAQ snapshot.
///
/// Readers get an `Arc` to a complete snapshot and keep it for as long as
/// they need; a reload builds a new snapshot off to the side and swaps the
/// reference, so a reader never sees a half-built index.
#[derive(Debug)]
pub struct FaqCatalog {
    reserved_prefix: String,
    current: RwLock<Arc<Snapshot>>,
}

impl FaqCatalog {
    pub fn new(reserved_prefix: impl Into<String>) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn publish(&self, index: FaqIndex) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot { index, loaded_at: Some(Utc::now()) });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    /// Pulls every non-reserved sheet, rebuilds the index and publishes it.
    /// On failure the previous snapshot stays in place.
    pub async fn reload(
        &self,
        client: &dyn SpreadsheetClient,
    ) -> Result<ReloadSummary, IndexError> {
        let names = client.list_sheet_names().await?;
        let mut sheets = Vec::with_capacity(names.len());
        let mut skipped_sheets = Vec::new();

        for name in names {
            if is_reserved_sheet(&name, &self.reserved_prefix) {
                debug!(
                    event_name = "faq.catalog.sheet_skipped",
                    sheet = %name,
                    "skipping service sheet"
                );
                skipped_sheets.push(name);
                continue;
            }
            let rows = client.get_rows(&name).await?;
            sheets.push(SheetContent::new(name, rows));
        }

        let index = FaqIndex::build(sheets, &self.reserved_prefix)?;
        let summary = ReloadSummary {
            sections: index.section_count(),
            questions: index.question_count(),
            skipped_sheets,
        };
        self.publish(index);

        info!(
            event_name = "faq.catalog.reloaded",
            sections = summary.sections,
            questions = summary.questions,
            "faq catalog reloaded"
        );
        Ok(summary)
    }
}
