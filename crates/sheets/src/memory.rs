use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use faqbot_core::{SheetError, SpreadsheetClient};

/// Spreadsheet held in memory, in sheet order. Used for local runs and tests.
#[derive(Default)]
pub struct InMemorySpreadsheet {
    sheets: RwLock<Vec<(String, Vec<Vec<String>>)>>,
    fail_reads: AtomicBool,
    fail_appends: AtomicBool,
    append_calls: AtomicUsize,
}

impl InMemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<S: Into<String>>(mut self, name: S, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        self.sheets.get_mut().push((name.into(), rows));
        self
    }

    /// Replaces the rows of a sheet, adding it at the end if it is new.
    pub async fn set_sheet(&self, name: &str, rows: Vec<Vec<String>>) {
        let mut sheets = self.sheets.write().await;
        match sheets.iter().position(|(existing, _)| existing == name) {
            Some(index) => sheets[index].1 = rows,
            None => sheets.push((name.to_string(), rows)),
        }
    }

    pub async fn remove_sheet(&self, name: &str) {
        self.sheets.write().await.retain(|(existing, _)| existing != name);
    }

    pub async fn rows(&self, name: &str) -> Option<Vec<Vec<String>>> {
        let sheets = self.sheets.read().await;
        sheets.iter().find(|(existing, _)| existing == name).map(|(_, rows)| rows.clone())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), SheetError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SheetError::RemoteService("in-memory reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SpreadsheetClient for InMemorySpreadsheet {
    async fn list_sheet_names(&self) -> Result<Vec<String>, SheetError> {
        self.check_reads()?;
        let sheets = self.sheets.read().await;
        Ok(sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn get_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.check_reads()?;
        self.rows(sheet).await.ok_or_else(|| SheetError::NotFound(sheet.to_string()))
    }

    async fn append_rows(&self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SheetError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SheetError::RemoteService("in-memory appends disabled".to_string()));
        }

        let mut sheets = self.sheets.write().await;
        let (_, existing) = sheets
            .iter_mut()
            .find(|(existing, _)| existing == sheet)
            .ok_or_else(|| SheetError::NotFound(sheet.to_string()))?;
        existing.extend(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use faqbot_core::{SheetError, SpreadsheetClient};

    use super::InMemorySpreadsheet;

    #[tokio::test]
    async fn lists_sheets_in_insertion_order() {
        let sheets = InMemorySpreadsheet::new()
            .with_sheet("General", vec![vec!["Q", "A"]])
            .with_sheet("_Analytics", vec![]);

        let names = sheets.list_sheet_names().await.expect("names");
        assert_eq!(names, vec!["General", "_Analytics"]);
    }

    #[tokio::test]
    async fn appends_extend_existing_sheet() {
        let sheets = InMemorySpreadsheet::new().with_sheet("_Analytics", vec![]);

        sheets
            .append_rows("_Analytics", vec![vec!["a".to_string()], vec!["b".to_string()]])
            .await
            .expect("append");

        let rows = sheets.rows("_Analytics").await.expect("sheet exists");
        assert_eq!(rows, vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert_eq!(sheets.append_calls(), 1);
    }

    #[tokio::test]
    async fn missing_sheets_are_not_found() {
        let sheets = InMemorySpreadsheet::new();

        assert_eq!(
            sheets.get_rows("Nope").await,
            Err(SheetError::NotFound("Nope".to_string()))
        );
        assert!(sheets.append_rows("Nope", vec![]).await.expect_err("missing").is_not_found());
    }

    #[tokio::test]
    async fn failure_switches_affect_only_their_operation() {
        let sheets = InMemorySpreadsheet::new().with_sheet("General", vec![vec!["Q", "A"]]);

        sheets.fail_reads(true);
        assert!(sheets.list_sheet_names().await.is_err());
        assert!(sheets.append_rows("General", vec![]).await.is_ok());

        sheets.fail_reads(false);
        sheets.fail_appends(true);
        assert!(sheets.get_rows("General").await.is_ok());
        assert!(sheets.append_rows("General", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn set_sheet_replaces_rows_in_place() {
        let sheets = InMemorySpreadsheet::new()
            .with_sheet("General", vec![vec!["Old", "1"]])
            .with_sheet("Billing", vec![]);

        sheets.set_sheet("General", vec![vec!["New".to_string(), "2".to_string()]]).await;
        sheets.set_sheet("Extra", vec![]).await;
        sheets.remove_sheet("Billing").await;

        assert_eq!(sheets.list_sheet_names().await.expect("names"), vec!["General", "Extra"]);
        assert_eq!(
            sheets.get_rows("General").await.expect("rows"),
            vec![vec!["New".to_string(), "2".to_string()]]
        );
    }
}
