use async_trait::async_trait;

use crate::errors::SheetError;

/// Access to the spreadsheet that backs the FAQ and its analytics sheet.
///
/// Every call is a round trip to the remote service; implementations do not
/// cache and do not retry.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Sheet names in document order.
    async fn list_sheet_names(&self) -> Result<Vec<String>, SheetError>;

    /// All rows of a sheet. Rows keep the width the service returned.
    async fn get_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError>;

    /// Appends rows after the last non-empty row of a sheet.
    async fn append_rows(&self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SheetError>;
}
