use thiserror::Error;

/// Failures reported by a spreadsheet backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("spreadsheet service failure: {0}")]
    RemoteService(String),
    #[error("sheet not found: {0}")]
    NotFound(String),
}

impl SheetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failures while turning spreadsheet content into an FAQ index.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("malformed row {row_number} in sheet `{sheet}`: row has no cells")]
    MalformedRow { sheet: String, row_number: usize },
    #[error("index invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Sheet(#[from] SheetError),
}
