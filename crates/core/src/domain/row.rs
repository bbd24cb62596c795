use serde::{Deserialize, Serialize};

use crate::errors::IndexError;

/// One FAQ entry as read from a sheet: question in the first cell, answer in
/// the second, anything further kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub question: String,
    pub answer: String,
    pub extra: Vec<String>,
}

impl Row {
    /// `row_number` is 1-based, matching what a sheet editor shows.
    pub fn parse(sheet: &str, row_number: usize, cells: Vec<String>) -> Result<Self, IndexError> {
        let mut cells = cells.into_iter();
        let Some(question) = cells.next() else {
            return Err(IndexError::MalformedRow { sheet: sheet.to_owned(), row_number });
        };
        // The sheet API drops trailing empty cells, so an unanswered question
        // arrives as a single cell.
        let answer = cells.next().unwrap_or_default();

        Ok(Self { question, answer, extra: cells.collect() })
    }

    pub fn is_blank(&self) -> bool {
        self.question.trim().is_empty()
    }
}
