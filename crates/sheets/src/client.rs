use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use faqbot_core::config::SheetsConfig;
use faqbot_core::{SheetError, SpreadsheetClient};

use crate::auth::{AuthError, ServiceAccountTokenSource, TokenSource};

const UNPARSABLE_RANGE: &str = "Unable to parse range";

/// Sheets API v4 client scoped to one spreadsheet.
pub struct GoogleSheetsClient {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetMetadata>,
}

#[derive(Debug, Deserialize)]
struct SheetMetadata {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self { http, base_url: base_url.into(), spreadsheet_id: spreadsheet_id.into(), tokens }
    }

    /// Builds a client authenticated with the service account key named in
    /// the configuration.
    pub fn from_config(config: &SheetsConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| AuthError::HttpClient(error.to_string()))?;
        let tokens = ServiceAccountTokenSource::from_file(&config.credentials_path, http.clone())?;

        Ok(Self::new(
            http,
            config.api_base_url.clone(),
            config.spreadsheet_id.clone(),
            Arc::new(tokens),
        ))
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, SheetError> {
        let base = &self.base_url;
        let mut url = Url::parse(base).map_err(|error| {
            SheetError::RemoteService(format!("invalid sheets base url `{base}`: {error}"))
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SheetError::RemoteService(format!("sheets base url `{base}` cannot be a base"))
            })?;
            segments.pop_if_empty().extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()]);
            segments.extend(tail);
        }

        Ok(url)
    }

    async fn bearer(&self) -> Result<String, SheetError> {
        let token = self.tokens.access_token().await?;
        Ok(format!("Bearer {}", token.expose_secret()))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        sheet: Option<&str>,
    ) -> Result<Response, SheetError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .send()
            .await
            .map_err(|error| SheetError::RemoteService(format!("request failed: {error}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_failure(status, &body, sheet))
    }
}

/// A1 range covering a whole sheet. Quotes inside the name are doubled.
pub fn sheet_range(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

fn map_failure(status: StatusCode, body: &str, sheet: Option<&str>) -> SheetError {
    match sheet {
        Some(name)
            if status == StatusCode::NOT_FOUND
                || (status == StatusCode::BAD_REQUEST && body.contains(UNPARSABLE_RANGE)) =>
        {
            SheetError::NotFound(name.to_string())
        }
        _ => SheetError::RemoteService(format!("sheets api returned {status}: {body}")),
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn list_sheet_names(&self) -> Result<Vec<String>, SheetError> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");

        let response = self.send(self.http.get(url), None).await?;
        let metadata: SpreadsheetMetadata = response.json().await.map_err(|error| {
            SheetError::RemoteService(format!("failed to decode spreadsheet metadata: {error}"))
        })?;

        let names: Vec<String> =
            metadata.sheets.into_iter().map(|sheet| sheet.properties.title).collect();
        debug!(
            event_name = "sheets.metadata.fetched",
            spreadsheet_id = %self.spreadsheet_id,
            sheet_count = names.len(),
            "spreadsheet metadata fetched"
        );
        Ok(names)
    }

    async fn get_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let range = sheet_range(sheet);
        let url = self.endpoint(&["values", range.as_str()])?;

        let response = self.send(self.http.get(url), Some(sheet)).await?;
        let values: ValueRange = response.json().await.map_err(|error| {
            SheetError::RemoteService(format!("failed to decode values of `{sheet}`: {error}"))
        })?;

        let rows: Vec<Vec<String>> = values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!(
            event_name = "sheets.values.fetched",
            sheet,
            row_count = rows.len(),
            "sheet rows fetched"
        );
        Ok(rows)
    }

    async fn append_rows(&self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SheetError> {
        let target = format!("{}:append", sheet_range(sheet));
        let mut url = self.endpoint(&["values", target.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");

        let row_count = rows.len();
        self.send(self.http.post(url).json(&json!({ "values": rows })), Some(sheet)).await?;

        debug!(event_name = "sheets.values.appended", sheet, row_count, "rows appended");
        Ok(())
    }
}
