//! Google Sheets rating store
//!
//! Worksheet columns A-C hold `user_id, audio_file, rating`; the first row
//! is the header.

use async_trait::async_trait;
use mos_common::export::RATINGS_HEADER;
use mos_common::{NewRating, RatingRecord, RawRating};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{status_error, AppendOutcome, RatingStore, StoreError};

pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com/v4";

/// Body of a values read/write
#[derive(Debug, Default, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Ratings appended to a worksheet through the Sheets API v4
#[derive(Debug, Clone)]
pub struct SheetsStore {
    http_client: Client,
    base_url: Url,
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
}

impl SheetsStore {
    pub fn new(
        base_url: Option<&str>,
        spreadsheet_id: &str,
        worksheet: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url.unwrap_or(DEFAULT_SHEETS_API))
            .map_err(|e| StoreError::Configuration(format!("Sheets API URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Configuration(format!(
                "Sheets API URL is not a base URL: {}",
                base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// A1 range on the configured worksheet, e.g. `'Ratings'!A:C`
    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet.replace('\'', "''"), cells)
    }

    fn values_url(&self, last_segment: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values", last_segment]);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    async fn read_range(&self, range: &str) -> Result<Vec<Vec<Value>>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.values_url(range)))
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("worksheet {}: {}", self.worksheet, e)))?;
        Ok(body.values)
    }

    /// Write the header row if the worksheet is empty
    pub async fn ensure_header(&self) -> Result<(), StoreError> {
        let range = self.range("A1:C1");
        if !self.read_range(&range).await?.is_empty() {
            return Ok(());
        }

        let body = ValueRange {
            range: Some(range.clone()),
            values: vec![RATINGS_HEADER.iter().map(|h| json!(h)).collect()],
        };
        let response = self
            .authorized(self.http_client.put(self.values_url(&range)))
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        info!("Wrote header row to worksheet {}", self.worksheet);
        Ok(())
    }
}

fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn is_header(row: &[Value]) -> bool {
    matches!(row.first(), Some(Value::String(s)) if s.trim().eq_ignore_ascii_case(RATINGS_HEADER[0]))
}

fn is_blank(row: &[Value]) -> bool {
    row.iter().all(|cell| match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

#[async_trait]
impl RatingStore for SheetsStore {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let range = self.range("A:C");
        let body = ValueRange {
            range: None,
            values: vec![vec![
                json!(rating.user_id),
                json!(rating.audio_file),
                json!(rating.score.value()),
            ]],
        };

        let response = self
            .authorized(
                self.http_client
                    .post(self.values_url(&format!("{}:append", range))),
            )
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(AppendOutcome::Inserted)
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        let rows = self.read_range(&self.range("A:C")).await?;
        let skip = usize::from(rows.first().map_or(false, |row| is_header(row)));

        let records: Vec<RatingRecord> = rows
            .iter()
            .skip(skip)
            .filter(|row| !is_blank(row))
            .map(|row| RatingRecord {
                user_id: cell_text(row.first()),
                audio_file: cell_text(row.get(1)),
                rating: row.get(2).map(RawRating::from_json).unwrap_or(RawRating::Missing),
                created_at: None,
            })
            .collect();

        debug!("Fetched {} ratings from worksheet {}", records.len(), self.worksheet);
        Ok(records)
    }
}
