//! Supabase (PostgREST) rating store
//!
//! Table `mos_ratings(user_id, audio_file, rating, created_at)` and an
//! optional materialized `mos_summary(audio_file, mos_score, rating_count)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_common::{MosSummary, NewRating, RatingRecord, RawRating};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{status_error, AppendOutcome, RatingStore, StoreError};

/// Rows fetched per request; PostgREST caps responses server-side
const PAGE_SIZE: usize = 1000;

/// Sort on every selected column so offset pages never overlap. Rows that
/// tie on all of them are identical, so either copy may land on a page.
const PAGE_ORDER: &str = "created_at.asc,user_id.asc,audio_file.asc,rating.asc";

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    audio_file: &'a str,
    rating: u8,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SelectRow {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    audio_file: Option<String>,
    #[serde(default)]
    rating: serde_json::Value,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    audio_file: &'a str,
    mos_score: f64,
    rating_count: u64,
}

/// Ratings in a Supabase table, accessed over the REST API
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    http_client: Client,
    rest_url: String,
    api_key: String,
    table: String,
    summary_table: Option<String>,
}

impl SupabaseStore {
    /// # Arguments
    /// * `project_url` - e.g. `https://xyz.supabase.co`
    /// * `api_key` - anon or service key, sent as `apikey` and bearer token
    /// * `timeout` - bound on every request
    pub fn new(
        project_url: &str,
        api_key: &str,
        table: &str,
        summary_table: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            table: table.to_string(),
            summary_table: summary_table.map(str::to_string),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<SelectRow>, StoreError> {
        let url = format!("{}/{}", self.rest_url, self.table);
        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[
                ("select", "user_id,audio_file,rating,created_at"),
                ("order", PAGE_ORDER),
            ])
            .query(&[("limit", PAGE_SIZE), ("offset", offset)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json::<Vec<SelectRow>>()
            .await
            .map_err(|e| StoreError::Malformed(format!("{}: {}", self.table, e)))
    }
}

/// Accept `timestamptz` (with offset) and `timestamp` (assumed UTC) columns
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[async_trait]
impl RatingStore for SupabaseStore {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let url = format!("{}/{}", self.rest_url, self.table);
        let row = InsertRow {
            user_id: &rating.user_id,
            audio_file: &rating.audio_file,
            rating: rating.score.value(),
            created_at: rating.created_at,
        };

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(AppendOutcome::Inserted),
            // Unique constraint on the table side
            StatusCode::CONFLICT => Ok(AppendOutcome::Duplicate),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body))
            }
        }
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        let mut records = Vec::new();
        loop {
            let page = self.fetch_page(records.len()).await?;
            let last_page = page.len() < PAGE_SIZE;

            records.extend(page.into_iter().map(|row| RatingRecord {
                user_id: row.user_id.unwrap_or_default(),
                audio_file: row.audio_file.unwrap_or_default(),
                rating: RawRating::from_json(&row.rating),
                created_at: row.created_at.as_deref().and_then(parse_timestamp),
            }));

            if last_page {
                break;
            }
        }

        debug!("Fetched {} ratings from {}", records.len(), self.table);
        Ok(records)
    }

    async fn publish_summary(&self, rows: &[MosSummary]) -> Result<(), StoreError> {
        let Some(summary_table) = &self.summary_table else {
            return Ok(());
        };
        if rows.is_empty() {
            return Ok(());
        }

        let url = format!("{}/{}", self.rest_url, summary_table);
        let body: Vec<SummaryRow<'_>> = rows
            .iter()
            .map(|row| SummaryRow {
                audio_file: &row.audio_file,
                mos_score: row.mean_score,
                rating_count: row.count,
            })
            .collect();

        let response = self
            .authorized(self.http_client.post(&url))
            .query(&[("on_conflict", "audio_file")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(())
    }
}
