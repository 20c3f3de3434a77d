//! Rating storage backends
//!
//! Every backend implements [`RatingStore`]: an append-only write and a full
//! scan. Orchestration and aggregation only ever see the trait.

use async_trait::async_trait;
use mos_common::config::StoreConfig;
use mos_common::{MosSummary, NewRating, RatingRecord};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod csv_file;
pub mod memory;
pub mod sheets;
pub mod sqlite;
pub mod supabase;

pub use csv_file::CsvFileStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;
pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network failure, timeout, permission or lock contention; the user may retry
    #[error("Store temporarily unavailable: {0}")]
    Transient(String),

    /// Backend cannot work with the given settings
    #[error("Store misconfigured: {0}")]
    Configuration(String),

    /// Backend answered with data that is not a rating table
    #[error("Store returned malformed data: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => StoreError::Configuration(e.to_string()),
            sqlx::Error::Decode(e) => StoreError::Malformed(e.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::Malformed(format!("column {}: {}", index, source))
            }
            sqlx::Error::ColumnNotFound(name) => {
                StoreError::Malformed(format!("column not found: {}", name))
            }
            other => StoreError::Transient(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Transient(format!("request timed out: {}", err))
        } else if err.is_decode() {
            StoreError::Malformed(err.to_string())
        } else if err.is_builder() {
            StoreError::Configuration(err.to_string())
        } else {
            StoreError::Transient(err.to_string())
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Transient(err.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            StoreError::Transient(err.to_string())
        } else {
            StoreError::Malformed(err.to_string())
        }
    }
}

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new row was written
    Inserted,
    /// The submission id was already stored; nothing was written
    Duplicate,
}

/// Append-only rating storage
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Backend identifier (e.g., "csv", "supabase")
    fn backend_name(&self) -> &'static str;

    /// Persist one rating
    ///
    /// On `Err` nothing may be assumed stored; the caller must not advance
    /// the session.
    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError>;

    /// Every stored rating, regardless of who submitted it
    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError>;

    /// Materialize the MOS table where the backend has one
    async fn publish_summary(&self, _rows: &[MosSummary]) -> Result<(), StoreError> {
        Ok(())
    }
}

pub type SharedStore = Arc<dyn RatingStore>;

/// Open the backend described by `config`
///
/// `timeout` bounds every remote call (or pool acquisition for SQLite).
pub async fn open_store(config: &StoreConfig, timeout: Duration) -> Result<SharedStore, StoreError> {
    let store: SharedStore = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::Csv { path } => {
            let path = path
                .clone()
                .ok_or_else(|| StoreError::Configuration("csv store needs a path".to_string()))?;
            Arc::new(CsvFileStore::open(path).await?)
        }
        StoreConfig::Sqlite { path } => {
            let path = path
                .clone()
                .ok_or_else(|| StoreError::Configuration("sqlite store needs a path".to_string()))?;
            Arc::new(SqliteStore::connect(&path, timeout).await?)
        }
        StoreConfig::Supabase {
            url,
            api_key,
            table,
            summary_table,
        } => Arc::new(SupabaseStore::new(
            required(url, "url")?,
            required(api_key, "api_key")?,
            table,
            summary_table.as_deref(),
            timeout,
        )?),
        StoreConfig::Sheets {
            spreadsheet_id,
            worksheet,
            access_token,
            base_url,
        } => {
            let store = SheetsStore::new(
                base_url.as_deref(),
                required(spreadsheet_id, "spreadsheet_id")?,
                worksheet,
                required(access_token, "access_token")?,
                timeout,
            )?;
            // A missing header row makes first-row detection ambiguous later.
            if let Err(e) = store.ensure_header().await {
                tracing::warn!("Could not verify worksheet header: {}", e);
            }
            Arc::new(store)
        }
    };

    tracing::info!("Rating store opened: {}", store.backend_name());
    Ok(store)
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, StoreError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::Configuration(format!("store.{} is not set", key)))
}

/// Map a non-success HTTP status of a remote backend
pub(crate) fn status_error(status: StatusCode, body: &str) -> StoreError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Transient(format!("permission denied ({})", detail))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Transient(detail)
        }
        s if s.is_server_error() => StoreError::Transient(detail),
        _ => StoreError::Configuration(detail),
    }
}
