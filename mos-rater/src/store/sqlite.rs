//! SQLite rating store
//!
//! Relational layout:
//! - `mos_ratings(user_id, audio_file, rating, created_at, submission_id)`
//! - `mos_summary(audio_file, mos_score, rating_count, updated_at)`, rewritten
//!   on every [`RatingStore::publish_summary`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_common::{MosSummary, NewRating, RatingRecord, RawRating};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{AppendOutcome, RatingStore, StoreError};

/// Ratings in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database file and its tables
    pub async fn connect(db_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(timeout)
            .connect(&db_url)
            .await?;

        info!("Database: {}", db_path.display());
        Self::from_pool(pool).await
    }

    /// Private in-memory database (single connection so all queries share it)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Use an existing pool, creating the tables if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Rows of the materialized summary table, ordered by file
    pub async fn stored_summary(&self) -> Result<Vec<MosSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT audio_file, mos_score, rating_count FROM mos_summary ORDER BY audio_file",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MosSummary {
                    audio_file: row.try_get("audio_file")?,
                    mean_score: row.try_get("mos_score")?,
                    count: row.try_get::<i64, _>("rating_count")? as u64,
                })
            })
            .collect()
    }
}

async fn init_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mos_ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            audio_file TEXT NOT NULL,
            rating INTEGER,
            created_at TEXT NOT NULL,
            submission_id TEXT UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mos_summary (
            audio_file TEXT PRIMARY KEY,
            mos_score REAL NOT NULL,
            rating_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    debug!("Database tables initialized (mos_ratings, mos_summary)");
    Ok(())
}

/// Decode the rating column by storage class
///
/// The column has INTEGER affinity, but rows written by other tools can hold
/// text or floats.
fn decode_rating(row: &SqliteRow) -> Result<RawRating, StoreError> {
    let raw = row.try_get_raw("rating")?;
    if raw.is_null() {
        return Ok(RawRating::Missing);
    }

    let storage_class = raw.type_info().name().to_string();
    let rating = match storage_class.as_str() {
        "INTEGER" => RawRating::Integer(row.try_get("rating")?),
        "REAL" => RawRating::Float(row.try_get("rating")?),
        "TEXT" => RawRating::from_text(&row.try_get::<String, _>("rating")?),
        other => RawRating::Text(format!("<{}>", other)),
    };
    Ok(rating)
}

#[async_trait]
impl RatingStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO mos_ratings (user_id, audio_file, rating, created_at, submission_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(submission_id) DO NOTHING
            "#,
        )
        .bind(&rating.user_id)
        .bind(&rating.audio_file)
        .bind(i64::from(rating.score.value()))
        .bind(rating.created_at.to_rfc3339())
        .bind(&rating.submission_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Duplicate submission {} ignored", rating.submission_id);
            Ok(AppendOutcome::Duplicate)
        } else {
            Ok(AppendOutcome::Inserted)
        }
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, audio_file, rating, created_at FROM mos_ratings ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let created_at: Option<String> = row.try_get("created_at")?;
                Ok(RatingRecord {
                    user_id: row.try_get("user_id")?,
                    audio_file: row.try_get("audio_file")?,
                    rating: decode_rating(row)?,
                    created_at: created_at
                        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                })
            })
            .collect()
    }

    async fn publish_summary(&self, rows: &[MosSummary]) -> Result<(), StoreError> {
        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mos_summary").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO mos_summary (audio_file, mos_score, rating_count, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&row.audio_file)
            .bind(row.mean_score)
            .bind(row.count as i64)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
