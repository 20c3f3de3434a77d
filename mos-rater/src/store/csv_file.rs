//! Local CSV rating store
//!
//! One row per rating. The first three columns (`user_id,audio_file,rating`)
//! match the downloadable export; `created_at` and `submission_id` follow.
//! Files holding only the first three columns are read as well.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_common::{NewRating, RatingRecord, RawRating};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AppendOutcome, RatingStore, StoreError};

const HEADER: [&str; 5] = ["user_id", "audio_file", "rating", "created_at", "submission_id"];

/// Ratings appended to a CSV file
#[derive(Debug)]
pub struct CsvFileStore {
    path: PathBuf,
    /// Serializes appends; holds the submission ids seen so far
    seen: Mutex<HashSet<String>>,
}

impl CsvFileStore {
    /// Open (or create) the ratings file
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let is_empty = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if is_empty {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(HEADER)?;
            tokio::fs::write(&path, into_bytes(writer)?).await?;
            info!("Created ratings file: {}", path.display());
        }

        ensure_trailing_newline(&path).await?;

        let seen = parse(&tokio::fs::read(&path).await?)?
            .into_iter()
            .filter_map(|row| row.submission_id)
            .collect();

        Ok(Self {
            path,
            seen: Mutex::new(seen),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RatingStore for CsvFileStore {
    fn backend_name(&self) -> &'static str {
        "csv"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let mut seen = self.seen.lock().await;
        if seen.contains(&rating.submission_id) {
            debug!("Duplicate submission {} ignored", rating.submission_id);
            return Ok(AppendOutcome::Duplicate);
        }

        let score = rating.score.to_string();
        let created_at = rating.created_at.to_rfc3339();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            rating.user_id.as_str(),
            rating.audio_file.as_str(),
            score.as_str(),
            created_at.as_str(),
            rating.submission_id.as_str(),
        ])?;
        let line = into_bytes(writer)?;

        append_line(&self.path, &line).await?;

        seen.insert(rating.submission_id.clone());
        Ok(AppendOutcome::Inserted)
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(parse(&bytes)?.into_iter().map(|row| row.record).collect())
    }
}

/// Append one encoded row; a partial write is cut back off the file
async fn append_line(path: &Path, line: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::OpenOptions::new().append(true).open(path).await?;
    let original_len = file.metadata().await?.len();

    let written = async {
        file.write_all(line).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(truncate_err) = file.set_len(original_len).await {
            warn!(
                "Could not roll back partial row in {}: {}",
                path.display(),
                truncate_err
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// Terminate a last row left without a newline so the next append starts
/// on its own line
async fn ensure_trailing_newline(path: &Path) -> Result<(), StoreError> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.last().map_or(true, |b| *b == b'\n') {
        return Ok(());
    }

    warn!("{} does not end with a newline, terminating last row", path.display());
    append_line(path, b"\n").await
}

struct CsvRow {
    record: RatingRecord,
    submission_id: Option<String>,
}

fn parse(bytes: &[u8]) -> Result<Vec<CsvRow>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(user_col), Some(file_col), Some(rating_col)) =
        (column("user_id"), column("audio_file"), column("rating"))
    else {
        return Err(StoreError::Malformed(format!(
            "expected header user_id,audio_file,rating, found {:?}",
            headers
        )));
    };
    let created_col = column("created_at");
    let submission_col = column("submission_id");

    let mut rows = Vec::new();
    for result in reader.records() {
        let row = result?;
        let field = |i: Option<usize>| i.and_then(|i| row.get(i)).filter(|v| !v.is_empty());

        rows.push(CsvRow {
            record: RatingRecord {
                user_id: field(Some(user_col)).unwrap_or_default().to_string(),
                audio_file: field(Some(file_col)).unwrap_or_default().to_string(),
                rating: field(Some(rating_col))
                    .map(RawRating::from_text)
                    .unwrap_or(RawRating::Missing),
                created_at: field(created_col)
                    .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
            },
            submission_id: field(submission_col).map(str::to_string),
        });
    }
    Ok(rows)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, StoreError> {
    writer
        .into_inner()
        .map_err(|e| StoreError::Transient(format!("CSV flush failed: {}", e)))
}
