//! CSV downloads
//!
//! Two read-only exports: the MOS summary (`audio_file,MOS`) and the raw
//! ratings (`user_id,audio_file,rating`).

use std::io::Write;
use std::path::Path;

use crate::models::{MosSummary, RatingRecord};
use crate::Result;

pub const SUMMARY_HEADER: [&str; 2] = ["audio_file", "MOS"];
pub const RATINGS_HEADER: [&str; 3] = ["user_id", "audio_file", "rating"];

/// Download name of the summary export
pub const SUMMARY_FILE_NAME: &str = "mos_summary.csv";
/// Download name of the raw ratings export
pub const RATINGS_FILE_NAME: &str = "all_mos_ratings.csv";

/// Encode the MOS summary as CSV
pub fn summary_csv<'a, I>(rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a MosSummary>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        let mos = row.mean_score.to_string();
        writer.write_record([row.audio_file.as_str(), mos.as_str()])?;
    }
    into_bytes(writer)
}

/// Encode raw rating records as CSV
pub fn ratings_csv(records: &[RatingRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RATINGS_HEADER)?;
    for record in records {
        let rating = record.rating.to_string();
        writer.write_record([
            record.user_id.as_str(),
            record.audio_file.as_str(),
            rating.as_str(),
        ])?;
    }
    into_bytes(writer)
}

/// Write the summary artifact next to the other data files
///
/// Each call writes its own temporary file in the target folder and renames
/// it over the target, so readers see one complete version or another.
pub fn write_summary_artifact<'a, I>(rows: I, target: &Path) -> Result<()>
where
    I: IntoIterator<Item = &'a MosSummary>,
{
    let bytes = summary_csv(rows)?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| crate::Error::Io(e.error))?;
    Ok(())
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| crate::Error::Internal(format!("CSV flush failed: {}", e)))
}
