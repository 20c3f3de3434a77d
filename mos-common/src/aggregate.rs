//! Mean Opinion Score aggregation
//!
//! Groups ratings by audio file and averages the usable scores. Records whose
//! rating is missing, non-numeric or off the 1-5 scale are left out of both
//! the sum and the count.

use std::collections::BTreeMap;
use tracing::warn;

use crate::models::{MosSummary, RatingRecord, Score};

/// Result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Per-file summaries keyed by file name
    pub summaries: BTreeMap<String, MosSummary>,
    /// Records excluded because their rating was unusable
    pub skipped: usize,
}

impl Aggregation {
    /// Summaries in file name order
    pub fn rows(&self) -> Vec<MosSummary> {
        self.summaries.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// Compute per-file MOS from the full rating collection
pub fn recompute(records: &[RatingRecord]) -> BTreeMap<String, MosSummary> {
    aggregate(records).summaries
}

/// Like [`recompute`], also reporting how many records were excluded
pub fn aggregate(records: &[RatingRecord]) -> Aggregation {
    let mut totals: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        let Some(value) = usable_score(record) else {
            warn!(
                "Ignoring rating {:?} from {} for {}: not a score between {} and {}",
                record.rating.to_string(),
                record.user_id,
                record.audio_file,
                Score::MIN,
                Score::MAX
            );
            skipped += 1;
            continue;
        };

        let entry = totals.entry(record.audio_file.as_str()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    if skipped > 0 {
        warn!("{} of {} ratings excluded from MOS", skipped, records.len());
    }

    let summaries = totals
        .into_iter()
        .map(|(audio_file, (sum, count))| {
            (
                audio_file.to_string(),
                MosSummary {
                    audio_file: audio_file.to_string(),
                    mean_score: sum / count as f64,
                    count,
                },
            )
        })
        .collect();

    Aggregation { summaries, skipped }
}

fn usable_score(record: &RatingRecord) -> Option<f64> {
    record
        .rating
        .numeric()
        .filter(|v| (f64::from(Score::MIN)..=f64::from(Score::MAX)).contains(v))
}
