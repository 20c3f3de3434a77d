//! In-process rating store for tests and demos

use async_trait::async_trait;
use mos_common::{MosSummary, NewRating, RatingRecord};
use std::collections::HashSet;
use tokio::sync::RwLock;

use super::{AppendOutcome, RatingStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<RatingRecord>,
    submissions: HashSet<String>,
    summary: Vec<MosSummary>,
}

/// Ratings kept in memory, deduplicated by submission id
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load records, e.g. rows of mixed quality for aggregation tests
    pub fn with_records(records: Vec<RatingRecord>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records,
                ..Default::default()
            }),
        }
    }

    /// Last summary handed to [`RatingStore::publish_summary`]
    pub async fn published_summary(&self) -> Vec<MosSummary> {
        self.inner.read().await.summary.clone()
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.submissions.insert(rating.submission_id.clone()) {
            return Ok(AppendOutcome::Duplicate);
        }
        inner.records.push(rating.to_record());
        Ok(AppendOutcome::Inserted)
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        Ok(self.inner.read().await.records.clone())
    }

    async fn publish_summary(&self, rows: &[MosSummary]) -> Result<(), StoreError> {
        self.inner.write().await.summary = rows.to_vec();
        Ok(())
    }
}
