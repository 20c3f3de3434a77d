//! Rating orchestrator
//!
//! Ties catalog, session tracker, store and aggregator together. A session
//! only advances after the store confirmed the write.

use mos_common::config::{AppConfig, SummaryMode};
use mos_common::export::{self, SUMMARY_FILE_NAME};
use mos_common::ids::{self, SessionToken};
use mos_common::{aggregate, Catalog, MosSummary, NewRating, RatingRecord, Score};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::session::{Session, SessionHandle, SessionRegistry, SessionStatus};
use crate::store::{AppendOutcome, SharedStore, StoreError};
use crate::{ApiError, ApiResult};

/// Coordinates sessions and the rating store
pub struct RatingOrchestrator {
    store: SharedStore,
    sessions: SessionRegistry,
    audio_folder: PathBuf,
    summary_artifact: PathBuf,
    summary_mode: SummaryMode,
    cached_summary: RwLock<Option<Vec<MosSummary>>>,
    /// Held from read through cache write so refreshes publish in order
    refresh_lock: Mutex<()>,
}

impl RatingOrchestrator {
    pub fn new(
        store: SharedStore,
        audio_folder: impl Into<PathBuf>,
        data_folder: &Path,
        summary_mode: SummaryMode,
    ) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            audio_folder: audio_folder.into(),
            summary_artifact: data_folder.join(SUMMARY_FILE_NAME),
            summary_mode,
            cached_summary: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig, store: SharedStore) -> Self {
        Self::new(
            store,
            config.audio_folder.clone(),
            &config.data_folder,
            config.summary_mode,
        )
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn summary_mode(&self) -> SummaryMode {
        self.summary_mode
    }

    pub fn audio_folder(&self) -> &Path {
        &self.audio_folder
    }

    async fn load_catalog(&self) -> ApiResult<Catalog> {
        let folder = self.audio_folder.clone();
        let catalog = tokio::task::spawn_blocking(move || Catalog::load(&folder))
            .await
            .map_err(|e| ApiError::Internal(format!("Catalog listing task failed: {}", e)))??;
        Ok(catalog)
    }

    /// Snapshot the catalog and open a new session over it
    pub async fn start_session(&self) -> ApiResult<SessionStatus> {
        let catalog = self.load_catalog().await?;
        let handle = self.sessions.insert(Session::new(catalog)).await;
        let session = handle.lock().await;

        info!(
            session_id = %session.token,
            user_id = %session.state.user_id(),
            files = session.catalog.len(),
            "Rating session started"
        );
        Ok(session.status())
    }

    pub async fn session_status(&self, token: &SessionToken) -> ApiResult<SessionStatus> {
        let handle = self.session(token).await?;
        let session = handle.lock().await;
        Ok(session.status())
    }

    pub async fn end_session(&self, token: &SessionToken) -> ApiResult<()> {
        if !self.sessions.remove(token).await {
            return Err(unknown_session(token));
        }
        info!(session_id = %token, "Rating session ended");
        Ok(())
    }

    async fn session(&self, token: &SessionToken) -> ApiResult<SessionHandle> {
        self.sessions
            .get(token)
            .await
            .ok_or_else(|| unknown_session(token))
    }

    /// Record the rating for the session's current file
    ///
    /// # Errors
    /// * `Conflict` if the session is complete or `audio_file` is not the
    ///   file the session is waiting for
    /// * `Store` if the append failed; the session does not advance
    pub async fn submit(
        &self,
        token: &SessionToken,
        audio_file: &str,
        score: Score,
    ) -> ApiResult<SessionStatus> {
        let handle = self.session(token).await?;
        let mut session = handle.lock().await;

        if session.state.is_complete() {
            return Err(ApiError::Conflict(format!(
                "Session already rated all {} files",
                session.state.total()
            )));
        }

        let index = session.state.current_index();
        let expected = session
            .current_file()
            .ok_or_else(|| ApiError::Internal(format!("No catalog entry at index {}", index)))?;
        if expected != audio_file {
            return Err(ApiError::Conflict(format!(
                "Expected a rating for '{}', got '{}'",
                expected, audio_file
            )));
        }

        let rating = NewRating::new(session.state.user_id(), audio_file, score)
            .with_submission_id(ids::submission_id(token, index, audio_file));

        let outcome = self.store.append(&rating).await.map_err(|e| {
            warn!(
                session_id = %token,
                audio_file = %audio_file,
                "Rating not stored: {}", e
            );
            e
        })?;

        if outcome == AppendOutcome::Duplicate {
            info!(
                session_id = %token,
                submission_id = %rating.submission_id,
                "Rating was already stored, advancing"
            );
        }

        session
            .state
            .record_success()
            .map_err(|e| ApiError::Conflict(e.to_string()))?;
        let status = session.status();
        drop(session);

        debug!(
            session_id = %token,
            audio_file = %audio_file,
            score = score.value(),
            "Rating stored"
        );

        if self.summary_mode == SummaryMode::Eager {
            if let Err(e) = self.refresh_summary().await {
                warn!("MOS summary refresh failed after append: {}", e);
            }
        }

        Ok(status)
    }

    /// Recompute the MOS table and push it to every summary sink
    pub async fn refresh_summary(&self) -> Result<Vec<MosSummary>, StoreError> {
        let _refresh = self.refresh_lock.lock().await;
        let records = self.store.read_all().await?;
        let rows = aggregate(&records).rows();

        let artifact = self.summary_artifact.clone();
        let artifact_rows = rows.clone();
        match tokio::task::spawn_blocking(move || {
            export::write_summary_artifact(&artifact_rows, &artifact)
        })
        .await
        {
            Ok(Ok(())) => debug!("Wrote {}", self.summary_artifact.display()),
            Ok(Err(e)) => warn!("Could not write {}: {}", self.summary_artifact.display(), e),
            Err(e) => warn!("Summary artifact task failed: {}", e),
        }

        if let Err(e) = self.store.publish_summary(&rows).await {
            warn!("Could not publish MOS summary to {}: {}", self.store.backend_name(), e);
        }

        *self.cached_summary.write().await = Some(rows.clone());
        Ok(rows)
    }

    /// Current MOS table ordered by file name
    pub async fn summary(&self) -> ApiResult<Vec<MosSummary>> {
        match self.summary_mode {
            SummaryMode::Lazy => {
                let records = self.store.read_all().await?;
                Ok(aggregate(&records).rows())
            }
            SummaryMode::Eager => {
                if let Some(rows) = self.cached_summary.read().await.as_ref() {
                    return Ok(rows.clone());
                }
                Ok(self.refresh_summary().await?)
            }
        }
    }

    /// Every stored rating
    pub async fn ratings(&self) -> ApiResult<Vec<RatingRecord>> {
        Ok(self.store.read_all().await?)
    }

    /// Bytes of a file in the current catalog listing
    pub async fn read_audio(&self, name: &str) -> ApiResult<Vec<u8>> {
        let catalog = self.load_catalog().await?;
        if !catalog.contains(name) {
            return Err(ApiError::NotFound(format!("Audio file '{}'", name)));
        }
        catalog
            .read_audio(name)
            .await
            .map_err(|e| ApiError::Internal(format!("Reading '{}': {}", name, e)))
    }
}

fn unknown_session(token: &SessionToken) -> ApiError {
    ApiError::NotFound(format!("Session {}", token))
}
