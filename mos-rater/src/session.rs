//! Live rating sessions
//!
//! Sessions live in memory only; a restart forgets them. Each entry has its
//! own async mutex so a session handles one submission at a time while
//! other sessions proceed in parallel.

use chrono::{DateTime, Utc};
use mos_common::ids::{self, SessionToken};
use mos_common::{Catalog, Progress, SessionState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One rater's pass over a catalog snapshot
#[derive(Debug)]
pub struct Session {
    pub token: SessionToken,
    pub state: SessionState,
    pub catalog: Catalog,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            token: ids::new_session_token(),
            state: SessionState::new(catalog.len()),
            catalog,
            started_at: Utc::now(),
        }
    }

    /// File awaiting a rating, `None` once complete
    pub fn current_file(&self) -> Option<&str> {
        if self.state.is_complete() {
            None
        } else {
            self.catalog.get(self.state.current_index())
        }
    }

    pub fn status(&self) -> SessionStatus {
        let total = self.state.total();
        let index = self.state.current_index();
        let progress_label = match self.state.progress() {
            Progress::InProgress => format!("File {} of {}", index + 1, total),
            Progress::Complete => format!("All {} files rated", total),
        };

        SessionStatus {
            token: self.token,
            user_id: self.state.user_id().to_string(),
            progress: self.state.progress(),
            current_index: index,
            total,
            current_file: self.current_file().map(str::to_string),
            progress_label,
        }
    }
}

/// Session view returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub token: SessionToken,
    pub user_id: String,
    pub progress: Progress,
    pub current_index: usize,
    pub total: usize,
    pub current_file: Option<String>,
    pub progress_label: String,
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Token-keyed session table
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionToken, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) -> SessionHandle {
        let token = session.token;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(token, handle.clone());
        handle
    }

    pub async fn get(&self, token: &SessionToken) -> Option<SessionHandle> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Drop a session; false if the token was unknown
    pub async fn remove(&self, token: &SessionToken) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
