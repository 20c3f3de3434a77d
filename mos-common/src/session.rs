//! Per-session progress through the catalog
//!
//! Two states: `InProgress` until every file has a confirmed rating, then
//! `Complete`, which is terminal for the session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids;

/// Progress state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    InProgress,
    Complete,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session already rated all {0} files")]
    AlreadyComplete(usize),
}

/// Progress pointer of one rater
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    user_id: String,
    current_index: usize,
    total: usize,
    completed: bool,
}

impl SessionState {
    /// Start a session over a catalog of `total` files with a fresh user id
    pub fn new(total: usize) -> Self {
        Self::with_user_id(ids::new_user_id(), total)
    }

    pub fn with_user_id(user_id: impl Into<String>, total: usize) -> Self {
        Self {
            user_id: user_id.into(),
            current_index: 0,
            total,
            completed: total == 0,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn progress(&self) -> Progress {
        if self.completed {
            Progress::Complete
        } else {
            Progress::InProgress
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Advance past the current file after its rating was stored
    ///
    /// Must only be called once the store confirmed the write.
    pub fn record_success(&mut self) -> Result<Progress, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyComplete(self.total));
        }

        self.current_index += 1;
        if self.current_index >= self.total {
            self.completed = true;
        }
        Ok(self.progress())
    }
}
