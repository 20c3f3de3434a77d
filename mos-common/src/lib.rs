//! # MOS Common Library
//!
//! Shared code for the MOS rating service:
//! - Rating, score and summary models
//! - Audio catalog discovery
//! - Session progress tracking
//! - MOS aggregation and CSV export
//! - Configuration loading

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod ids;
pub mod models;
pub mod session;

pub use aggregate::{aggregate, recompute, Aggregation};
pub use catalog::{list_audio_files, Catalog};
pub use error::{Error, Result};
pub use models::{MosSummary, NewRating, RatingRecord, RawRating, Score};
pub use session::{Progress, SessionState};
