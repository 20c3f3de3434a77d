//! HTTP API handlers for mos-rater

pub mod audio;
pub mod export;
pub mod health;
pub mod sessions;
pub mod summary;
pub mod ui;

pub use audio::audio_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use sessions::session_routes;
pub use summary::summary_routes;
pub use ui::ui_routes;
