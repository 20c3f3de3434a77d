//! Configuration loading and resolution
//!
//! Priority order, highest first:
//! 1. Command-line argument (or its `MOS_*` environment fallback)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing TOML file is not an error: a warning is logged and defaults
//! apply. Missing store credentials are.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

pub const DEFAULT_AUDIO_FOLDER: &str = "audio_files";
pub const DEFAULT_DATA_FOLDER: &str = ".";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_RATINGS_CSV: &str = "mos_ratings.csv";
pub const DEFAULT_SQLITE_DB: &str = "mos.db";
pub const DEFAULT_RATINGS_TABLE: &str = "mos_ratings";
pub const DEFAULT_SUMMARY_TABLE: &str = "mos_summary";
pub const DEFAULT_WORKSHEET: &str = "Ratings";

pub const ENV_SUPABASE_URL: &str = "MOS_SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "MOS_SUPABASE_KEY";
pub const ENV_SHEETS_ID: &str = "MOS_SHEETS_ID";
pub const ENV_SHEETS_TOKEN: &str = "MOS_SHEETS_TOKEN";

/// When the MOS summary is recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
    /// After every successful append
    #[default]
    Eager,
    /// Whenever a summary is requested
    Lazy,
}

impl FromStr for SummaryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(SummaryMode::Eager),
            "lazy" => Ok(SummaryMode::Lazy),
            other => Err(Error::Config(format!(
                "Unknown summary mode '{}' (expected eager or lazy)",
                other
            ))),
        }
    }
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Csv,
    Sqlite,
    Supabase,
    Sheets,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "csv" => Ok(StoreKind::Csv),
            "sqlite" => Ok(StoreKind::Sqlite),
            "supabase" => Ok(StoreKind::Supabase),
            "sheets" | "gsheets" => Ok(StoreKind::Sheets),
            other => Err(Error::Config(format!(
                "Unknown store backend '{}' (expected memory, csv, sqlite, supabase or sheets)",
                other
            ))),
        }
    }
}

fn default_ratings_table() -> String {
    DEFAULT_RATINGS_TABLE.to_string()
}

fn default_summary_table() -> Option<String> {
    Some(DEFAULT_SUMMARY_TABLE.to_string())
}

fn default_worksheet() -> String {
    DEFAULT_WORKSHEET.to_string()
}

/// `[store]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    Csv {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Supabase {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_ratings_table")]
        table: String,
        /// Materialized summary table; `None` disables publishing
        #[serde(default = "default_summary_table")]
        summary_table: Option<String>,
    },
    Sheets {
        #[serde(default)]
        spreadsheet_id: Option<String>,
        #[serde(default = "default_worksheet")]
        worksheet: String,
        #[serde(default)]
        access_token: Option<String>,
        /// API root, overridable for testing
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Csv { path: None }
    }
}

impl StoreConfig {
    /// Backend defaults for a kind selected on the command line
    pub fn default_for(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Memory => StoreConfig::Memory,
            StoreKind::Csv => StoreConfig::Csv { path: None },
            StoreKind::Sqlite => StoreConfig::Sqlite { path: None },
            StoreKind::Supabase => StoreConfig::Supabase {
                url: None,
                api_key: None,
                table: default_ratings_table(),
                summary_table: default_summary_table(),
            },
            StoreKind::Sheets => StoreConfig::Sheets {
                spreadsheet_id: None,
                worksheet: default_worksheet(),
                access_token: None,
                base_url: None,
            },
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            StoreConfig::Memory => StoreKind::Memory,
            StoreConfig::Csv { .. } => StoreKind::Csv,
            StoreConfig::Sqlite { .. } => StoreKind::Sqlite,
            StoreConfig::Supabase { .. } => StoreKind::Supabase,
            StoreConfig::Sheets { .. } => StoreKind::Sheets,
        }
    }

    /// Fill unset credentials from `MOS_*` environment variables
    pub fn apply_env(&mut self) {
        match self {
            StoreConfig::Supabase { url, api_key, .. } => {
                fill_from_env(url, ENV_SUPABASE_URL);
                fill_from_env(api_key, ENV_SUPABASE_KEY);
            }
            StoreConfig::Sheets {
                spreadsheet_id,
                access_token,
                ..
            } => {
                fill_from_env(spreadsheet_id, ENV_SHEETS_ID);
                fill_from_env(access_token, ENV_SHEETS_TOKEN);
            }
            _ => {}
        }
    }

    /// Resolve relative local paths against the data folder
    pub fn with_data_folder(mut self, data_folder: &Path) -> Self {
        match &mut self {
            StoreConfig::Csv { path } => {
                let p = path.take().unwrap_or_else(|| PathBuf::from(DEFAULT_RATINGS_CSV));
                *path = Some(anchor(data_folder, p));
            }
            StoreConfig::Sqlite { path } => {
                let p = path.take().unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_DB));
                *path = Some(anchor(data_folder, p));
            }
            _ => {}
        }
        self
    }

    /// Fail when a remote backend lacks its endpoint or credentials
    pub fn validate(&self) -> Result<()> {
        match self {
            StoreConfig::Supabase { url, api_key, .. } => {
                require(url, "store.url", ENV_SUPABASE_URL)?;
                require(api_key, "store.api_key", ENV_SUPABASE_KEY)?;
            }
            StoreConfig::Sheets {
                spreadsheet_id,
                access_token,
                ..
            } => {
                require(spreadsheet_id, "store.spreadsheet_id", ENV_SHEETS_ID)?;
                require(access_token, "store.access_token", ENV_SHEETS_TOKEN)?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                *slot = Some(value);
            }
        }
    }
}

fn require(slot: &Option<String>, key: &str, var: &str) -> Result<()> {
    match slot {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::Config(format!(
            "Store credentials missing: set `{}` in the config file or {} in the environment",
            key, var
        ))),
    }
}

fn anchor(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Logging section of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is unset
    #[serde(default)]
    pub level: Option<String>,
}

/// Contents of the TOML config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub audio_folder: Option<PathBuf>,
    #[serde(default)]
    pub data_folder: Option<PathBuf>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub summary_mode: Option<SummaryMode>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// Default location of the config file (`~/.config/mos-rater/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mos-rater").join("config.toml"))
}

/// Load the config file
///
/// An explicitly requested file must exist. The default location is optional.
pub fn load_config_file(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        info!("Loading config file: {}", path.display());
        return TomlConfig::load(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config file: {}", path.display());
            TomlConfig::load(&path)
        }
        _ => {
            warn!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Values given on the command line (or their environment fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub audio_folder: Option<PathBuf>,
    pub data_folder: Option<PathBuf>,
    pub bind: Option<String>,
    pub summary_mode: Option<SummaryMode>,
    pub request_timeout_secs: Option<u64>,
    pub store: Option<StoreKind>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub audio_folder: PathBuf,
    pub data_folder: PathBuf,
    pub bind: String,
    pub summary_mode: SummaryMode,
    pub request_timeout: Duration,
    pub store: StoreConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio_folder: PathBuf::from(DEFAULT_AUDIO_FOLDER),
            data_folder: PathBuf::from(DEFAULT_DATA_FOLDER),
            bind: DEFAULT_BIND.to_string(),
            summary_mode: SummaryMode::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            store: StoreConfig::default().with_data_folder(Path::new(DEFAULT_DATA_FOLDER)),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Merge command line, config file and defaults, then validate
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let audio_folder = overrides
            .audio_folder
            .or(file.audio_folder)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIO_FOLDER));
        let data_folder = overrides
            .data_folder
            .or(file.data_folder)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FOLDER));
        let bind = overrides
            .bind
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let summary_mode = overrides
            .summary_mode
            .or(file.summary_mode)
            .unwrap_or_default();
        let timeout_secs = overrides
            .request_timeout_secs
            .or(file.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        let log_level = overrides
            .log_level
            .or(file.logging.level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        // A backend picked on the command line replaces the file's table
        // unless both name the same backend.
        let mut store = match (overrides.store, file.store) {
            (Some(kind), Some(cfg)) if cfg.kind() == kind => cfg,
            (Some(kind), _) => StoreConfig::default_for(kind),
            (None, Some(cfg)) => cfg,
            (None, None) => StoreConfig::default(),
        };
        store.apply_env();
        store.validate()?;
        let store = store.with_data_folder(&data_folder);

        Ok(Self {
            audio_folder,
            data_folder,
            bind,
            summary_mode,
            request_timeout: Duration::from_secs(timeout_secs),
            store,
            log_level,
        })
    }
}
