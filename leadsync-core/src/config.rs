//! Runtime configuration.
//!
//! Settings come from an optional YAML file overlaid with environment
//! variables (a `.env` file in the working directory is loaded first). Every
//! missing required setting is reported in one [`ConfigError::Missing`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::container::ContainerMap;
use crate::error::ConfigError;
use crate::status::UnknownStatusPolicy;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "leadsync.yaml";

pub const DEFAULT_SHEET_RANGE: &str = "Leads!A:F";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in logs or rendered config.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub range: String,
    pub access_token: Secret,
}

impl SheetsConfig {
    /// Sheet name part of the A1 range (`Leads!A:F` → `Leads`).
    pub fn sheet_name(&self) -> &str {
        self.range.split('!').next().unwrap_or(&self.range)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrelloConfig {
    pub key: Secret,
    pub token: Secret,
    pub board_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaemonSettings {
    pub interval_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Fully resolved and validated configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SyncConfig {
    pub sheets: SheetsConfig,
    pub trello: TrelloConfig,
    pub containers: ContainerMap,
    pub log_level: String,
    pub log_file: bool,
    pub unknown_status: UnknownStatusPolicy,
    pub retry: RetrySettings,
    pub daemon: DaemonSettings,
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub sheets: FileSheets,
    pub trello: FileTrello,
    pub containers: FileContainers,
    pub log_level: Option<String>,
    pub log_file: Option<bool>,
    pub unknown_status: Option<UnknownStatusPolicy>,
    pub retry: FileRetry,
    pub daemon: FileDaemon,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSheets {
    pub sheet_id: Option<String>,
    pub range: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileTrello {
    pub key: Option<String>,
    pub token: Option<String>,
    pub board_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileContainers {
    pub new: Option<String>,
    pub contacted: Option<String>,
    pub qualified: Option<String>,
    pub lost: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileRetry {
    pub max_retries: Option<usize>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDaemon {
    pub interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load `.env`, then the config file, then environment overrides.
    ///
    /// With `path = None` the file layer is [`DEFAULT_CONFIG_FILE`] when it
    /// exists in the working directory, otherwise empty.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", env_file.display());
        }
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    FileConfig::load(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Resolve the file layer against an environment lookup.
    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |key: &'static str, file_value: Option<String>| -> String {
            match non_empty(env(key)).or_else(|| non_empty(file_value)) {
                Some(v) => v,
                None => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let sheet_id = required("SHEET_ID", file.sheets.sheet_id);
        let access_token = required("GOOGLE_ACCESS_TOKEN", file.sheets.access_token);
        let key = required("TRELLO_KEY", file.trello.key);
        let token = required("TRELLO_TOKEN", file.trello.token);
        let board_id = required("TRELLO_BOARD_ID", file.trello.board_id);
        let list_new = required("TRELLO_LIST_TODO_ID", file.containers.new);
        let list_contacted = required("TRELLO_LIST_IN_PROGRESS_ID", file.containers.contacted);
        let list_qualified = required("TRELLO_LIST_DONE_ID", file.containers.qualified);
        let list_lost = required("TRELLO_LIST_LOST_ID", file.containers.lost);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let range = non_empty(env("SHEET_RANGE"))
            .or(file.sheets.range)
            .unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string());
        if !range.contains('!') {
            return Err(ConfigError::Invalid {
                key: "SHEET_RANGE",
                reason: format!("'{range}' is not an A1 range like Leads!A:F"),
            });
        }

        let unknown_status = match non_empty(env("UNKNOWN_STATUS_POLICY")) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "UNKNOWN_STATUS_POLICY",
                reason: format!("'{raw}' is neither default-to-new nor reject"),
            })?,
            None => file.unknown_status.unwrap_or_default(),
        };

        let log_file = match non_empty(env("ENABLE_FILE_LOGGING")) {
            Some(raw) => parse_env("ENABLE_FILE_LOGGING", &raw)?,
            None => file.log_file.unwrap_or(false),
        };

        let retry = RetrySettings {
            max_retries: env_or("RETRY_MAX_RETRIES", &env, file.retry.max_retries)?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            base_delay_ms: env_or("RETRY_BASE_DELAY_MS", &env, file.retry.base_delay_ms)?
                .unwrap_or(DEFAULT_BASE_DELAY_MS),
        };

        let interval_secs = env_or("SYNC_INTERVAL_SECS", &env, file.daemon.interval_secs)?
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SYNC_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            sheets: SheetsConfig {
                sheet_id,
                range,
                access_token: Secret::new(access_token),
            },
            trello: TrelloConfig {
                key: Secret::new(key),
                token: Secret::new(token),
                board_id,
            },
            containers: ContainerMap::new(list_new, list_contacted, list_qualified, list_lost)?,
            log_level: non_empty(env("LOG_LEVEL"))
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
            log_file,
            unknown_status,
            retry,
            daemon: DaemonSettings { interval_secs },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn env_or<T>(
    key: &'static str,
    env: &impl Fn(&str) -> Option<String>,
    file_value: Option<T>,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match non_empty(env(key)) {
        Some(raw) => parse_env(key, &raw).map(Some),
        None => Ok(file_value),
    }
}
