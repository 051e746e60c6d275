/// Application settings
///
/// Read from `settings.toml` in the user's config directory:
/// - Linux: ~/.config/tierdeck/settings.toml
/// - macOS: ~/Library/Application Support/tierdeck/settings.toml
/// - Windows: %APPDATA%\tierdeck\settings.toml
///
/// A missing file means defaults. `TIERDECK_SNAPSHOT_URL` overrides the
/// snapshot location.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "tierdeck";
const SETTINGS_FILE: &str = "settings.toml";
pub const SNAPSHOT_URL_ENV: &str = "TIERDECK_SNAPSHOT_URL";
pub const DEFAULT_SNAPSHOT_URL: &str = "http://127.0.0.1:8080/tier-data.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not determine a data directory")]
    NoDataDir,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Where the viewer fetches the published snapshot from
    pub snapshot_url: String,
    /// Optional request timeout; unset means the transport default
    pub request_timeout_secs: Option<u64>,
    /// Overrides the directory holding the catalog store
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_url: DEFAULT_SNAPSHOT_URL.to_string(),
            request_timeout_secs: None,
            data_dir: None,
        }
    }
}

impl Settings {
    /// Settings file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match Self::default_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(SNAPSHOT_URL_ENV) {
            settings.snapshot_url = url;
        }
        Ok(settings)
    }

    /// Parse a settings file. A file that does not exist yields defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Directory for the catalog store
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(APP_DIR))
            .ok_or(ConfigError::NoDataDir)
    }
}
