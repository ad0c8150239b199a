//! Runtime configuration.
//!
//! # Responsibility
//! - Resolve the data directory, log level and authorization headroom from
//!   defaults and `CAPTABLE_*` environment variables.
//! - Derive the database, cache and log paths from the data directory.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Resolved paths are always absolute.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "CAPTABLE_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "CAPTABLE_LOG_LEVEL";
pub const ENV_AUTHORIZED_HEADROOM: &str = "CAPTABLE_AUTHORIZED_HEADROOM";

/// Default factor applied to fully-diluted shares when suggesting an
/// authorized share count.
pub const DEFAULT_AUTHORIZED_HEADROOM: f64 = 1.2;

const DEFAULT_DATA_DIR_NAME: &str = "captable";
const DB_FILE_NAME: &str = "captable.sqlite3";
const CACHE_FILE_NAME: &str = "captable.cache.json";
const LOG_DIR_NAME: &str = "logs";

/// Configuration rejected during resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    RelativeDataDir(PathBuf),
    UnsupportedLogLevel(String),
    /// Headroom must be a finite factor >= 1.
    InvalidHeadroom(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelativeDataDir(path) => write!(
                f,
                "{ENV_DATA_DIR} must be an absolute path, got `{}`",
                path.display()
            ),
            Self::UnsupportedLogLevel(value) => {
                write!(f, "{ENV_LOG_LEVEL} has unsupported value `{value}`")
            }
            Self::InvalidHeadroom(value) => write!(
                f,
                "{ENV_AUTHORIZED_HEADROOM} must be a number >= 1, got `{value}`"
            ),
        }
    }
}

impl Error for SettingsError {}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub authorized_headroom: f64,
}

impl Settings {
    /// Default settings rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            log_level: default_log_level().to_string(),
            authorized_headroom: DEFAULT_AUTHORIZED_HEADROOM,
        }
    }

    /// Resolves settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, which maps a variable name to its
    /// raw value.
    ///
    /// # Errors
    /// - `RelativeDataDir` when the data directory is not absolute.
    /// - `UnsupportedLogLevel` for unknown level names.
    /// - `InvalidHeadroom` for unparsable or sub-1 factors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let data_dir = match read(ENV_DATA_DIR) {
            Some(raw) => {
                let path = PathBuf::from(raw);
                if !path.is_absolute() {
                    return Err(SettingsError::RelativeDataDir(path));
                }
                path
            }
            None => std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME),
        };
        let mut settings = Self::with_data_dir(data_dir);

        if let Some(raw) = read(ENV_LOG_LEVEL) {
            let level =
                normalize_level(&raw).map_err(|_| SettingsError::UnsupportedLogLevel(raw))?;
            settings.log_level = level.to_string();
        }

        if let Some(raw) = read(ENV_AUTHORIZED_HEADROOM) {
            settings.authorized_headroom = parse_headroom(&raw)?;
        }

        Ok(settings)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }
}

fn parse_headroom(raw: &str) -> Result<f64, SettingsError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 1.0 => Ok(value),
        _ => Err(SettingsError::InvalidHeadroom(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Settings, SettingsError, DEFAULT_AUTHORIZED_HEADROOM, ENV_AUTHORIZED_HEADROOM,
        ENV_DATA_DIR, ENV_LOG_LEVEL,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.authorized_headroom, DEFAULT_AUTHORIZED_HEADROOM);
        assert!(settings.data_dir.is_absolute());
        assert!(settings.db_path().starts_with(&settings.data_dir));
    }

    #[test]
    fn overrides_are_trimmed_and_applied() {
        let dir = std::env::temp_dir().join("captable-settings-test");
        let padded_dir = format!("  {} ", dir.to_str().unwrap());
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_DATA_DIR, padded_dir.as_str()),
            (ENV_LOG_LEVEL, "WARNING"),
            (ENV_AUTHORIZED_HEADROOM, "1.5"),
        ]))
        .unwrap();

        assert_eq!(settings.data_dir, dir);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.authorized_headroom, 1.5);
        assert_eq!(settings.log_dir(), dir.join("logs"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let settings = Settings::from_lookup(lookup_from(&[(ENV_AUTHORIZED_HEADROOM, "  ")]))
            .unwrap();
        assert_eq!(settings.authorized_headroom, DEFAULT_AUTHORIZED_HEADROOM);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            Settings::from_lookup(lookup_from(&[(ENV_DATA_DIR, "relative/dir")])).unwrap_err(),
            SettingsError::RelativeDataDir(PathBuf::from("relative/dir"))
        );
        assert_eq!(
            Settings::from_lookup(lookup_from(&[(ENV_AUTHORIZED_HEADROOM, "0.8")])).unwrap_err(),
            SettingsError::InvalidHeadroom("0.8".to_string())
        );
        assert!(matches!(
            Settings::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err(),
            SettingsError::UnsupportedLogLevel(_)
        ));
    }
}
