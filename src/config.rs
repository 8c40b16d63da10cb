//! Runtime configuration.
//!
//! Read from `<config_dir>/watchlist-tui/config.json`. Every field has a
//! default, so a missing file is fine as long as an API key comes from the
//! environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

pub const APP_DIR: &str = "watchlist-tui";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV_VAR: &str = "WATCHLIST_CONFIG";

/// Overrides `api_key` from the config file.
pub const API_KEY_ENV_VAR: &str = "TMDB_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub language: String,
    pub api_base_url: String,
    pub image_base_url: String,
    pub memory_cache_entries: usize,
    pub disk_cache_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: "en-US".to_string(),
            api_base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p".to_string(),
            memory_cache_entries: 64,
            disk_cache_mb: 200,
        }
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| app_config_dir().join("config.json"))
}

pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn app_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Loads the config file (if any), applies environment overrides and
    /// checks that an API key is present.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&config_path())?;
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            config.api_key = key;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(CatalogError::MissingApiKey);
        }
        Ok(())
    }

    pub fn poster_url(&self, path: &str) -> String {
        format!("{}/w342{}", self.image_base_url, path)
    }

    pub fn backdrop_url(&self, path: &str) -> String {
        format!("{}/w780{}", self.image_base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.language, "en-US");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "api_key": "abc", "disk_cache_mb": 10 }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.disk_cache_mb, 10);
        assert_eq!(config.memory_cache_entries, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let config = Config {
            api_key: "   ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CatalogError::MissingApiKey)));
    }

    #[test]
    fn test_image_urls() {
        let config = Config::default();
        assert_eq!(
            config.poster_url("/abc.jpg"),
            "https://image.tmdb.org/t/p/w342/abc.jpg"
        );
        assert_eq!(
            config.backdrop_url("/xyz.jpg"),
            "https://image.tmdb.org/t/p/w780/xyz.jpg"
        );
    }
}
