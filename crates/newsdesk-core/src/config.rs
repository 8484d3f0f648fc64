use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that wins over `api.key` from the file
pub const API_KEY_ENV: &str = "NEWSDESK_API_KEY";

/// Main configuration structure
///
/// Loaded from the config file, then environment overrides on top.
/// Anything missing falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}

impl Config {
    /// Load config from the default location, or defaults if there is none.
    /// Environment overrides are applied either way.
    pub fn load() -> crate::Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            // No config file? Use defaults
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save config to disk at the default location
    pub fn save(&self) -> crate::Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api.key = key;
        }
        self
    }

    /// Get the config file path
    /// Uses XDG on Linux, Application Support on macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("newsdesk");

        Ok(config_dir.join("config.toml"))
    }

    /// Where saved articles live: `store.path` if set, else the data dir
    pub fn store_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?;
        Ok(data_dir.join("newsdesk").join("articles.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// News API key
    /// Get one at https://newsapi.org/register
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Two-letter country code for breaking news
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_base_url() -> String {
    "https://newsapi.org".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_country() -> String {
    "eg".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            country: default_country(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Quiet time after the last keystroke before searching
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StoreConfig {
    /// SQLite file for saved articles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectivityConfig {
    /// Probe before every fetch; when off we always assume online
    #[serde(default = "default_probe_enabled")]
    pub enabled: bool,

    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_enabled() -> bool {
    true
}

fn default_probe_addr() -> String {
    "newsapi.org:443".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            enabled: default_probe_enabled(),
            probe_addr: default_probe_addr(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://newsapi.org");
        assert_eq!(config.api.page_size, 20);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.country, "eg");
        assert_eq!(config.search.debounce_ms, 500);
        assert!(config.connectivity.enabled);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            key = "abc"
            country = "us"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.key, "abc");
        assert_eq!(config.api.country, "us");
        assert_eq!(config.api.page_size, 20);
        assert_eq!(config.search, SearchConfig::default());
    }

    #[test]
    fn test_env_key_overrides_file() {
        let mut config = Config::default();
        config.api.key = "from-file".into();

        let overridden = config.clone().with_env_overrides(|name| {
            (name == API_KEY_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(overridden.api.key, "from-env");

        let blank = config.with_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(blank.api.key, "from-file");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api.key = "secret".into();
        config.store.path = Some(dir.path().join("saved.db"));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api = 12").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, crate::Error::ConfigError(_)));
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let mut config = Config::default();
        config.store.path = Some(PathBuf::from("/tmp/news.db"));
        assert_eq!(config.store_path().unwrap(), PathBuf::from("/tmp/news.db"));
    }
}
