//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/pitwall/config.toml)
//! 3. Environment variables (PITWALL_* prefix)
//!
//! Environment variables take precedence over config file values.
//! Sync timing (heartbeat, broadcast, watchdog timeout) lives here so the
//! hub and watchdog services receive their durations by injection rather
//! than reading ambient globals.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "PITWALL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (snapshot file, relay id)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Cloud relay base URL (optional)
    #[serde(default)]
    pub relay_url: Option<String>,

    /// Whether the cloud relay polling loop is enabled
    #[serde(default)]
    pub relay_enabled: bool,

    /// Cloud relay polling interval in seconds
    #[serde(default = "default_relay_poll_secs")]
    pub relay_poll_secs: u64,

    /// Hub heartbeat period in milliseconds
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Hub full-state broadcast period in milliseconds
    #[serde(default = "default_broadcast_ms")]
    pub broadcast_ms: u64,

    /// Node watchdog timeout in milliseconds
    ///
    /// Must exceed `broadcast_ms`, otherwise normal broadcast jitter
    /// trips the connection-lost transition.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    /// Delay before a starting Node sends its first state request, in
    /// milliseconds (lets the bus subscriber attach first)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            relay_url: None,
            relay_enabled: false,
            relay_poll_secs: default_relay_poll_secs(),
            heartbeat_ms: default_heartbeat_ms(),
            broadcast_ms: default_broadcast_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PITWALL_DATA_DIR, PITWALL_RELAY_URL, ...)
    /// 2. Config file (~/.config/pitwall/config.toml or PITWALL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // PITWALL_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // PITWALL_RELAY_URL
        if let Ok(val) = std::env::var(format!("{}_RELAY_URL", ENV_PREFIX)) {
            self.relay_url = if val.is_empty() { None } else { Some(val) };
        }

        // PITWALL_RELAY_ENABLED
        if let Ok(val) = std::env::var(format!("{}_RELAY_ENABLED", ENV_PREFIX)) {
            self.relay_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PITWALL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pitwall")
            .join("config.toml")
    }

    /// Get the path to the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Get the path to the persisted cloud relay id
    pub fn remote_id_path(&self) -> PathBuf {
        self.data_dir.join("remote_id")
    }

    /// Hub heartbeat period
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Hub full-state broadcast period
    pub fn broadcast_period(&self) -> Duration {
        Duration::from_millis(self.broadcast_ms)
    }

    /// Node watchdog timeout
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    /// Delay before a starting Node requests state
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Cloud relay polling interval
    pub fn relay_poll_interval(&self) -> Duration {
        Duration::from_secs(self.relay_poll_secs)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pitwall")
}

fn default_relay_poll_secs() -> u64 {
    30
}

fn default_heartbeat_ms() -> u64 {
    1_000
}

fn default_broadcast_ms() -> u64 {
    2_000
}

fn default_watchdog_timeout_ms() -> u64 {
    4_000
}

fn default_request_delay_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "PITWALL_DATA_DIR",
        "PITWALL_RELAY_URL",
        "PITWALL_RELAY_ENABLED",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.relay_enabled);
        assert!(config.relay_url.is_none());
        assert!(config.data_dir.ends_with("pitwall"));
        // Watchdog must outlast the broadcast period
        assert!(config.watchdog_timeout_ms > config.broadcast_ms);
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.snapshot_path().ends_with("store.json"));
        assert!(config.remote_id_path().ends_with("remote_id"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("PITWALL_DATA_DIR", "/tmp/pitwall-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/pitwall-test"));
    }

    #[test]
    fn test_env_override_relay_enabled() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(!config.relay_enabled);

        env::set_var("PITWALL_RELAY_ENABLED", "true");
        config.apply_env_overrides();
        assert!(config.relay_enabled);

        env::set_var("PITWALL_RELAY_ENABLED", "1");
        config.relay_enabled = false;
        config.apply_env_overrides();
        assert!(config.relay_enabled);

        env::set_var("PITWALL_RELAY_ENABLED", "false");
        config.apply_env_overrides();
        assert!(!config.relay_enabled);
    }

    #[test]
    fn test_env_override_relay_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(config.relay_url.is_none());

        env::set_var("PITWALL_RELAY_URL", "https://blobs.example.com/api");
        config.apply_env_overrides();
        assert_eq!(
            config.relay_url,
            Some("https://blobs.example.com/api".to_string())
        );

        // Empty string clears it
        env::set_var("PITWALL_RELAY_URL", "");
        config.apply_env_overrides();
        assert!(config.relay_url.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/pitwall"),
            relay_url: Some("https://blobs.example.com".to_string()),
            relay_enabled: true,
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("relay_url"));
        assert!(toml_str.contains("heartbeat_ms"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.relay_url, config.relay_url);
        assert_eq!(parsed.relay_enabled, config.relay_enabled);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            relay_url = "https://blobs.example.com"
            relay_enabled = true
            broadcast_ms = 500
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(
            config.relay_url,
            Some("https://blobs.example.com".to_string())
        );
        assert!(config.relay_enabled);
        assert_eq!(config.broadcast_ms, 500);
        // Unspecified timings keep defaults
        assert_eq!(config.heartbeat_ms, 1_000);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert!(!config.relay_enabled);
        assert!(config.relay_url.is_none());
    }
}
