use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::{BridgeConfig, ServerConfig};
use crate::instrument::{AgentConfig, ReconnectPolicy};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the bridge listens on
    pub server: ServerConfig,
    /// Broker deadlines and log capacities
    pub bridge: BridgeConfig,
    /// Settings for an in-process instrumentation agent
    pub agent: AgentConfig,
    /// Default tracing directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            bridge: BridgeConfig::default(),
            agent: AgentConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// TOML representation of the `[bridge]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlBridgeConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub command_timeout_ms: Option<u64>,
    pub event_capacity: Option<usize>,
    pub error_capacity: Option<usize>,
}

/// TOML representation of the `[agent]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAgentConfig {
    pub url: Option<String>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub quiet_after: Option<u32>,
}

/// TOML representation of the `[logging]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlLoggingConfig {
    pub level: Option<String>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bridge: Option<TomlBridgeConfig>,
    pub agent: Option<TomlAgentConfig>,
    pub logging: Option<TomlLoggingConfig>,
}

impl Config {
    /// Load configuration from the default path, merging with defaults
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load configuration from `path`. A missing or unreadable file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read config");
                }
                return config;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config")
            }
        }

        config
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(bridge) = toml_config.bridge {
            if let Some(host) = bridge.host {
                self.server.host = host;
            }
            if let Some(port) = bridge.port {
                self.server.port = port;
            }
            if let Some(ms) = bridge.command_timeout_ms {
                self.bridge.command_timeout = Duration::from_millis(ms);
            }
            if let Some(capacity) = bridge.event_capacity {
                self.bridge.event_capacity = capacity;
            }
            if let Some(capacity) = bridge.error_capacity {
                self.bridge.error_capacity = capacity;
            }
        }

        if let Some(agent) = toml_config.agent {
            if let Some(url) = agent.url {
                self.agent.url = url;
            }
            let policy: &mut ReconnectPolicy = &mut self.agent.policy;
            if let Some(ms) = agent.base_delay_ms {
                policy.base_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = agent.max_delay_ms {
                policy.max_delay = Duration::from_millis(ms);
            }
            if let Some(quiet_after) = agent.quiet_after {
                policy.quiet_after = quiet_after;
            }
        }

        if let Some(level) = toml_config.logging.and_then(|l| l.level) {
            self.log_level = level;
        }
    }

    /// Write the bundled example config to `path`, creating parent directories.
    pub fn write_example(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, EXAMPLE_CONFIG)
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.server.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config.server.port, 9229);
        assert_eq!(config.bridge.event_capacity, 1000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[bridge]\nport = 9300\nevent_capacity = 50\n\n[agent]\nquiet_after = 2\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.server.port, 9300);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.bridge.event_capacity, 50);
        assert_eq!(config.bridge.error_capacity, 100);
        assert_eq!(config.agent.policy.quiet_after, 2);
        assert_eq!(config.agent.policy.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[bridge\nport = ").unwrap();
        assert_eq!(Config::load_from(&path).server.port, 9229);
    }

    #[test]
    fn test_example_config_parses() {
        let parsed: TomlConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        let bridge = parsed.bridge.unwrap();
        assert_eq!(bridge.port, Some(9229));
        assert_eq!(bridge.command_timeout_ms, Some(5000));
    }

    #[test]
    fn test_write_example_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_example(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }
}
