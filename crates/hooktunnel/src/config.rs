use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Agent configuration file, relative to the home directory.
const CONFIG_PATH: &str = ".hooktunnel/agent.yaml";

#[derive(Debug, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
    #[serde(default = "default_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_interval")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            ping_interval_secs: default_interval(),
            stats_interval_secs: default_interval(),
            close_timeout_secs: default_close_timeout(),
        }
    }
}

impl RelayConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_host")]
    pub default_host: String,
    #[serde(default = "default_forward_timeout")]
    pub timeout_secs: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            default_host: default_host(),
            timeout_secs: default_forward_timeout(),
        }
    }
}

impl ForwardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_relay_url() -> String {
    "wss://pluto.hooktunnel.dev".to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_close_timeout() -> u64 {
    5
}

fn default_api_url() -> String {
    "https://hooktunnel.dev/api".to_string()
}

fn default_host() -> String {
    local_forwarder::DEFAULT_HOST.to_string()
}

fn default_forward_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// `~/.hooktunnel/agent.yaml`, if a home directory is known.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_PATH))
}

/// Where the effective configuration came from.
#[derive(Debug, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// An explicitly requested file did not exist; defaults were used.
    Missing(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Log the source. Call once tracing is initialised.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                debug!(path = %path.display(), "configuration loaded");
            }
            ConfigSource::Missing(path) => {
                warn!(
                    path = %path.display(),
                    "configuration file not found; using defaults"
                );
            }
            ConfigSource::Defaults => debug!("no configuration file; using defaults"),
        }
    }
}

/// Resolve the configuration from an explicit `--config` path or the default
/// location. Only an explicit path that does not exist is reported as
/// [`ConfigSource::Missing`].
pub fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<(AgentConfig, ConfigSource)> {
    let (path, required) = match explicit {
        Some(path) => (path, true),
        None => match default_path() {
            Some(path) => (path, false),
            None => return Ok((AgentConfig::default(), ConfigSource::Defaults)),
        },
    };

    match load(&path)? {
        Some(config) => Ok((config, ConfigSource::File(path))),
        None if required => Ok((AgentConfig::default(), ConfigSource::Missing(path))),
        None => Ok((AgentConfig::default(), ConfigSource::Defaults)),
    }
}

/// Load configuration from a YAML file. Returns `None` when the file does
/// not exist.
pub fn load(path: &Path) -> anyhow::Result<Option<AgentConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    // An empty YAML document parses as null rather than an empty mapping.
    if contents.trim().is_empty() {
        return Ok(Some(AgentConfig::default()));
    }

    let config: AgentConfig = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(Some(config))
}

impl AgentConfig {
    /// Apply `WS_URL` and `API_URL` overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WS_URL").filter(|v| !v.is_empty()) {
            self.relay.url = url;
        }
        if let Some(url) = lookup("API_URL").filter(|v| !v.is_empty()) {
            self.api.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_explicit_file_is_reported_with_defaults() {
        let path = PathBuf::from("/nonexistent/hooktunnel/agent.yaml");
        assert!(load(&path).unwrap().is_none());

        let (cfg, source) = resolve(Some(path.clone())).unwrap();
        assert_eq!(source, ConfigSource::Missing(path));
        assert_eq!(cfg.relay.url, "wss://pluto.hooktunnel.dev");
        assert_eq!(cfg.relay.ping_interval(), Duration::from_secs(30));
        assert_eq!(cfg.relay.close_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.api.url, "https://hooktunnel.dev/api");
        assert_eq!(cfg.forward.default_host, "http://localhost");
        assert_eq!(cfg.forward.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "warn");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_yaml(
            "relay:\n  url: ws://127.0.0.1:8787\n  ping_interval_secs: 10\nlogging:\n  json: true\n",
        );
        let (cfg, source) = resolve(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
        assert_eq!(cfg.relay.url, "ws://127.0.0.1:8787");
        assert_eq!(cfg.relay.ping_interval(), Duration::from_secs(10));
        assert_eq!(cfg.relay.stats_interval(), Duration::from_secs(30));
        assert!(cfg.logging.json);
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.api.url, "https://hooktunnel.dev/api");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_yaml("\n");
        let cfg = load(file.path()).unwrap().unwrap();
        assert_eq!(cfg.forward.timeout_secs, 30);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let file = write_yaml("relay: [unclosed\n");
        let err = load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let file = write_yaml(
            "relay:\n  ping_interval_secs: 0\n  stats_interval_secs: 0\nforward:\n  timeout_secs: 0\n",
        );
        let cfg = load(file.path()).unwrap().unwrap();
        assert_eq!(cfg.relay.ping_interval(), Duration::from_secs(1));
        assert_eq!(cfg.relay.stats_interval(), Duration::from_secs(1));
        assert_eq!(cfg.forward.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn env_overrides_urls() {
        let env: HashMap<&str, &str> =
            HashMap::from([("WS_URL", "ws://localhost:9000"), ("API_URL", "")]);
        let mut cfg = AgentConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.relay.url, "ws://localhost:9000");
        assert_eq!(cfg.api.url, "https://hooktunnel.dev/api");
    }
}
