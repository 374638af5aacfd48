//! Configuration management for Ixen
//!
//! Settings for the HTTP server, relay sessions, upstream transports, the
//! comment classifier and the dashboard buffers. Loaded from `ixen.toml`;
//! every field has a default so a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{IxenError, Result};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "ixen.toml";

/// Top-level Ixen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IxenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub demo: DemoConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Open the dashboard in a browser on launch
    #[serde(default = "default_true")]
    pub open_browser: bool,

    /// Interval between SSE keep-alive comments
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// Relay session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Buffered frames per session before pushes wait on the browser
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Safety timeout for a pending upstream open
    #[serde(default = "default_setup_timeout_secs")]
    pub setup_timeout_secs: u64,
}

/// Which upstream transport feeds the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Headless browser observing the live page DOM
    #[default]
    Browser,
    /// Synthetic feed for local development
    Demo,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(TransportKind::Browser),
            "demo" => Ok(TransportKind::Demo),
            _ => Err(format!("Invalid transport: {}. Use browser or demo.", s)),
        }
    }
}

/// Upstream transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Live page URL; `{username}` is replaced by the creator
    #[serde(default = "default_live_url_template")]
    pub live_url_template: String,

    /// How often the observed page is drained
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn live_url(&self, username: &str) -> String {
        self.live_url_template.replace("{username}", username)
    }
}

/// Demo transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_demo_interval_ms")]
    pub interval_ms: u64,

    /// Creators the demo feed reports as not live
    #[serde(default)]
    pub offline_creators: Vec<String>,

    /// End the feed after this many events
    #[serde(default)]
    pub max_events: Option<usize>,
}

/// Which classifier backs `/api/classify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    #[default]
    Anthropic,
    /// Keyword rules, no network
    Heuristic,
}

impl std::str::FromStr for ClassifierBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(ClassifierBackend::Anthropic),
            "heuristic" => Ok(ClassifierBackend::Heuristic),
            _ => Err(format!("Invalid classifier: {}. Use anthropic or heuristic.", s)),
        }
    }
}

/// Comment classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Retries on HTTP 429 before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Presentation buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,

    #[serde(default = "default_category_capacity")]
    pub category_capacity: usize,

    #[serde(default = "default_gift_capacity")]
    pub gift_capacity: usize,
}

// Default value providers
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9002
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    256
}

fn default_setup_timeout_secs() -> u64 {
    60
}

fn default_live_url_template() -> String {
    "https://www.tiktok.com/@{username}/live".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_demo_interval_ms() -> u64 {
    1200
}

fn default_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_tokens() -> usize {
    16
}

fn default_live_capacity() -> usize {
    100
}

fn default_category_capacity() -> usize {
    50
}

fn default_gift_capacity() -> usize {
    50
}

impl IxenConfig {
    /// Load configuration from `path`, or defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = toml::from_str(&content)
                .map_err(|e| IxenError::Config(format!("Failed to parse config file: {}", e)))?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default configuration to `path`
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| IxenError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open_browser: true,
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            setup_timeout_secs: default_setup_timeout_secs(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            live_url_template: default_live_url_template(),
            poll_interval_ms: default_poll_interval_ms(),
            headless: true,
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_demo_interval_ms(),
            offline_creators: vec![],
            max_events: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            model: default_model(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            live_capacity: default_live_capacity(),
            category_capacity: default_category_capacity(),
            gift_capacity: default_gift_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IxenConfig::default();
        assert_eq!(config.server.port, 9002);
        assert_eq!(config.upstream.transport, TransportKind::Browser);
        assert_eq!(config.dashboard.live_capacity, 100);
        assert_eq!(config.dashboard.category_capacity, 50);
        assert_eq!(config.classifier.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = IxenConfig::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.session.setup_timeout_secs, 60);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[upstream]\ntransport = \"demo\"\n\n[demo]\noffline_creators = [\"bob\"]\n",
        )
        .unwrap();

        let config = IxenConfig::load_or_default(&path).unwrap();
        assert_eq!(config.upstream.transport, TransportKind::Demo);
        assert_eq!(config.demo.offline_creators, vec!["bob".to_string()]);
        assert_eq!(config.upstream.poll_interval_ms, 500);
        assert_eq!(config.server.port, 9002);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let result = IxenConfig::load_or_default(&path);
        assert!(matches!(result, Err(IxenError::Config(_))));
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        IxenConfig::write_default(&path).unwrap();

        let config = IxenConfig::load_or_default(&path).unwrap();
        assert_eq!(config.server.keep_alive_secs, 15);
        assert_eq!(config.classifier.backend, ClassifierBackend::Anthropic);
    }

    #[test]
    fn test_live_url() {
        let upstream = UpstreamConfig::default();
        assert_eq!(upstream.live_url("alice"), "https://www.tiktok.com/@alice/live");
    }

    #[test]
    fn test_transport_from_str() {
        assert_eq!("Demo".parse::<TransportKind>().unwrap(), TransportKind::Demo);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }
}
