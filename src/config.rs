//! Sniffer configuration file.
//!
//! Lives at `~/.config/nchs-sniffer/config.toml` unless `NCHS_SNIFFER_CONFIG`
//! points elsewhere. A default file is written on first start.

use crate::credentials::{DEFAULT_IV, DEFAULT_KEY};
use crate::mqtt::{BrokerEndpoint, TransportKind};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/nchs-sniffer";
const CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV: &str = "NCHS_SNIFFER_CONFIG";

pub const BROADCAST_TOPIC: &str = "queue/nchs-control-system-broadcast";
pub const DEVICE_STATE_TOPIC: &str = "queue/nchs-device-broadcast";
pub const DEVICE_TOPIC_PREFIX: &str = "queue/nchs-device-";
pub const DIAGNOSTIC_REQUEST_TOPIC: &str = "queue/nchs-diagnostic-request";
pub const DIAGNOSTIC_RESPONSE_TOPIC: &str = "queue/nchs-diagnostic-response";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnifferConfig {
    pub server_address: String,
    pub server_port: u16,
    pub ws_path: String,
    pub transport: TransportKind,
    pub rabbit_user_name: String,
    /// Encrypted with [`CipherConfig`]
    pub rabbit_password: String,
    pub mqtt_version: u8,
    /// Per topic cache cap
    pub max_messages: usize,
    pub keep_alive_secs: u64,
    pub reconnect_interval_ms: u64,
    pub log_level: String,
    pub cipher: CipherConfig,
    pub topics: TopicMode,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost".to_string(),
            server_port: 15675,
            ws_path: "/ws".to_string(),
            transport: TransportKind::WebSocket,
            rabbit_user_name: String::new(),
            rabbit_password: String::new(),
            mqtt_version: 4,
            max_messages: 1000,
            keep_alive_secs: 5,
            reconnect_interval_ms: 2000,
            log_level: "info".to_string(),
            cipher: CipherConfig::default(),
            topics: TopicMode::default(),
        }
    }
}

/// Key and IV of the password cipher, as UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub key: String,
    pub iv: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            iv: DEFAULT_IV.to_string(),
        }
    }
}

/// Which reserved topics a deployment uses. Exactly one mode is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopicMode {
    /// Subscribe to the two broadcast topics and every device topic seen on them
    Broadcast {
        broadcast_topic: String,
        device_state_topic: String,
        device_topic_prefix: String,
    },
    /// Subscribe to everything and discover topics and history on request
    Diagnostic {
        request_topic: String,
        response_topic: String,
    },
}

impl Default for TopicMode {
    fn default() -> Self {
        Self::broadcast()
    }
}

impl TopicMode {
    pub fn broadcast() -> Self {
        TopicMode::Broadcast {
            broadcast_topic: BROADCAST_TOPIC.to_string(),
            device_state_topic: DEVICE_STATE_TOPIC.to_string(),
            device_topic_prefix: DEVICE_TOPIC_PREFIX.to_string(),
        }
    }

    pub fn diagnostic() -> Self {
        TopicMode::Diagnostic {
            request_topic: DIAGNOSTIC_REQUEST_TOPIC.to_string(),
            response_topic: DIAGNOSTIC_RESPONSE_TOPIC.to_string(),
        }
    }

    /// Topics known before any traffic arrives.
    pub fn initial_topics(&self) -> Vec<String> {
        match self {
            TopicMode::Broadcast {
                broadcast_topic,
                device_state_topic,
                ..
            } => vec![broadcast_topic.clone(), device_state_topic.clone()],
            TopicMode::Diagnostic { .. } => Vec::new(),
        }
    }

    fn reserved_topics(&self) -> Vec<(&'static str, &str)> {
        match self {
            TopicMode::Broadcast {
                broadcast_topic,
                device_state_topic,
                device_topic_prefix,
            } => vec![
                ("broadcast_topic", broadcast_topic.as_str()),
                ("device_state_topic", device_state_topic.as_str()),
                ("device_topic_prefix", device_topic_prefix.as_str()),
            ],
            TopicMode::Diagnostic {
                request_topic,
                response_topic,
            } => vec![
                ("request_topic", request_topic.as_str()),
                ("response_topic", response_topic.as_str()),
            ],
        }
    }
}

impl SnifferConfig {
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: SnifferConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(write_err)?;

        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Loads `path`, writing and returning the defaults when it does not exist.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if exists {
            return Self::load(path).await;
        }

        warn!("No config at {}, writing defaults", path.display());
        let config = Self::default();
        config.save(path).await?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_messages == 0 {
            return Err(ConfigError::Invalid("max_messages must be at least 1".into()));
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::Invalid("keep_alive_secs must be at least 1".into()));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_interval_ms must be at least 1".into(),
            ));
        }
        if !matches!(self.mqtt_version, 3 | 4) {
            return Err(ConfigError::Invalid(format!(
                "unsupported mqtt_version {}, expected 3 or 4",
                self.mqtt_version
            )));
        }
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Invalid("server_address is empty".into()));
        }
        for (name, topic) in self.topics.reserved_topics() {
            if topic.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} is empty", name)));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint {
            host: self.server_address.clone(),
            port: self.server_port,
            path: self.ws_path.clone(),
            kind: self.transport,
        }
    }

    /// Cache cap, clamped to 1 for configs that skipped validation.
    pub fn max_messages(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_messages).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms.max(1))
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
