//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::CoordinatorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/coa/coordinator.json";

/// Coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Identifier of this coordinator, used to build channel topics
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// MQTT broker configuration
    #[serde(default)]
    pub mqtt_broker: MqttBrokerSettings,

    /// Envelope channel configuration
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Shutdown behavior
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

fn default_true() -> bool {
    true
}

fn default_node_id() -> String {
    "coordinator".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            node_id: default_node_id(),
            mqtt_broker: MqttBrokerSettings::default(),
            channel: ChannelSettings::default(),
            lifecycle: LifecycleSettings::default(),
        }
    }
}

impl Settings {
    /// Read the settings from a JSON file
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CoordinatorError> {
        let file = File::new(path);
        if !file.exists().await {
            return Err(CoordinatorError::ConfigError(format!(
                "settings file {} does not exist",
                file.path().display()
            )));
        }
        file.read_json::<Settings>().await
    }
}

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttBrokerSettings {
    /// Broker host
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Use TLS
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Optional path to a PEM-encoded CA certificate for broker TLS verification.
    /// When absent, the system certificate store is used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    8883
}

impl Default for MqttBrokerSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            tls: true,
            ca_cert_path: None,
            username: None,
            password: None,
        }
    }
}

/// Envelope channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Topic requests arrive on, derived from the node id when absent
    #[serde(default)]
    pub request_topic: Option<String>,

    /// Topic responses are published to, derived from the node id when absent
    #[serde(default)]
    pub response_topic: Option<String>,

    /// Pause after a failed receive before trying again
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            request_topic: None,
            response_topic: None,
            retry_delay_secs: default_retry_delay(),
        }
    }
}

/// Lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Upper bound on how long shutdown waits for workers to finish
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_max_shutdown_delay() -> u64 {
    15
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}
