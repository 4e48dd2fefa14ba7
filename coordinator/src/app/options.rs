//! Application configuration options

use std::time::Duration;

use crate::channel::mqtt::{MqttAddress, MqttChannelOptions};
use crate::storage::settings::Settings;
use crate::workers::requests;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// MQTT channel options
    pub mqtt_channel: MqttChannelOptions,

    /// Request worker options
    pub request_worker: requests::Options,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let retry_delay = Duration::from_secs(settings.channel.retry_delay_secs);
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(
                    settings.lifecycle.max_shutdown_delay_secs,
                ),
            },
            mqtt_channel: MqttChannelOptions {
                address: MqttAddress {
                    host: settings.mqtt_broker.host.clone(),
                    port: settings.mqtt_broker.port,
                    use_tls: settings.mqtt_broker.tls,
                    ca_cert_path: settings.mqtt_broker.ca_cert_path.clone(),
                },
                node_id: settings.node_id.clone(),
                username: settings.mqtt_broker.username.clone(),
                password: settings.mqtt_broker.password.clone(),
                request_topic: settings.channel.request_topic.clone(),
                response_topic: settings.channel.response_topic.clone(),
            },
            request_worker: requests::Options {
                retry_delay,
                max_retry_delay: retry_delay.max(requests::Options::default().max_retry_delay),
            },
        }
    }
}

/// Lifecycle options for the coordinator
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.node_id = "edge-3".to_string();
        settings.mqtt_broker.username = Some("coa".to_string());
        settings.channel.retry_delay_secs = 2;
        settings.lifecycle.max_shutdown_delay_secs = 4;

        let options = AppOptions::from_settings(&settings);
        assert_eq!(options.mqtt_channel.node_id, "edge-3");
        assert_eq!(options.mqtt_channel.request_topic(), "coa/edge-3/request");
        assert_eq!(options.mqtt_channel.username.as_deref(), Some("coa"));
        assert_eq!(options.request_worker.retry_delay, Duration::from_secs(2));
        assert_eq!(options.lifecycle.max_shutdown_delay, Duration::from_secs(4));
    }
}
