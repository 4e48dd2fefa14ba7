//! MQTT envelope channel

use std::time::Duration;

use async_trait::async_trait;
use coa_protocol::envelope::{RequestEnvelope, ResponseEnvelope};
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tracing::{debug, info, warn};

use crate::channel::topics::Topics;
use crate::channel::EnvelopeChannel;
use crate::errors::CoordinatorError;

/// MQTT broker address
#[derive(Debug, Clone)]
pub struct MqttAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Optional path to a PEM-encoded CA certificate for broker verification.
    /// When `None` and `use_tls` is `true`, the system certificate store is used.
    pub ca_cert_path: Option<String>,
}

impl Default for MqttAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
            use_tls: true,
            ca_cert_path: None,
        }
    }
}

/// Everything needed to open an [`MqttChannel`]
#[derive(Debug, Clone, Default)]
pub struct MqttChannelOptions {
    pub address: MqttAddress,
    pub node_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Overrides the node's default request topic
    pub request_topic: Option<String>,
    /// Overrides the node's default response topic
    pub response_topic: Option<String>,
}

impl MqttChannelOptions {
    pub fn request_topic(&self) -> String {
        self.request_topic
            .clone()
            .unwrap_or_else(|| Topics::request(&self.node_id))
    }

    pub fn response_topic(&self) -> String {
        self.response_topic
            .clone()
            .unwrap_or_else(|| Topics::response(&self.node_id))
    }
}

/// Envelope channel over an MQTT request/response topic pair
pub struct MqttChannel {
    client: AsyncClient,
    eventloop: EventLoop,
    request_topic: String,
    response_topic: String,
}

impl MqttChannel {
    /// Create the client.
    ///
    /// The connection itself is made lazily by the first [`receive`](EnvelopeChannel::receive),
    /// which subscribes to the request topic on every connect that did not
    /// resume a broker session.
    pub async fn connect(options: &MqttChannelOptions) -> Result<Self, CoordinatorError> {
        let address = &options.address;
        if address.host.is_empty() {
            return Err(CoordinatorError::MqttError(
                "MQTT host is not configured".to_string(),
            ));
        }

        let client_id = format!("coa-coordinator-{}", options.node_id);
        let mut mqtt_options = MqttOptions::new(&client_id, &address.host, address.port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        if let Some(username) = &options.username {
            mqtt_options.set_credentials(
                username.as_str(),
                options.password.as_deref().unwrap_or_default(),
            );
        }

        if address.use_tls {
            use rumqttc::{TlsConfiguration, Transport};
            use rustls::ClientConfig;
            use std::sync::Arc;

            let mut root_cert_store = rustls::RootCertStore::empty();

            if let Some(ref ca_path) = address.ca_cert_path {
                let ca_pem = std::fs::read(ca_path).map_err(|e| {
                    CoordinatorError::MqttError(format!("Failed to read CA cert {ca_path}: {e}"))
                })?;
                let mut cursor = std::io::Cursor::new(ca_pem);
                for cert in rustls_pemfile::certs(&mut cursor).flatten() {
                    if let Err(e) = root_cert_store.add(cert) {
                        warn!("Skipping invalid CA certificate in {}: {}", ca_path, e);
                    }
                }
            } else {
                for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                    let _ = root_cert_store.add(cert);
                }
            }

            let client_config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();

            mqtt_options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
                Arc::new(client_config),
            )));
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, 10);
        let channel = Self {
            client,
            eventloop,
            request_topic: options.request_topic(),
            response_topic: options.response_topic(),
        };

        info!(
            "Listening for requests on {} (responses on {})",
            channel.request_topic, channel.response_topic
        );

        Ok(channel)
    }

    async fn subscribe_requests(&mut self) -> Result<(), CoordinatorError> {
        self.client
            .subscribe(&self.request_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| CoordinatorError::MqttError(e.to_string()))?;
        debug!("Subscribed to {}", self.request_topic);
        Ok(())
    }
}

/// A clean session drops subscriptions, so they must be renewed after it connects
fn needs_subscribe(ack: &ConnAck) -> bool {
    ack.code == ConnectReturnCode::Success && !ack.session_present
}

#[async_trait]
impl EnvelopeChannel for MqttChannel {
    async fn receive(&mut self) -> Result<Option<RequestEnvelope>, CoordinatorError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != self.request_topic {
                        debug!("Ignoring message on topic: {}", publish.topic);
                        continue;
                    }
                    match std::str::from_utf8(&publish.payload) {
                        Ok(wire) => return Ok(Some(RequestEnvelope::from_wire(wire))),
                        Err(e) => warn!("Dropping non UTF-8 request on {}: {}", publish.topic, e),
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT connected (session present: {})", ack.session_present);
                    if needs_subscribe(&ack) {
                        self.subscribe_requests().await?;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT poll error: {}", e);
                    return Err(CoordinatorError::MqttError(e.to_string()));
                }
            }
        }
    }

    async fn reply(
        &mut self,
        request: &RequestEnvelope,
        response: ResponseEnvelope,
    ) -> Result<(), CoordinatorError> {
        let payload = response.to_wire()?;
        self.client
            .publish(&self.response_topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| CoordinatorError::MqttError(e.to_string()))?;
        debug!(
            "Published response to {} {} on {}",
            request.method, request.route, self.response_topic
        );
        Ok(())
    }
}
