//! In-process envelope channel
//!
//! Envelopes cross the channel in their wire form so both ends exercise the
//! same encoding a network transport would.

use async_trait::async_trait;
use coa_protocol::envelope::{RequestEnvelope, ResponseEnvelope, REQUEST_ID_KEY};
use tokio::sync::mpsc;
use tracing::debug;

use crate::channel::EnvelopeChannel;
use crate::errors::CoordinatorError;
use crate::utils::generate_uuid;

/// Coordinator side of an in-process channel
pub struct MemoryChannel {
    requests: mpsc::Receiver<String>,
    responses: mpsc::Sender<String>,
}

/// Client side of an in-process channel
pub struct MemoryPeer {
    requests: mpsc::Sender<String>,
    responses: mpsc::Receiver<String>,
}

/// Create a connected channel and peer, each direction buffering `capacity` envelopes
pub fn memory_channel(capacity: usize) -> (MemoryChannel, MemoryPeer) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (response_tx, response_rx) = mpsc::channel(capacity);
    (
        MemoryChannel {
            requests: request_rx,
            responses: response_tx,
        },
        MemoryPeer {
            requests: request_tx,
            responses: response_rx,
        },
    )
}

#[async_trait]
impl EnvelopeChannel for MemoryChannel {
    async fn receive(&mut self) -> Result<Option<RequestEnvelope>, CoordinatorError> {
        Ok(self
            .requests
            .recv()
            .await
            .map(|wire| RequestEnvelope::from_wire(&wire)))
    }

    async fn reply(
        &mut self,
        request: &RequestEnvelope,
        response: ResponseEnvelope,
    ) -> Result<(), CoordinatorError> {
        debug!("Replying to {} {}", request.method, request.route);
        self.responses
            .send(response.to_wire()?)
            .await
            .map_err(|_| CoordinatorError::ChannelError("peer dropped".to_string()))
    }
}

impl MemoryPeer {
    /// Send a request, tagging it with a request id when it has none
    pub async fn send(&self, mut request: RequestEnvelope) -> Result<String, CoordinatorError> {
        if request.request_id().is_none() {
            request
                .metadata
                .insert(REQUEST_ID_KEY.to_string(), generate_uuid());
        }
        let request_id = request.request_id().unwrap_or_default().to_string();
        self.requests
            .send(request.to_wire()?)
            .await
            .map_err(|_| CoordinatorError::ChannelError("coordinator dropped".to_string()))?;
        Ok(request_id)
    }

    /// Send raw wire text, bypassing envelope encoding
    pub async fn send_wire(&self, wire: impl Into<String>) -> Result<(), CoordinatorError> {
        self.requests
            .send(wire.into())
            .await
            .map_err(|_| CoordinatorError::ChannelError("coordinator dropped".to_string()))
    }

    /// Wait for the next response, `None` once the coordinator side is gone
    pub async fn recv(&mut self) -> Option<ResponseEnvelope> {
        let wire = self.responses.recv().await?;
        Some(ResponseEnvelope::from_wire(&wire))
    }

    /// Send a request and wait for its response
    pub async fn request(
        &mut self,
        request: RequestEnvelope,
    ) -> Result<ResponseEnvelope, CoordinatorError> {
        self.send(request).await?;
        self.recv()
            .await
            .ok_or_else(|| CoordinatorError::ChannelError("coordinator closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_crosses_in_wire_form() {
        let (mut channel, peer) = memory_channel(4);

        let request_id = peer
            .send(RequestEnvelope::new("GET", "summaries").with_parameter("name", "x"))
            .await
            .unwrap();

        let received = channel.receive().await.unwrap().unwrap();
        assert_eq!(received.route, "summaries");
        assert_eq!(received.parameters["name"], "x");
        assert_eq!(received.request_id(), Some(request_id.as_str()));
    }

    #[tokio::test]
    async fn test_receive_ends_when_peer_dropped() {
        let (mut channel, peer) = memory_channel(1);
        drop(peer);
        assert!(channel.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reply_fails_when_peer_dropped() {
        let (mut channel, peer) = memory_channel(1);
        drop(peer);
        let result = channel
            .reply(&RequestEnvelope::default(), ResponseEnvelope::ok())
            .await;
        assert!(matches!(result, Err(CoordinatorError::ChannelError(_))));
    }
}
