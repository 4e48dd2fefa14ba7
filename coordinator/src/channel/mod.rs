//! Envelope channels
//!
//! A channel delivers [`RequestEnvelope`]s to the coordinator and carries its
//! [`ResponseEnvelope`]s back. The transport behind it is not the
//! coordinator's concern.

pub mod memory;
pub mod mqtt;
pub mod topics;

use async_trait::async_trait;
use coa_protocol::envelope::{RequestEnvelope, ResponseEnvelope};

use crate::errors::CoordinatorError;

#[async_trait]
pub trait EnvelopeChannel: Send {
    /// Wait for the next request, `None` once the channel is closed
    async fn receive(&mut self) -> Result<Option<RequestEnvelope>, CoordinatorError>;

    /// Send the response to `request`
    async fn reply(
        &mut self,
        request: &RequestEnvelope,
        response: ResponseEnvelope,
    ) -> Result<(), CoordinatorError>;
}
