//! COA status protocol
//!
//! Result codes, the hierarchical deployment summary that coordinators build
//! from worker reports, and the content-type aware envelope those reports
//! travel in.

pub mod envelope;
pub mod errors;
pub mod models;
pub mod state;
pub mod summary;

pub use envelope::{Body, CarriesBody, ContentType, RequestEnvelope, ResponseEnvelope};
pub use errors::ProtocolError;
pub use models::DeploymentSpec;
pub use state::{classify, CodeCategory, ResultCode};
pub use summary::{ComponentResult, DeploymentSummary, SummaryResult, SummaryState, TargetResult};
