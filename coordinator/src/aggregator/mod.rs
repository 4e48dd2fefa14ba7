//! Summary aggregation

pub mod lifecycle;
pub mod registry;

pub use registry::{SummaryProgress, SummaryRegistry};
