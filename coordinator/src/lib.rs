//! COA Coordinator Library
//!
//! Owns the deployment summaries reported by workers while a deployment is
//! in flight, and serves them over an envelope channel.

pub mod aggregator;
pub mod app;
pub mod channel;
pub mod dispatch;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod storage;
pub mod utils;
pub mod workers;
