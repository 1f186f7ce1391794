//! Mock server instances and the registry that owns them.
//!
//! This module provides:
//! - `MockServer`: one listener serving one contract and recording traffic
//! - `ServerManager`: the port-keyed registry used by synchronous callers
//!
//! ## Module Structure
//!
//! - `types`: lifecycle states, recorded traffic, reports and metrics
//! - `handler`: HTTP request handling for a mock server
//! - `response`: hyper response building
//! - `core`: the `MockServer` struct and its accept loop
//! - `manager`: `ServerManager` lifecycle management

mod core;
mod handler;
mod manager;
mod response;
mod types;

#[cfg(test)]
mod tests;

pub use self::core::MockServer;
pub use manager::{Cleanup, ServerManager};
pub use response::MISMATCH_HEADER;
pub use types::{
    MatchOutcome, MetricsSnapshot, MismatchReport, MockServerMetrics, RecordedInteraction,
    ServerState,
};
