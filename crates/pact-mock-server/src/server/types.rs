//! Type definitions for mock server instances.

use crate::matching::Mismatch;
use crate::model::Request;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Starting,
    Running,
    Stopped,
}

// ============================================================================
// Recorded traffic
// ============================================================================

/// How one received request was resolved against the contract.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(usize),
    Mismatched {
        index: usize,
        mismatches: Vec<Mismatch>,
    },
    NotFound,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    /// The interaction this request was attributed to, if any.
    pub fn interaction_index(&self) -> Option<usize> {
        match self {
            MatchOutcome::Matched(index) | MatchOutcome::Mismatched { index, .. } => Some(*index),
            MatchOutcome::NotFound => None,
        }
    }
}

/// A request received by a mock server and its outcome.
#[derive(Debug, Clone)]
pub struct RecordedInteraction {
    pub request_from: String,
    pub request: Request,
    pub outcome: MatchOutcome,
    pub timestamp: String,
}

// ============================================================================
// Reports
// ============================================================================

/// One entry of a mock server's mismatch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MismatchReport {
    /// A request that came closest to `interaction` but did not match it
    RequestMismatch {
        method: String,
        path: String,
        interaction: String,
        mismatches: Vec<Mismatch>,
    },
    /// A request received while the contract had no interactions
    RequestNotFound {
        method: String,
        path: String,
        request: Value,
    },
    /// An interaction no request was attributed to
    MissingRequest {
        method: String,
        path: String,
        interaction: String,
    },
}

// ============================================================================
// Metrics
// ============================================================================

/// Request counters for one mock server.
#[derive(Debug, Default)]
pub struct MockServerMetrics {
    total_requests: AtomicU64,
    requests_by_path: RwLock<HashMap<String, u64>>,
}

impl MockServerMetrics {
    pub fn record(&self, path: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self
            .requests_by_path
            .write()
            .entry(path.to_string())
            .or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            requests_by_path: self
                .requests_by_path
                .read()
                .iter()
                .map(|(path, count)| (path.clone(), *count))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub requests_by_path: BTreeMap<String, u64>,
}
