//! Request Interception Boundary
//!
//! What the engine hands us for every outgoing request, what we hand
//! back, and what gets reported to the network inspector.

use crate::resource::ResourceKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Initiator label when the first party is unknown
pub const UNKNOWN_INITIATOR: &str = "Unknown";

/// Request as reported by the engine's interceptor hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: String,
    /// Engine resource-type code, see [`ResourceKind::from_code`]
    pub resource_kind_code: i32,
    /// URL of the top-level document, if any
    pub first_party_url: Option<String>,
}

impl InterceptedRequest {
    pub fn new(url: impl Into<String>, resource_kind_code: i32) -> Self {
        Self {
            url: url.into(),
            resource_kind_code,
            first_party_url: None,
        }
    }

    pub fn with_first_party(mut self, first_party_url: impl Into<String>) -> Self {
        self.first_party_url = Some(first_party_url.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_code(self.resource_kind_code)
    }

    /// First-party host, or [`UNKNOWN_INITIATOR`]
    pub fn initiator(&self) -> String {
        self.first_party_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_INITIATOR.to_string())
    }
}

/// What the engine should do with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterceptAction {
    Allow,
    Block,
}

/// One row for the network inspector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReport {
    pub url: String,
    /// "Blocked" or "Allowed"
    pub status: String,
    pub resource_kind: ResourceKind,
    pub initiator: String,
    /// Response size, unknown at interception time
    pub size: Option<u64>,
    /// Time spent deciding
    pub time: Duration,
}

/// Sink for inspector rows (the devtools network panel)
pub trait InspectorReporter: Send + Sync {
    fn report(&self, report: &NetworkReport);
}

/// Reporter that only logs
#[derive(Debug, Default)]
pub struct LogReporter;

impl InspectorReporter for LogReporter {
    fn report(&self, report: &NetworkReport) {
        debug!(
            "[{}] {} {} (initiator: {}, {:?})",
            report.status, report.resource_kind, report.url, report.initiator, report.time
        );
    }
}

/// Interception statistics
#[derive(Debug, Default)]
pub struct InterceptStats {
    pub total_requests: AtomicU64,
    pub blocked_requests: AtomicU64,
    pub total_check_time_ns: AtomicU64,
}

impl InterceptStats {
    pub fn record(&self, blocked: bool, elapsed: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if blocked {
            self.blocked_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_check_time_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// (total, blocked, check time ns)
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.blocked_requests.load(Ordering::Relaxed),
            self.total_check_time_ns.load(Ordering::Relaxed),
        )
    }

    /// Average check time in nanoseconds
    pub fn avg_check_time_ns(&self) -> u64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        self.total_check_time_ns.load(Ordering::Relaxed) / total
    }
}
