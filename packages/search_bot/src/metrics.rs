//! Update pipeline metrics for observability
//!
//! Counters are bumped from the ingress workers and the bot runtime thread
//! alike, so everything is a relaxed atomic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Ingress
    /// Webhook payloads received
    pub updates_received: AtomicU64,
    /// Updates handed to the runtime queue
    pub updates_queued: AtomicU64,
    /// Updates refused because the runtime was not running or the queue was full
    pub updates_rejected: AtomicU64,
    /// Payloads that failed to parse
    pub malformed_payloads: AtomicU64,
    /// Well-formed updates without a command
    pub updates_ignored: AtomicU64,
    /// Deliveries without the expected webhook secret
    pub unauthorized_deliveries: AtomicU64,

    // Runtime
    /// Updates that finished handling
    pub updates_handled: AtomicU64,
    /// Replies delivered to the transport
    pub replies_sent: AtomicU64,

    // Errors
    /// Handler failures turned into an internal-error reply
    pub handler_errors: AtomicU64,
    /// Handlers aborted after the timeout
    pub handler_timeouts: AtomicU64,
    /// Handlers that panicked
    pub handler_panics: AtomicU64,
    /// Outbound API calls that failed
    pub transport_errors: AtomicU64,

    /// Process start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn update_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queued(&self) {
        self.updates_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_payload(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_ignored(&self) {
        self.updates_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unauthorized_delivery(&self) {
        self.unauthorized_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_handled(&self) {
        self.updates_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_timeout(&self) {
        self.handler_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            ingress: IngressMetrics {
                received: self.updates_received.load(Ordering::Relaxed),
                queued: self.updates_queued.load(Ordering::Relaxed),
                rejected: self.updates_rejected.load(Ordering::Relaxed),
                malformed: self.malformed_payloads.load(Ordering::Relaxed),
                ignored: self.updates_ignored.load(Ordering::Relaxed),
                unauthorized: self.unauthorized_deliveries.load(Ordering::Relaxed),
            },
            runtime: RuntimeMetrics {
                handled: self.updates_handled.load(Ordering::Relaxed),
                replies_sent: self.replies_sent.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                handler: self.handler_errors.load(Ordering::Relaxed),
                timeouts: self.handler_timeouts.load(Ordering::Relaxed),
                panics: self.handler_panics.load(Ordering::Relaxed),
                transport: self.transport_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub ingress: IngressMetrics,
    pub runtime: RuntimeMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressMetrics {
    pub received: u64,
    pub queued: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub unauthorized: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub handled: u64,
    pub replies_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub handler: u64,
    pub timeouts: u64,
    pub panics: u64,
    pub transport: u64,
}

impl ErrorMetrics {
    pub fn total(&self) -> u64 {
        self.handler + self.timeouts + self.panics + self.transport
    }
}

/// Readiness report served at `/health/ready`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub runtime: String,
    pub database: String,
    pub records: u64,
    pub owners: u64,
    pub uptime_secs: u64,
    pub errors: u64,
}
