//! Handoff from HTTP workers to the bot runtime.

use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::BotError;
use crate::metrics::ServerMetrics;
use crate::runtime::BotRuntime;
use crate::telegram::types::Update;

/// Turns raw webhook payloads into queued updates.
///
/// `ingest` never awaits: the HTTP response only says whether the update was
/// accepted, not whether it was handled.
#[derive(Clone)]
pub struct IngestionBridge {
    runtime: Arc<BotRuntime>,
    metrics: Arc<ServerMetrics>,
}

impl IngestionBridge {
    pub fn new(runtime: Arc<BotRuntime>, metrics: Arc<ServerMetrics>) -> Self {
        Self { runtime, metrics }
    }

    pub fn ingest(&self, raw_payload: &[u8]) -> StatusCode {
        self.metrics.update_received();

        let update: Update = match serde_json::from_slice(raw_payload) {
            Ok(update) => update,
            Err(e) => {
                self.metrics.malformed_payload();
                warn!("Rejecting malformed update payload: {}", e);
                return StatusCode::BAD_REQUEST;
            }
        };
        let update_id = update.update_id;

        let Some(inbound) = update.into_inbound() else {
            self.metrics.update_ignored();
            debug!("Update {} carries no command", update_id);
            return StatusCode::OK;
        };

        match self.runtime.submit(inbound) {
            Ok(()) => {
                self.metrics.update_queued();
                StatusCode::OK
            }
            Err(BotError::QueueFull) => {
                self.metrics.update_rejected();
                warn!("Update queue full, asking provider to redeliver {}", update_id);
                StatusCode::SERVICE_UNAVAILABLE
            }
            Err(e) => {
                self.metrics.update_rejected();
                debug!("Rejecting update {}: {}", update_id, e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}
