//! Wide event emitter for chain runs.
//!
//! A wide event is one log line summarising a whole chain instance: its
//! final state plus one record per executed stage attempt.

use super::StageSpanAttributes;
use crate::core::ChainStatus;
use std::collections::BTreeMap;

/// Emitter for chain-level wide events.
#[derive(Debug, Clone)]
pub struct WideEventEmitter {
    /// Event type attached to every payload.
    pub event_type: String,
}

impl Default for WideEventEmitter {
    fn default() -> Self {
        Self {
            event_type: "chain.wide".to_string(),
        }
    }
}

impl WideEventEmitter {
    /// Creates a new wide event emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the payload for a finished chain.
    #[must_use]
    pub fn build_chain_payload(
        &self,
        status: &ChainStatus,
        stages: &[StageSpanAttributes],
        duration_ms: f64,
    ) -> serde_json::Value {
        let mut stage_counts: BTreeMap<String, u32> = BTreeMap::new();
        for stage in stages {
            let key = stage.status.clone().unwrap_or_else(|| "unknown".to_string());
            *stage_counts.entry(key).or_insert(0) += 1;
        }

        let mut payload = serde_json::json!({
            "type": self.event_type,
            "chain": status.chain_name,
            "run_id": status.run_id.to_string(),
            "state": status.state.to_string(),
            "duration_ms": duration_ms,
            "attempts": stages.len(),
            "stage_counts": stage_counts,
            "stage_details": stages.iter().map(StageSpanAttributes::to_json).collect::<Vec<_>>(),
        });

        if let Some(ref error) = status.error {
            payload["error"] = serde_json::json!(error);
        }

        payload
    }

    /// Logs the payload for a finished chain.
    pub fn emit_chain_event(
        &self,
        status: &ChainStatus,
        stages: &[StageSpanAttributes],
        duration_ms: f64,
    ) {
        let payload = self.build_chain_payload(status, stages, duration_ms);
        tracing::info!(
            chain = %status.chain_name,
            run_id = %status.run_id,
            event_type = %self.event_type,
            payload = %payload,
            "Wide event"
        );
    }
}
