//! Internal structured telemetry, separate from the business events
//! published to the bus: a tagged enum with an `emit()` that logs
//! structured JSON via `tracing`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        latency_ms: u64,
    },
    LlmRetry {
        provider: String,
        attempt: u32,
    },
    CircuitOpened {
        provider: String,
        failure_count: u32,
    },
    CircuitClosed {
        provider: String,
    },
    RateLimited {
        provider: String,
    },
    LockContended {
        conversation_id: String,
    },
    TurnCompleted {
        conversation_id: String,
        turn_number: u32,
    },
    ConversationTerminated {
        conversation_id: String,
        reason: String,
    },
    DeadLettered {
        topic: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(trace_event = %json, "orchestrator_event"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize trace event"),
        }
    }
}
