//! Event envelope and payload types published to / consumed from the bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default = "default_source_service")]
    pub source_service: String,
    pub correlation_id: Option<String>,
}

fn default_source_service() -> String {
    "orchestration-service".to_string()
}

impl BaseEvent {
    pub fn new(event_type: &str, correlation_id: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now(),
            source_service: default_source_service(),
            correlation_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationNewEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub topic: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub initial_context: serde_json::Map<String, serde_json::Value>,
    pub priority: crate::topic::TopicPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurnEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub turn_number: u32,
    pub target_model: String,
    pub previous_turns: Vec<crate::conversation::Turn>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponseEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub turn: crate::conversation::Turn,
    pub success: bool,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    MaxTurns,
    Timeout,
    NaturalEnding,
    Repetition,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationCompletedEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub topic: String,
    pub source: Option<String>,
    pub turns: Vec<crate::conversation::Turn>,
    pub metadata: crate::conversation::ConversationMetadata,
    pub completion_reason: CompletionReason,
    pub quality_score: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationErrorType {
    LlmApiError,
    Timeout,
    ValidationError,
    SystemError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationErrorEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub error_type: ConversationErrorType,
    pub error_message: String,
    #[serde(default)]
    pub error_details: serde_json::Map<String, serde_json::Value>,
    pub retry_count: u32,
    #[serde(default = "default_recoverable")]
    pub is_recoverable: bool,
    pub turn_number: Option<u32>,
}

fn default_recoverable() -> bool {
    true
}

/// Health/metrics events are a bus-published ambient supplement (not an
/// HTTP health endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHealthEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub active_conversations: usize,
    pub providers_healthy: Vec<String>,
    pub providers_unhealthy: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetricsEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub conversation_id: String,
    pub total_turns: u32,
    pub total_tokens: u64,
    pub duration_seconds: f64,
}

/// Dead-letter envelope for a message that failed handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub original_topic: String,
    pub original_message: serde_json::Value,
    pub error: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_event_defaults_source_service() {
        let ev = BaseEvent::new("conversation.new", None);
        assert_eq!(ev.source_service, "orchestration-service");
        assert_eq!(ev.event_type, "conversation.new");
    }

    #[test]
    fn dead_letter_round_trips() {
        let dl = DeadLetter {
            original_topic: "conversation.turn".into(),
            original_message: serde_json::json!({"a": 1}),
            error: "boom".into(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&dl).unwrap();
        let back: DeadLetter = serde_json::from_str(&json).unwrap();
        assert_eq!(back.original_topic, "conversation.turn");
        assert_eq!(back.error, "boom");
    }
}
