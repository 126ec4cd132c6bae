use serde::{Deserialize, Serialize};

/// A topic popped from the ingestion queue or carried by a
/// `conversation.new` bus event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub topic: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub initial_context: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub priority: TopicPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopicPriority {
    High,
    #[default]
    Normal,
    Low,
}
