//! The per-conversation orchestration loop.
//!
//! Each conversation runs as its own spawned task: acquire the distributed
//! lock, alternate turns between the two configured providers, publish a
//! bus event after every turn, and publish `conversation.completed` (or
//! `conversation.error`) once a termination condition fires.

use crate::quality;
use crate::termination;
use orc_bus::EventProducer;
use orc_domain::config::{BusConfig, ConversationConfig};
use orc_domain::conversation::{ConversationRecord, ConversationStatus, Turn};
use orc_domain::events::{
    CompletionReason, ConversationCompletedEvent, ConversationErrorEvent, ConversationErrorType,
    ConversationResponseEvent, ConversationTurnEvent,
};
use orc_domain::telemetry::TraceEvent;
use orc_providers::factory::LlmClientFactory;
use orc_providers::traits::{GenerateRequest, HistoryTurn};
use orc_store::RedisStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct ConversationManager {
    store: Arc<RedisStore>,
    providers: Arc<LlmClientFactory>,
    producer: Arc<EventProducer>,
    config: ConversationConfig,
    bus: BusConfig,
    semaphore: Arc<Semaphore>,
    handles: std::sync::Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ConversationManager {
    pub fn new(
        store: Arc<RedisStore>,
        providers: Arc<LlmClientFactory>,
        producer: Arc<EventProducer>,
        config: ConversationConfig,
        bus: BusConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            store,
            providers,
            producer,
            config,
            bus,
            semaphore,
            handles: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Spawns the conversation loop and registers its handle so it can be
    /// cancelled with `stop_conversation`.
    pub async fn start_new_conversation(
        self: &Arc<Self>,
        conversation_id: String,
        topic: String,
        source: Option<String>,
    ) {
        let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore closed");
        let mut record = ConversationRecord::new(conversation_id.clone(), topic);
        record.source = source;
        if let Err(e) = self.store.save_conversation(&record).await {
            tracing::error!(conversation_id, error = %e, "failed to persist new conversation");
            return;
        }

        let this = self.clone();
        let id_for_map = conversation_id.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            this.run_conversation_loop(conversation_id).await;
        });
        self.handles.lock().unwrap().insert(id_for_map, handle);
    }

    /// Aborts the running task for `conversation_id`, if any.
    pub fn stop_conversation(&self, conversation_id: &str) -> bool {
        if let Some(handle) = self.handles.lock().unwrap().remove(conversation_id) {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub async fn cleanup_completed_conversations(&self) -> orc_domain::error::Result<u64> {
        let mut handles = self.handles.lock().unwrap();
        handles.retain(|_, h| !h.is_finished());
        drop(handles);
        self.store.cleanup_expired().await
    }

    async fn run_conversation_loop(&self, conversation_id: String) {
        if !matches!(self.store.acquire_lock(&conversation_id, None).await, Ok(true)) {
            tracing::warn!(conversation_id, "could not acquire conversation lock, skipping");
            return;
        }

        let result = self.drive_turns(&conversation_id).await;

        if let Err(e) = self.store.release_lock(&conversation_id).await {
            tracing::warn!(conversation_id, error = %e, "failed to release conversation lock");
        }
        self.handles.lock().unwrap().remove(&conversation_id);

        if let Err(e) = result {
            tracing::error!(conversation_id, error = %e, "conversation loop failed");
        }
    }

    async fn drive_turns(&self, conversation_id: &str) -> orc_domain::error::Result<()> {
        loop {
            let mut record = self
                .store
                .get_conversation(conversation_id)
                .await?
                .ok_or_else(|| orc_domain::error::Error::Store(format!("conversation {conversation_id} vanished")))?;

            let turn_index = record.turns.len();
            let provider_name = self.providers.by_index(turn_index);
            let prompt = build_prompt(&record.topic, turn_index);
            let history: Vec<HistoryTurn> = record
                .history()
                .into_iter()
                .map(|(role, content)| HistoryTurn { role, content })
                .collect();

            let request = GenerateRequest {
                prompt,
                conversation_history: history,
                max_tokens: 2048,
                temperature: 0.7,
            };

            let started = std::time::Instant::now();
            let generated = self.call_provider(provider_name, &request).await;

            match generated {
                Ok(response) => {
                    let turn = Turn {
                        turn_number: 0,
                        role: format!("assistant_{}", (turn_index + 1) % 2 + 1),
                        model: response.model,
                        content: response.content,
                        timestamp: chrono::Utc::now(),
                        latency_ms: Some(started.elapsed().as_millis() as u64),
                        tokens: Some(response.tokens),
                    };
                    record.add_turn(turn.clone());
                    record.status = ConversationStatus::InProgress;
                    self.store.save_conversation(&record).await?;

                    self.publish_turn_and_response(conversation_id, &record, &turn).await;

                    if let Some(reason) = termination::should_terminate(
                        &record,
                        self.config.min_turns,
                        self.config.max_turns,
                        self.config.timeout_seconds as i64,
                    ) {
                        self.finish_conversation(conversation_id, &mut record, reason).await?;
                        return Ok(());
                    }
                }
                Err(err) => {
                    self.publish_error(conversation_id, turn_index, &err).await;
                    record.status = ConversationStatus::Error;
                    self.store.save_conversation(&record).await?;
                    return Err(err);
                }
            }
        }
    }

    async fn call_provider(
        &self,
        provider_name: &str,
        request: &GenerateRequest,
    ) -> orc_domain::error::Result<orc_providers::traits::GenerateResponse> {
        match provider_name {
            "anthropic" => self.providers.anthropic.generate_response(request).await,
            _ => self.providers.google.generate_response(request).await,
        }
    }

    async fn publish_turn_and_response(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
        turn: &Turn,
    ) {
        let turn_event = ConversationTurnEvent {
            base: orc_domain::events::BaseEvent::new("conversation.turn", Some(conversation_id.to_string())),
            conversation_id: conversation_id.to_string(),
            turn_number: turn.turn_number,
            target_model: turn.model.clone(),
            previous_turns: record.turns.clone(),
            context: Default::default(),
        };
        self.producer
            .send_event(&self.bus.topic_conversation_turn, conversation_id, &turn_event)
            .await;

        let response_event = ConversationResponseEvent {
            base: orc_domain::events::BaseEvent::new("conversation.response", Some(conversation_id.to_string())),
            conversation_id: conversation_id.to_string(),
            turn: turn.clone(),
            success: true,
            error_message: None,
            retry_count: 0,
        };
        self.producer
            .send_event(&self.bus.topic_conversation_response, conversation_id, &response_event)
            .await;

        TraceEvent::TurnCompleted {
            conversation_id: conversation_id.to_string(),
            turn_number: turn.turn_number,
        }
        .emit();
    }

    async fn publish_error(&self, conversation_id: &str, turn_number: usize, err: &orc_domain::error::Error) {
        let event = ConversationErrorEvent {
            base: orc_domain::events::BaseEvent::new("conversation.error", Some(conversation_id.to_string())),
            conversation_id: conversation_id.to_string(),
            error_type: classify_error(err),
            error_message: err.to_string(),
            error_details: Default::default(),
            retry_count: 0,
            is_recoverable: false,
            turn_number: Some(turn_number as u32),
        };
        self.producer
            .send_event(&self.bus.topic_conversation_error, conversation_id, &event)
            .await;
    }

    async fn finish_conversation(
        &self,
        conversation_id: &str,
        record: &mut ConversationRecord,
        reason: CompletionReason,
    ) -> orc_domain::error::Result<()> {
        let score = quality::score(record);
        record.finalize(reason, score);
        self.store.save_conversation(record).await?;

        let event = ConversationCompletedEvent {
            base: orc_domain::events::BaseEvent::new("conversation.completed", Some(conversation_id.to_string())),
            conversation_id: conversation_id.to_string(),
            topic: record.topic.clone(),
            source: record.source.clone(),
            turns: record.turns.clone(),
            metadata: record.metadata.clone(),
            completion_reason: reason,
            quality_score: record.quality_score.unwrap_or(score),
            created_at: record.created_at,
            completed_at: record.completed_at.unwrap(),
        };
        self.producer
            .send_event(&self.bus.topic_conversation_completed, conversation_id, &event)
            .await;

        TraceEvent::ConversationTerminated {
            conversation_id: conversation_id.to_string(),
            reason: format!("{reason:?}"),
        }
        .emit();
        Ok(())
    }
}

/// `"Start a thoughtful discussion about: {topic}"` for the opening turn,
/// otherwise the standard follow-up prompt.
fn build_prompt(topic: &str, turn_index: usize) -> String {
    if turn_index == 0 {
        format!("Start a thoughtful discussion about: {topic}")
    } else {
        format!(
            "Respond to the previous message about {topic}. Provide a thoughtful perspective that adds to the discussion."
        )
    }
}

fn classify_error(err: &orc_domain::error::Error) -> ConversationErrorType {
    use orc_domain::error::Error;
    match err {
        Error::Timeout(_) => ConversationErrorType::Timeout,
        Error::Http(_) | Error::Provider { .. } | Error::RateLimited(_) | Error::CircuitOpen(_) => {
            ConversationErrorType::LlmApiError
        }
        Error::Config(_) => ConversationErrorType::ValidationError,
        _ => ConversationErrorType::SystemError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_prompt_uses_the_start_template() {
        assert_eq!(
            build_prompt("rust vs go", 0),
            "Start a thoughtful discussion about: rust vs go"
        );
    }

    #[test]
    fn follow_up_prompt_uses_the_respond_template() {
        let prompt = build_prompt("rust vs go", 1);
        assert!(prompt.starts_with("Respond to the previous message about rust vs go"));
    }
}
