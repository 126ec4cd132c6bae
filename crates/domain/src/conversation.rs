//! Conversation record, turns, and the domain's own self-check API.
//!
//! The self-check methods here (`is_complete`, `detect_repetition`,
//! `calculate_quality_score`) are deliberately separate from, and stricter
//! than, the authoritative termination checks the conversation manager
//! runs in its loop. Both are kept; see `orc-manager::termination` for the
//! loop-path checks and their differing thresholds.

use crate::events::CompletionReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Started,
    InProgress,
    Completed,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_number: u32,
    /// `"assistant_1"` / `"assistant_2"`, alternating.
    pub role: String,
    pub model: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationMetadata {
    pub total_turns: u32,
    pub total_tokens: u64,
    pub models_used: Vec<String>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub topic: String,
    pub source: Option<String>,
    pub status: ConversationStatus,
    pub turns: Vec<Turn>,
    pub metadata: ConversationMetadata,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Present iff the conversation has reached a terminal state.
    pub completion_reason: Option<CompletionReason>,
    /// Assigned once, at completion.
    pub quality_score: Option<f64>,
}

/// Secondary natural-ending phrase list used by the domain self-check.
/// Deliberately different from the manager's loop-path list — only
/// `"in conclusion"` overlaps.
const SELF_CHECK_ENDING_PHRASES: &[&str] = &[
    "thank you for this discussion",
    "this has been a great conversation",
    "i think we've covered",
    "let's conclude",
    "to summarize our discussion",
    "in conclusion",
];

impl ConversationRecord {
    pub fn new(conversation_id: String, topic: String) -> Self {
        Self {
            conversation_id,
            topic,
            source: None,
            status: ConversationStatus::Started,
            turns: Vec::new(),
            metadata: ConversationMetadata::default(),
            created_at: Utc::now(),
            completed_at: None,
            completion_reason: None,
            quality_score: None,
        }
    }

    /// Marks the record terminal: status, `completed_at`, `completion_reason`,
    /// `quality_score`, and `metadata.duration_seconds` are all set together
    /// so a completed record is never missing one of them.
    pub fn finalize(&mut self, reason: CompletionReason, quality_score: f64) {
        let completed_at = Utc::now();
        self.status = ConversationStatus::Completed;
        self.completed_at = Some(completed_at);
        self.completion_reason = Some(reason);
        self.quality_score = Some(quality_score);
        self.metadata.duration_seconds =
            (completed_at - self.created_at).num_milliseconds() as f64 / 1000.0;
    }

    pub fn add_turn(&mut self, mut turn: Turn) {
        turn.turn_number = self.turns.len() as u32 + 1;
        self.metadata.total_turns = turn.turn_number;
        if let Some(tokens) = turn.tokens {
            self.metadata.total_tokens += tokens;
        }
        if !self.metadata.models_used.contains(&turn.model) {
            self.metadata.models_used.push(turn.model.clone());
        }
        self.turns.push(turn);
    }

    /// Normalized `{role, content}` history: any role starting with
    /// `"assistant"` collapses to `"assistant"`.
    pub fn history(&self) -> Vec<(String, String)> {
        self.turns
            .iter()
            .map(|t| {
                let role = if t.role.starts_with("assistant") {
                    "assistant".to_string()
                } else {
                    t.role.clone()
                };
                (role, t.content.clone())
            })
            .collect()
    }

    /// Domain-level self-check: max turns, then last-turn-timestamp-relative
    /// timeout, then the secondary ending-phrase list. Distinct from, and
    /// stricter than, the manager's authoritative loop-path checks.
    pub fn is_complete(&self, max_turns: usize, timeout_seconds: i64) -> bool {
        if self.turns.len() >= max_turns {
            return true;
        }
        if let Some(last) = self.turns.last() {
            let elapsed = (Utc::now() - last.timestamp).num_seconds();
            if elapsed > timeout_seconds {
                return true;
            }
            let lowered = last.content.to_lowercase();
            if SELF_CHECK_ENDING_PHRASES
                .iter()
                .any(|phrase| lowered.contains(phrase))
            {
                return true;
            }
        }
        false
    }

    /// Domain-level self-check for repetition: exact-duplicate detection
    /// over the last 3 turns, then a full (union-based) Jaccard similarity
    /// at a 0.8 threshold. Stricter than the manager's loop-path check.
    pub fn detect_repetition(&self, similarity_threshold: f64) -> bool {
        if self.turns.len() < 3 {
            return false;
        }
        let recent = &self.turns[self.turns.len() - 3..];
        let contents: Vec<&str> = recent.iter().map(|t| t.content.as_str()).collect();
        let unique: HashSet<&str> = contents.iter().copied().collect();
        if unique.len() < contents.len() {
            return true;
        }

        for i in 0..recent.len() {
            for j in (i + 1)..recent.len() {
                let words_i: HashSet<&str> = recent[i].content.split_whitespace().collect();
                let words_j: HashSet<&str> = recent[j].content.split_whitespace().collect();
                let union = words_i.union(&words_j).count();
                if union == 0 {
                    continue;
                }
                let intersection = words_i.intersection(&words_j).count();
                let similarity = intersection as f64 / union as f64;
                if similarity > similarity_threshold {
                    return true;
                }
            }
        }
        false
    }

    /// Weighted quality score in `[0.0, 1.0]`.
    pub fn calculate_quality_score(&self) -> f64 {
        if self.turns.is_empty() {
            return 0.0;
        }

        let n = self.turns.len() as f64;
        let length_factor = (1.0 - ((n - 6.5).abs() / 6.5)).max(0.0) * 0.3;

        let models: HashSet<&str> = self
            .metadata
            .models_used
            .iter()
            .map(|m| m.as_str())
            .collect();
        let diversity_factor = (models.len() as f64 / 2.0).min(1.0) * 0.2;

        let latencies: Vec<u64> = self.turns.iter().filter_map(|t| t.latency_ms).collect();
        let latency_factor = if latencies.len() == self.turns.len() && !latencies.is_empty() {
            let avg = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
            (1.0 - ((avg - 500.0).abs() / 1000.0)).max(0.0) * 0.2
        } else {
            0.0
        };

        let avg_chars = self
            .turns
            .iter()
            .map(|t| t.content.chars().count())
            .sum::<usize>() as f64
            / n;
        let length_quality = (avg_chars / 200.0).min(1.0) * 0.2;

        let repetition_bonus = if !self.detect_repetition(0.8) { 0.1 } else { 0.0 };

        (length_factor + diversity_factor + latency_factor + length_quality + repetition_bonus)
            .min(1.0)
    }
}
