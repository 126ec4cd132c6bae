//! Quality scoring for the completion event.
//!
//! Unlike termination, there is only one quality-score formula, so this is
//! a thin pass-through to `ConversationRecord::calculate_quality_score`
//! rather than a second implementation.

use orc_domain::conversation::ConversationRecord;

pub fn score(record: &ConversationRecord) -> f64 {
    record.calculate_quality_score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::conversation::Turn;

    #[test]
    fn empty_conversation_scores_zero() {
        let record = ConversationRecord::new("c1".into(), "topic".into());
        assert_eq!(score(&record), 0.0);
    }

    #[test]
    fn populated_conversation_scores_in_bounds() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        for i in 0..6 {
            record.add_turn(Turn {
                turn_number: 0,
                role: if i % 2 == 0 { "assistant_1".into() } else { "assistant_2".into() },
                model: "claude-3-sonnet".into(),
                content: "a fairly detailed reply about the topic at hand today".into(),
                timestamp: chrono::Utc::now(),
                latency_ms: Some(450),
                tokens: Some(80),
            });
        }
        let s = score(&record);
        assert!(s > 0.0 && s <= 1.0);
    }
}
