//! Authoritative loop-path termination checks.
//!
//! Deliberately separate from, and looser than, `ConversationRecord`'s own
//! `is_complete`/`detect_repetition` self-check. The manager checks
//! wall-clock time since the conversation *started*, not since the last
//! turn, and uses its own primary ending-phrase list and a 4-turn/0.7
//! repetition window instead of the domain's 3-turn/0.8 one. Both checks
//! are intentionally kept; see SPEC_FULL.md for why.

use orc_domain::conversation::ConversationRecord;
use orc_domain::events::CompletionReason;
use std::collections::HashSet;

const PRIMARY_ENDING_PHRASES: &[&str] = &[
    "in conclusion",
    "to summarize",
    "overall",
    "in summary",
    "that concludes",
    "final thoughts",
];

const REPETITION_WINDOW: usize = 4;
const REPETITION_MIN_WORDS: usize = 10;
const REPETITION_THRESHOLD: f64 = 0.7;

/// Returns the reason the conversation should stop, or `None` to continue.
///
/// Natural-ending and repetition checks only apply once `turns.len() >=
/// min_turns` — a short conversation that happens to contain a conclusion
/// phrase keeps going until the minimum length is reached.
pub fn should_terminate(
    record: &ConversationRecord,
    min_turns: usize,
    max_turns: usize,
    timeout_seconds: i64,
) -> Option<CompletionReason> {
    if record.turns.len() >= max_turns {
        return Some(CompletionReason::MaxTurns);
    }
    if (chrono::Utc::now() - record.created_at).num_seconds() > timeout_seconds {
        return Some(CompletionReason::Timeout);
    }
    if record.turns.len() < min_turns {
        return None;
    }
    if has_natural_ending(record) {
        return Some(CompletionReason::NaturalEnding);
    }
    if is_repetitive(record) {
        return Some(CompletionReason::Repetition);
    }
    None
}

fn has_natural_ending(record: &ConversationRecord) -> bool {
    let Some(last) = record.turns.last() else {
        return false;
    };
    let lowered = last.content.to_lowercase();
    PRIMARY_ENDING_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Compares each pair of turns in the last `REPETITION_WINDOW` turns whose
/// content is at least `REPETITION_MIN_WORDS` words long, flagging
/// repetition when word-overlap similarity exceeds `REPETITION_THRESHOLD`.
fn is_repetitive(record: &ConversationRecord) -> bool {
    if record.turns.len() < REPETITION_WINDOW {
        return false;
    }
    let recent = &record.turns[record.turns.len() - REPETITION_WINDOW..];
    for i in 0..recent.len() {
        let words_i: Vec<&str> = recent[i].content.split_whitespace().collect();
        if words_i.len() < REPETITION_MIN_WORDS {
            continue;
        }
        let set_i: HashSet<&str> = words_i.iter().copied().collect();
        for j in (i + 1)..recent.len() {
            let words_j: Vec<&str> = recent[j].content.split_whitespace().collect();
            if words_j.len() < REPETITION_MIN_WORDS {
                continue;
            }
            let set_j: HashSet<&str> = words_j.iter().copied().collect();
            let union = set_i.union(&set_j).count();
            if union == 0 {
                continue;
            }
            let intersection = set_i.intersection(&set_j).count();
            let similarity = intersection as f64 / union as f64;
            if similarity >= REPETITION_THRESHOLD {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::conversation::Turn;

    fn turn(content: &str) -> Turn {
        Turn {
            turn_number: 0,
            role: "assistant_1".into(),
            model: "claude-3-sonnet".into(),
            content: content.into(),
            timestamp: chrono::Utc::now(),
            latency_ms: Some(200),
            tokens: Some(50),
        }
    }

    #[test]
    fn terminates_on_max_turns() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        for _ in 0..5 {
            record.add_turn(turn("keep talking about this topic for a while"));
        }
        assert_eq!(should_terminate(&record, 3, 5, 3600), Some(CompletionReason::MaxTurns));
    }

    #[test]
    fn terminates_on_primary_ending_phrase_once_min_turns_reached() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        record.add_turn(turn("just getting started on this discussion"));
        record.add_turn(turn("In summary, we have covered a lot of ground here today"));
        assert_eq!(should_terminate(&record, 2, 10, 3600), Some(CompletionReason::NaturalEnding));
    }

    #[test]
    fn ending_phrase_before_min_turns_does_not_terminate() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        record.add_turn(turn("In summary, we have covered a lot of ground here today"));
        assert_eq!(should_terminate(&record, 5, 10, 3600), None);
    }

    #[test]
    fn continues_when_no_condition_met() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        record.add_turn(turn("just getting started on this discussion"));
        assert_eq!(should_terminate(&record, 1, 10, 3600), None);
    }

    #[test]
    fn terminates_on_repetitive_turns() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        let content = "the quick brown fox jumps over the lazy dog again and again";
        for _ in 0..4 {
            record.add_turn(turn(content));
        }
        assert_eq!(should_terminate(&record, 4, 10, 3600), Some(CompletionReason::Repetition));
    }

    #[test]
    fn short_turns_do_not_count_toward_repetition() {
        let mut record = ConversationRecord::new("c1".into(), "topic".into());
        for _ in 0..4 {
            record.add_turn(turn("short reply"));
        }
        assert_eq!(should_terminate(&record, 4, 10, 3600), None);
    }
}
