//! Profiling-question ladder.
//!
//! Each digest may carry at most one question about the user. The ladder
//! walks the profile fields in a fixed order and picks the first unasked
//! question for a field we still know nothing about. While a question is
//! pending (sent but unanswered), no new one is asked.

use crate::memory::MemoryRecord;

struct Rung {
    missing: fn(&MemoryRecord) -> bool,
    question: &'static str,
}

const LADDER: &[Rung] = &[
    Rung {
        missing: |r| r.name.is_none(),
        question: "I'd love to know what you prefer to be called. What name should I use?",
    },
    Rung {
        missing: |r| r.interests.is_empty(),
        question: "I'm curious about what interests you. What are some things you enjoy doing?",
    },
    Rung {
        missing: |r| r.work_notes.is_empty(),
        question: "What kind of work do you do?",
    },
    Rung {
        missing: |r| r.learning_goals.is_empty(),
        question: "Is there anything specific you're learning or want to learn about lately?",
    },
    Rung {
        missing: |r| r.schedule_preference.is_empty(),
        question: "Are you more of an early bird or a night owl? I want to make sure I'm catching you at a good time!",
    },
    Rung {
        missing: |r| r.news_topics.is_empty(),
        question: "Are there specific types of news topics you're most interested in?",
    },
    Rung {
        missing: |r| r.location.is_none(),
        question: "I'd love to know what city or area you're writing from. Where are you based?",
    },
    Rung {
        missing: |r| r.timezone.is_none(),
        question: "To help me time these emails better, could you let me know what timezone you're in?",
    },
];

/// Pick the next profiling question, if any.
pub fn next_question(record: &MemoryRecord) -> Option<&'static str> {
    if record.pending_question.is_some() {
        return None;
    }

    LADDER
        .iter()
        .find(|rung| (rung.missing)(record) && !record.questions_asked.contains(rung.question))
        .map(|rung| rung.question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_asks_for_name() {
        let record = MemoryRecord::default();
        let question = next_question(&record).unwrap();
        assert!(question.contains("name"));
    }

    #[test]
    fn pending_question_blocks_new_ones() {
        let mut record = MemoryRecord::default();
        record.pending_question = Some("anything".into());
        assert!(next_question(&record).is_none());
    }

    #[test]
    fn asked_questions_are_skipped() {
        let mut record = MemoryRecord::default();
        let first = next_question(&record).unwrap();
        record.questions_asked.insert(first.to_string());

        let second = next_question(&record).unwrap();
        assert_ne!(first, second);
        assert!(second.contains("interests"));
    }

    #[test]
    fn known_fields_are_skipped() {
        let mut record = MemoryRecord::default();
        record.name = Some("Sam".into());
        record.interests.push("hiking".into());

        let question = next_question(&record).unwrap();
        assert!(question.contains("work"));
    }

    #[test]
    fn complete_profile_has_no_question() {
        let mut record = MemoryRecord::default();
        record.name = Some("Sam".into());
        record.interests.push("hiking".into());
        record.work_notes = "teacher".into();
        record.learning_goals.push("rust".into());
        record.schedule_preference = "early bird".into();
        record.news_topics.push("science".into());
        record.location = Some("Lisbon".into());
        record.timezone = Some("Europe/Lisbon".into());
        assert!(next_question(&record).is_none());
    }
}
