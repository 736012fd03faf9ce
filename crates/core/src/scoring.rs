//! Answer normalization, validation and attempt scoring.
//!
//! Everything here is pure: given the same questions, answers and clock the
//! result is identical.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{
    AnsweredQuestion, Question, QuestionId, QuestionKind, ScoredAttempt, TestConfig, percentage,
};
use crate::time::Clock;

const TERMINAL_PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// Minimum normalized length for a prefix to count as a near miss.
const PARTIAL_MATCH_MIN_LEN: usize = 2;

/// Lowercases, trims, collapses whitespace runs and strips trailing punctuation.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
#[must_use]
pub fn normalize(s: &str) -> String {
    let collapsed = s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| TERMINAL_PUNCTUATION.contains(&c) || c.is_whitespace())
        .to_owned()
}

/// User-facing verdict for a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFeedback {
    Correct,
    /// Wrong, but one normalized form is a prefix of the other.
    Close,
    Wrong,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    clock: Clock,
}

impl ScoringEngine {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Exact comparison for conjugations; the looser vocabulary rule for
    /// vocabulary questions.
    #[must_use]
    pub fn validate(question: &Question, raw_answer: &str) -> bool {
        match question.kind() {
            QuestionKind::Conjugation { .. } => {
                normalize(raw_answer) == normalize(question.correct_answer())
            }
            QuestionKind::Vocabulary => vocabulary_matches(question.correct_answer(), raw_answer),
        }
    }

    /// Near-miss detection for feedback only. Never affects the score.
    #[must_use]
    pub fn is_partial_match(question: &Question, raw_answer: &str) -> bool {
        let given = normalize(raw_answer);
        let expected = normalize(question.correct_answer());
        if given.chars().count() < PARTIAL_MATCH_MIN_LEN
            || expected.chars().count() < PARTIAL_MATCH_MIN_LEN
        {
            return false;
        }
        given.starts_with(&expected) || expected.starts_with(&given)
    }

    #[must_use]
    pub fn feedback(question: &Question, raw_answer: &str) -> AnswerFeedback {
        if Self::validate(question, raw_answer) {
            AnswerFeedback::Correct
        } else if Self::is_partial_match(question, raw_answer) {
            AnswerFeedback::Close
        } else {
            AnswerFeedback::Wrong
        }
    }

    /// Scores a finished quiz.
    ///
    /// Unanswered questions count as an empty (incorrect) answer. Duration is
    /// whole seconds since `started_at` when supplied, otherwise omitted and
    /// the attempt starts at completion time.
    #[must_use]
    pub fn score(
        &self,
        questions: &[Question],
        answers: &HashMap<QuestionId, String>,
        started_at: Option<DateTime<Utc>>,
        config: &TestConfig,
    ) -> ScoredAttempt {
        let completed_at = self.clock.now();
        let mut correct = 0_u32;
        let mut details = Vec::with_capacity(questions.len());

        for question in questions {
            let user_answer = answers.get(&question.id()).cloned().unwrap_or_default();
            let is_correct = Self::validate(question, &user_answer);
            if is_correct {
                correct = correct.saturating_add(1);
            }
            let verb = question.verb();
            details.push(AnsweredQuestion {
                question_id: question.id(),
                infinitive: verb.infinitive.clone(),
                tense: question.tense(),
                person: question.person(),
                category: verb.category,
                difficulty: verb.difficulty,
                correct_answer: question.correct_answer().to_owned(),
                user_answer,
                is_correct,
            });
        }

        let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let (started_at, duration_seconds) = match started_at {
            Some(start) => (start.min(completed_at), Some(self.clock.seconds_since(start))),
            None => (completed_at, None),
        };

        ScoredAttempt {
            answers: details,
            score: correct,
            total_questions: total,
            percentage: percentage(correct, total),
            started_at,
            completed_at,
            duration_seconds,
            config: config.clone(),
        }
    }
}

/// Vocabulary answers are accepted when equal, or when either normalized
/// string contains the other, with or without a leading "to ".
///
/// The containment rule is deliberately loose ("go" passes for "to go
/// somewhere") and is a product decision, not an oversight.
fn vocabulary_matches(expected: &str, given: &str) -> bool {
    let expected = normalize(expected);
    let given = normalize(given);
    if given.is_empty() {
        return false;
    }
    if expected == given {
        return true;
    }
    if expected.contains(&given) || given.contains(&expected) {
        return true;
    }
    let expected = strip_leading_to(&expected);
    let given = strip_leading_to(&given);
    !given.is_empty() && (expected == given || expected.contains(given) || given.contains(expected))
}

fn strip_leading_to(s: &str) -> &str {
    s.strip_prefix("to ").unwrap_or(s)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
