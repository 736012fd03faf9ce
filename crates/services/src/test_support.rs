//! Attempt builders shared by unit tests.

use chrono::Duration;

use drill_core::model::{
    AnsweredQuestion, Attempt, Difficulty, Person, QuestionId, ScoredAttempt, Tense, TestConfig,
    VerbCategory, percentage,
};
use drill_core::time::fixed_now;

fn answer(is_correct: bool, vocabulary: bool) -> AnsweredQuestion {
    AnsweredQuestion {
        question_id: QuestionId::generate(),
        infinitive: "gehen".into(),
        tense: (!vocabulary).then_some(Tense::Praesens),
        person: (!vocabulary).then_some(Person::Ich),
        category: VerbCategory::Strong,
        difficulty: Difficulty::new(2).unwrap(),
        correct_answer: if vocabulary { "to go" } else { "gehe" }.into(),
        user_answer: if is_correct { "gehe" } else { "geht" }.into(),
        is_correct,
    }
}

fn build(
    offset_secs: i64,
    results: &[bool],
    config: TestConfig,
    duration: Option<i64>,
) -> Attempt {
    let vocabulary = config.mode() == drill_core::model::TestMode::Vocabulary;
    let answers: Vec<_> = results.iter().map(|ok| answer(*ok, vocabulary)).collect();
    let score = u32::try_from(results.iter().filter(|ok| **ok).count()).unwrap();
    let total = u32::try_from(results.len()).unwrap();
    let started_at = fixed_now() + Duration::seconds(offset_secs);
    ScoredAttempt {
        answers,
        score,
        total_questions: total,
        percentage: percentage(score, total),
        started_at,
        completed_at: started_at + Duration::seconds(duration.unwrap_or(0)),
        duration_seconds: duration,
        config,
    }
    .into_attempt()
}

/// Conjugation attempt starting `offset_secs` after the fixed test instant,
/// lasting 30 seconds.
pub(crate) fn conjugation_attempt(offset_secs: i64, results: &[bool]) -> Attempt {
    let config = TestConfig::new([Tense::Praesens], [VerbCategory::Strong], [Person::Ich], 10);
    build(offset_secs, results, config, Some(30))
}

/// Vocabulary attempt without a recorded duration.
pub(crate) fn vocabulary_attempt(offset_secs: i64, results: &[bool]) -> Attempt {
    let config = TestConfig::vocabulary([VerbCategory::Strong], 10);
    build(offset_secs, results, config, None)
}
