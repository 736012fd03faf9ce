use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, IdempotencyKey, QuestionId};
use crate::model::{Difficulty, Person, TestConfig, TestMode, Tense, VerbCategory};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Invariant violations found when rehydrating a persisted or remote attempt.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score ({score}) exceeds total questions ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("total questions ({total}) does not match answer count ({answers})")]
    AnswerCountMismatch { total: u32, answers: usize },

    #[error("score ({score}) does not match correct answers ({correct})")]
    ScoreMismatch { score: u32, correct: u32 },

    #[error("percentage {stored} does not match score (expected {expected})")]
    PercentageMismatch { stored: f64, expected: f64 },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("too many answers for a single attempt: {0}")]
    TooManyAnswers(usize),
}

/// `100 * score / total`, rounded to two decimals. Zero when `total` is zero.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(score) * 10_000.0 / f64::from(total)).round() / 100.0
}

//
// ─── ANSWER DETAIL ─────────────────────────────────────────────────────────────
//

/// One answered question inside an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub infinitive: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tense: Option<Tense>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    pub category: VerbCategory,
    pub difficulty: Difficulty,
    pub correct_answer: String,
    pub user_answer: String,
    pub is_correct: bool,
}

//
// ─── SYNC STATE ────────────────────────────────────────────────────────────────
//

/// Whether the attempt has been mirrored to the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncState {
    #[must_use]
    pub fn unsynced() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn synced_at(at: DateTime<Utc>) -> Self {
        Self {
            synced: true,
            synced_at: Some(at),
        }
    }
}

//
// ─── SCORED ATTEMPT ────────────────────────────────────────────────────────────
//

/// Deterministic scoring output, before identifiers are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttempt {
    pub answers: Vec<AnsweredQuestion>,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub config: TestConfig,
}

impl ScoredAttempt {
    /// Finalizes the attempt with explicit identifiers.
    #[must_use]
    pub fn assign_ids(self, id: AttemptId, idempotency_key: IdempotencyKey) -> Attempt {
        Attempt {
            id,
            idempotency_key,
            answers: self.answers,
            score: self.score,
            total_questions: self.total_questions,
            percentage: self.percentage,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds: self.duration_seconds,
            config: self.config,
            sync: SyncState::unsynced(),
        }
    }

    /// Finalizes the attempt with freshly generated identifiers.
    #[must_use]
    pub fn into_attempt(self) -> Attempt {
        self.assign_ids(AttemptId::generate(), IdempotencyKey::generate())
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// A completed quiz. Only the sync state may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttemptRecord", into = "AttemptRecord")]
pub struct Attempt {
    id: AttemptId,
    idempotency_key: IdempotencyKey,
    answers: Vec<AnsweredQuestion>,
    score: u32,
    total_questions: u32,
    percentage: f64,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    duration_seconds: Option<i64>,
    config: TestConfig,
    sync: SyncState,
}

impl Attempt {
    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
    }

    #[must_use]
    pub fn answers(&self) -> &[AnsweredQuestion] {
        &self.answers
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<i64> {
        self.duration_seconds
    }

    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> TestMode {
        self.config.mode()
    }

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync.synced
    }

    pub fn set_sync_state(&mut self, state: SyncState) {
        self.sync = state;
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.sync = SyncState::synced_at(at);
    }
}

//
// ─── PERSISTED SHAPE ───────────────────────────────────────────────────────────
//

/// Serialized shape of an attempt, shared by the local ledger and the remote store.
///
/// Converting back into an [`Attempt`] re-checks every invariant so a corrupt
/// record never enters the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub idempotency_key: IdempotencyKey,
    pub answers: Vec<AnsweredQuestion>,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    pub config: TestConfig,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRecord> for Attempt {
    type Error = AttemptError;

    fn try_from(record: AttemptRecord) -> Result<Self, Self::Error> {
        if record.completed_at < record.started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        if record.score > record.total_questions {
            return Err(AttemptError::ScoreExceedsTotal {
                score: record.score,
                total: record.total_questions,
            });
        }
        let answers = u32::try_from(record.answers.len())
            .map_err(|_| AttemptError::TooManyAnswers(record.answers.len()))?;
        if answers != record.total_questions {
            return Err(AttemptError::AnswerCountMismatch {
                total: record.total_questions,
                answers: record.answers.len(),
            });
        }
        let correct = record.answers.iter().filter(|a| a.is_correct).count();
        let correct = u32::try_from(correct).map_err(|_| AttemptError::TooManyAnswers(correct))?;
        if correct != record.score {
            return Err(AttemptError::ScoreMismatch {
                score: record.score,
                correct,
            });
        }
        let expected = percentage(record.score, record.total_questions);
        if (expected - record.percentage).abs() > 0.005 {
            return Err(AttemptError::PercentageMismatch {
                stored: record.percentage,
                expected,
            });
        }

        Ok(Self {
            id: record.id,
            idempotency_key: record.idempotency_key,
            answers: record.answers,
            score: record.score,
            total_questions: record.total_questions,
            percentage: expected,
            started_at: record.started_at,
            completed_at: record.completed_at,
            duration_seconds: record.duration_seconds,
            config: record.config,
            sync: SyncState {
                synced: record.synced,
                synced_at: record.synced_at,
            },
        })
    }
}

impl From<Attempt> for AttemptRecord {
    fn from(attempt: Attempt) -> Self {
        Self {
            id: attempt.id,
            idempotency_key: attempt.idempotency_key,
            answers: attempt.answers,
            score: attempt.score,
            total_questions: attempt.total_questions,
            percentage: attempt.percentage,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            duration_seconds: attempt.duration_seconds,
            config: attempt.config,
            synced: attempt.sync.synced,
            synced_at: attempt.sync.synced_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
