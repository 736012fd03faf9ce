mod attempt;
mod config;
mod ids;
mod question;
mod verb;

pub use attempt::{
    AnsweredQuestion, Attempt, AttemptError, AttemptRecord, ScoredAttempt, SyncState, percentage,
};
pub use config::{ConfigError, MAX_QUESTION_COUNT, MIN_QUESTION_COUNT, TestConfig, TestMode};
pub use ids::{AttemptId, IdempotencyKey, ParseIdError, QuestionId};
pub use question::{Question, QuestionKind, VerbRef};
pub use verb::{
    ConjugationTable, Difficulty, Person, Tense, UnknownPersonError, Verb, VerbCategory,
    VerbDraft, VerbValidationError,
};
