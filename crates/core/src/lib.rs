#![forbid(unsafe_code)]

pub mod catalog;
pub mod generator;
pub mod model;
pub mod scoring;
pub mod time;

pub use catalog::{CatalogError, VerbCatalog, VerbFilter};
pub use generator::{ConfigValidation, QuestionGenerator};
pub use scoring::{AnswerFeedback, ScoringEngine};
pub use time::Clock;
