use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use drill_core::model::{Attempt, Question, QuestionId, TestConfig};
use drill_core::{AnswerFeedback, Clock, QuestionGenerator, ScoringEngine, VerbCatalog};

use crate::error::PracticeError;
use crate::ledger::AttemptLedger;

/// A quiz in progress: generated questions plus the answers given so far.
#[derive(Debug, Clone)]
pub struct PracticeRun {
    config: TestConfig,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, String>,
    started_at: DateTime<Utc>,
}

impl PracticeRun {
    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&str> {
        self.answers.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.questions.len()
    }

    /// First question without an answer, in presentation order.
    #[must_use]
    pub fn next_unanswered(&self) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| !self.answers.contains_key(&q.id()))
    }

    /// Record (or replace) the answer to `id` and report how close it was.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::UnknownQuestion` if `id` is not part of this run.
    pub fn answer(
        &mut self,
        id: QuestionId,
        text: impl Into<String>,
    ) -> Result<AnswerFeedback, PracticeError> {
        let question = self
            .question(id)
            .ok_or(PracticeError::UnknownQuestion(id))?;
        let text = text.into();
        let feedback = ScoringEngine::feedback(question, &text);
        self.answers.insert(id, text);
        Ok(feedback)
    }
}

/// Generate → answer → score → persist.
pub struct PracticeService {
    catalog: Arc<VerbCatalog>,
    ledger: Arc<AttemptLedger>,
    clock: Clock,
}

impl PracticeService {
    #[must_use]
    pub fn new(catalog: Arc<VerbCatalog>, ledger: Arc<AttemptLedger>, clock: Clock) -> Self {
        Self {
            catalog,
            ledger,
            clock,
        }
    }

    /// Start a quiz for `config`.
    ///
    /// A satisfiable config that yields fewer combinations than requested
    /// starts with the smaller set.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::CatalogNotReady` before the first catalog load,
    /// `InvalidConfig` for malformed configurations, or `NoQuestions` when no
    /// verb satisfies the filters.
    pub fn start(&self, config: TestConfig) -> Result<PracticeRun, PracticeError> {
        self.start_with_rng(config, &mut rand::rng())
    }

    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with_rng<R: Rng + ?Sized>(
        &self,
        config: TestConfig,
        rng: &mut R,
    ) -> Result<PracticeRun, PracticeError> {
        if !self.catalog.is_ready() {
            return Err(PracticeError::CatalogNotReady);
        }
        let errors = config.shape_errors();
        if !errors.is_empty() {
            return Err(PracticeError::InvalidConfig(errors));
        }

        let questions = QuestionGenerator::new(&self.catalog).generate_with_rng(&config, rng);
        if questions.is_empty() {
            return Err(PracticeError::NoQuestions);
        }
        tracing::debug!(
            questions = questions.len(),
            requested = config.question_count(),
            "practice run started"
        );

        Ok(PracticeRun {
            config,
            questions,
            answers: HashMap::new(),
            started_at: self.clock.now(),
        })
    }

    /// Score the run, give it fresh identifiers and append it to the ledger.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Ledger` if the attempt cannot be persisted
    /// (including a full store). The attempt is not retained in that case.
    pub async fn finish(&self, run: PracticeRun) -> Result<Attempt, PracticeError> {
        let scored = ScoringEngine::new(self.clock).score(
            &run.questions,
            &run.answers,
            Some(run.started_at),
            &run.config,
        );
        let attempt = scored.into_attempt();
        self.ledger.append(attempt.clone()).await?;
        tracing::info!(
            id = %attempt.id(),
            score = attempt.score(),
            total = attempt.total_questions(),
            "practice run finished"
        );
        Ok(attempt)
    }
}
