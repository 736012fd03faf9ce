//! Combinatorial question generation.
//!
//! A quiz is drawn from the full cross-product of candidate verbs, requested
//! tenses and requested persons, shuffled, then truncated to the requested
//! count. No (verb, tense, person) triple appears twice.

use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::catalog::VerbCatalog;
use crate::model::{ConfigError, Person, Question, Tense, TestConfig, TestMode, Verb};

/// Outcome of [`QuestionGenerator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigValidation {
    pub errors: Vec<ConfigError>,
    /// Number of distinct questions the configuration can produce.
    pub available: usize,
}

impl ConfigValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A candidate question before it is assigned an id.
struct Combination<'a> {
    verb: &'a Verb,
    tense: Tense,
    person: Person,
}

/// Turns a [`TestConfig`] into questions using the catalog's current snapshot.
#[derive(Debug, Clone, Copy)]
pub struct QuestionGenerator<'a> {
    catalog: &'a VerbCatalog,
}

impl<'a> QuestionGenerator<'a> {
    #[must_use]
    pub fn new(catalog: &'a VerbCatalog) -> Self {
        Self { catalog }
    }

    /// Generates up to `config.question_count()` questions.
    ///
    /// An empty result means the configuration cannot start a quiz.
    #[must_use]
    pub fn generate(&self, config: &TestConfig) -> Vec<Question> {
        self.generate_with_rng(config, &mut rand::rng())
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        config: &TestConfig,
        rng: &mut R,
    ) -> Vec<Question> {
        let candidates = self.candidates(config);
        let take = usize::try_from(config.question_count()).unwrap_or(usize::MAX);

        match config.mode() {
            TestMode::Conjugation => {
                let mut combinations = combinations(&candidates, config);
                combinations.shuffle(rng);
                combinations
                    .into_iter()
                    .take(take)
                    .filter_map(|c| Question::conjugation(c.verb, c.tense, c.person))
                    .collect()
            }
            TestMode::Vocabulary => {
                let mut verbs: Vec<&Verb> = candidates.iter().map(|v| &**v).collect();
                verbs.shuffle(rng);
                verbs.into_iter().take(take).map(Question::vocabulary).collect()
            }
        }
    }

    /// Reports every reason the configuration would not yield a full quiz.
    #[must_use]
    pub fn validate(&self, config: &TestConfig) -> ConfigValidation {
        let mut errors = config.shape_errors();
        if !errors.is_empty() {
            return ConfigValidation {
                errors,
                available: 0,
            };
        }

        let candidates = self.candidates(config);
        let available = match config.mode() {
            TestMode::Conjugation => combinations(&candidates, config).len(),
            TestMode::Vocabulary => candidates.len(),
        };

        if candidates.is_empty() {
            errors.push(ConfigError::NoCandidateVerbs);
        } else if available < usize::try_from(config.question_count()).unwrap_or(usize::MAX) {
            errors.push(ConfigError::NotEnoughCombinations {
                available,
                requested: config.question_count(),
            });
        }

        ConfigValidation { errors, available }
    }

    /// Verbs matching the filters that can answer every requested combination.
    fn candidates(&self, config: &TestConfig) -> Vec<Arc<Verb>> {
        let mut verbs = self.catalog.filter(&config.verb_filter());
        if config.mode() == TestMode::Conjugation {
            verbs.retain(|verb| verb.covers(config.tenses(), config.persons()));
        }
        verbs
    }
}

/// Cross-product of verbs, tenses and persons. Triples without a defined form
/// are dropped even though `candidates` should already have excluded them.
fn combinations<'v>(verbs: &'v [Arc<Verb>], config: &TestConfig) -> Vec<Combination<'v>> {
    let mut out = Vec::with_capacity(verbs.len() * config.tenses().len() * config.persons().len());
    for verb in verbs {
        for tense in config.tenses() {
            for person in config.persons() {
                if verb.conjugation(*tense, *person).is_some() {
                    out.push(Combination {
                        verb: &**verb,
                        tense: *tense,
                        person: *person,
                    });
                }
            }
        }
    }
    out
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
