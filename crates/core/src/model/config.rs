use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::catalog::VerbFilter;
use crate::model::{Difficulty, Person, Tense, VerbCategory};

pub const MIN_QUESTION_COUNT: u32 = 1;
pub const MAX_QUESTION_COUNT: u32 = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a test configuration cannot produce a full quiz.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("select at least one tense")]
    NoTenses,

    #[error("select at least one verb type")]
    NoCategories,

    #[error("select at least one person")]
    NoPersons,

    #[error("difficulty filter is set but selects no levels")]
    EmptyDifficulties,

    #[error("verb filter is set but selects no verbs")]
    EmptyVerbs,

    #[error("question count must be between {min} and {max} (got {count})")]
    QuestionCountOutOfRange { count: u32, min: u32, max: u32 },

    #[error("no verbs match the selected filters")]
    NoCandidateVerbs,

    #[error("only {available} questions can be generated, {requested} requested")]
    NotEnoughCombinations { available: usize, requested: u32 },
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// What a quiz asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    /// Conjugated form for a (verb, tense, person) combination.
    #[default]
    Conjugation,
    /// English translation of the infinitive.
    Vocabulary,
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Immutable description of what to generate.
///
/// Construction never fails; call [`TestConfig::shape_errors`] or
/// `QuestionGenerator::validate` before starting a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    tenses: BTreeSet<Tense>,
    #[serde(rename = "verb_types")]
    categories: BTreeSet<VerbCategory>,
    persons: BTreeSet<Person>,
    question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulties: Option<BTreeSet<Difficulty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verbs: Option<BTreeSet<String>>,
    #[serde(default)]
    mode: TestMode,
}

impl TestConfig {
    #[must_use]
    pub fn new(
        tenses: impl IntoIterator<Item = Tense>,
        categories: impl IntoIterator<Item = VerbCategory>,
        persons: impl IntoIterator<Item = Person>,
        question_count: u32,
    ) -> Self {
        Self {
            tenses: tenses.into_iter().collect(),
            categories: categories.into_iter().collect(),
            persons: persons.into_iter().collect(),
            question_count,
            difficulties: None,
            verbs: None,
            mode: TestMode::Conjugation,
        }
    }

    /// Vocabulary quiz over the given verb types. Tenses and persons are unused.
    #[must_use]
    pub fn vocabulary(
        categories: impl IntoIterator<Item = VerbCategory>,
        question_count: u32,
    ) -> Self {
        Self {
            mode: TestMode::Vocabulary,
            ..Self::new([], categories, [], question_count)
        }
    }

    #[must_use]
    pub fn with_difficulties(mut self, levels: impl IntoIterator<Item = Difficulty>) -> Self {
        self.difficulties = Some(levels.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_verbs<S: Into<String>>(mut self, infinitives: impl IntoIterator<Item = S>) -> Self {
        self.verbs = Some(infinitives.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn tenses(&self) -> &BTreeSet<Tense> {
        &self.tenses
    }

    #[must_use]
    pub fn categories(&self) -> &BTreeSet<VerbCategory> {
        &self.categories
    }

    #[must_use]
    pub fn persons(&self) -> &BTreeSet<Person> {
        &self.persons
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn difficulties(&self) -> Option<&BTreeSet<Difficulty>> {
        self.difficulties.as_ref()
    }

    #[must_use]
    pub fn verbs(&self) -> Option<&BTreeSet<String>> {
        self.verbs.as_ref()
    }

    #[must_use]
    pub fn mode(&self) -> TestMode {
        self.mode
    }

    /// Catalog criteria derived from category, difficulty and explicit verb constraints.
    #[must_use]
    pub fn verb_filter(&self) -> VerbFilter {
        VerbFilter {
            categories: Some(self.categories.clone()),
            difficulties: self.difficulties.clone(),
            infinitives: self.verbs.clone(),
        }
    }

    /// Checks that do not need the catalog: non-empty sets and count bounds.
    #[must_use]
    pub fn shape_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.mode == TestMode::Conjugation {
            if self.tenses.is_empty() {
                errors.push(ConfigError::NoTenses);
            }
            if self.persons.is_empty() {
                errors.push(ConfigError::NoPersons);
            }
        }
        if self.categories.is_empty() {
            errors.push(ConfigError::NoCategories);
        }
        if self.difficulties.as_ref().is_some_and(BTreeSet::is_empty) {
            errors.push(ConfigError::EmptyDifficulties);
        }
        if self.verbs.as_ref().is_some_and(BTreeSet::is_empty) {
            errors.push(ConfigError::EmptyVerbs);
        }
        if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&self.question_count) {
            errors.push(ConfigError::QuestionCountOutOfRange {
                count: self.question_count,
                min: MIN_QUESTION_COUNT,
                max: MAX_QUESTION_COUNT,
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sets_and_bad_count_are_all_reported() {
        let config = TestConfig::new([], [], [], 0).with_verbs(Vec::<String>::new());
        let errors = config.shape_errors();
        assert!(errors.contains(&ConfigError::NoTenses));
        assert!(errors.contains(&ConfigError::NoPersons));
        assert!(errors.contains(&ConfigError::NoCategories));
        assert!(errors.contains(&ConfigError::EmptyVerbs));
        assert!(errors.contains(&ConfigError::QuestionCountOutOfRange {
            count: 0,
            min: 1,
            max: 100
        }));
    }

    #[test]
    fn vocabulary_mode_ignores_tenses_and_persons() {
        let config = TestConfig::vocabulary([VerbCategory::Weak], 10);
        assert!(config.shape_errors().is_empty());
        assert_eq!(config.mode(), TestMode::Vocabulary);
    }

    #[test]
    fn count_above_maximum_is_rejected() {
        let config = TestConfig::new([Tense::Praesens], [VerbCategory::Weak], [Person::Ich], 101);
        assert_eq!(
            config.shape_errors(),
            vec![ConfigError::QuestionCountOutOfRange {
                count: 101,
                min: 1,
                max: 100
            }]
        );
    }

    #[test]
    fn verb_filter_carries_constraints() {
        let two = Difficulty::new(2).unwrap();
        let config = TestConfig::new([Tense::Praesens], [VerbCategory::Strong], [Person::Ich], 5)
            .with_difficulties([two])
            .with_verbs(["gehen"]);
        let filter = config.verb_filter();
        assert_eq!(filter.categories, Some(BTreeSet::from([VerbCategory::Strong])));
        assert_eq!(filter.difficulties, Some(BTreeSet::from([two])));
        assert_eq!(filter.infinitives, Some(BTreeSet::from(["gehen".to_owned()])));
    }

    #[test]
    fn config_serializes_with_wire_names() {
        let config = TestConfig::new([Tense::Praeteritum], [VerbCategory::Modal], [Person::Wir], 3);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["verb_types"], serde_json::json!(["modal"]));
        assert_eq!(json["tenses"], serde_json::json!(["präteritum"]));
        assert_eq!(json["mode"], "conjugation");
        let back: TestConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
