use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::{Difficulty, Person, Tense, Verb, VerbCategory};

/// Snapshot of the verb a question was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbRef {
    pub infinitive: String,
    pub english_translation: String,
    pub category: VerbCategory,
    pub difficulty: Difficulty,
}

impl From<&Verb> for VerbRef {
    fn from(verb: &Verb) -> Self {
        Self {
            infinitive: verb.infinitive().to_owned(),
            english_translation: verb.english_translation().to_owned(),
            category: verb.category(),
            difficulty: verb.difficulty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    Conjugation { tense: Tense, person: Person },
    Vocabulary,
}

/// A generated quiz item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    verb: VerbRef,
    kind: QuestionKind,
    prompt: String,
    correct_answer: String,
}

impl Question {
    /// Builds a conjugation question, resolving the canonical answer from the
    /// verb's table. Returns `None` when the verb does not define the form.
    #[must_use]
    pub fn conjugation(verb: &Verb, tense: Tense, person: Person) -> Option<Self> {
        let answer = verb.conjugation(tense, person)?;
        Some(Self {
            id: QuestionId::generate(),
            prompt: format!(
                "{person} ___ ({infinitive}, {tense})",
                person = person.as_str(),
                infinitive = verb.infinitive(),
                tense = tense.label(),
            ),
            correct_answer: answer.to_owned(),
            kind: QuestionKind::Conjugation { tense, person },
            verb: VerbRef::from(verb),
        })
    }

    /// Builds a vocabulary question whose answer is the English translation.
    #[must_use]
    pub fn vocabulary(verb: &Verb) -> Self {
        Self {
            id: QuestionId::generate(),
            prompt: format!("What does \"{}\" mean?", verb.infinitive()),
            correct_answer: verb.english_translation().to_owned(),
            kind: QuestionKind::Vocabulary,
            verb: VerbRef::from(verb),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn verb(&self) -> &VerbRef {
        &self.verb
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn tense(&self) -> Option<Tense> {
        match self.kind {
            QuestionKind::Conjugation { tense, .. } => Some(tense),
            QuestionKind::Vocabulary => None,
        }
    }

    #[must_use]
    pub fn person(&self) -> Option<Person> {
        match self.kind {
            QuestionKind::Conjugation { person, .. } => Some(person),
            QuestionKind::Vocabulary => None,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn is_vocabulary(&self) -> bool {
        matches!(self.kind, QuestionKind::Vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConjugationTable;
    use std::collections::BTreeMap;

    fn gehen() -> Verb {
        let mut table = ConjugationTable::new();
        table.insert(
            Tense::Praesens,
            BTreeMap::from([(Person::Ich, "gehe".to_owned())]),
        );
        Verb::new(
            "gehen",
            "to go",
            VerbCategory::Strong,
            "geh",
            Difficulty::new(2).unwrap(),
            table,
        )
        .unwrap()
    }

    #[test]
    fn conjugation_question_resolves_answer() {
        let q = Question::conjugation(&gehen(), Tense::Praesens, Person::Ich).unwrap();
        assert_eq!(q.correct_answer(), "gehe");
        assert_eq!(q.tense(), Some(Tense::Praesens));
        assert_eq!(q.person(), Some(Person::Ich));
        assert_eq!(q.verb().infinitive, "gehen");
        assert!(q.prompt().contains("Präsens"));
    }

    #[test]
    fn missing_form_yields_no_question() {
        assert!(Question::conjugation(&gehen(), Tense::Perfekt, Person::Ich).is_none());
    }

    #[test]
    fn vocabulary_question_asks_for_translation() {
        let q = Question::vocabulary(&gehen());
        assert!(q.is_vocabulary());
        assert_eq!(q.correct_answer(), "to go");
        assert_eq!(q.tense(), None);
    }
}
