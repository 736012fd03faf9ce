use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Field-level problems with a single catalog record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerbValidationError {
    #[error("infinitive cannot be empty")]
    EmptyInfinitive,

    #[error("english_translation cannot be empty")]
    EmptyTranslation,

    #[error("verb_type must be one of weak, strong, irregular, modal (got {0:?})")]
    UnknownVerbType(String),

    #[error("stem cannot be empty")]
    EmptyStem,

    #[error("difficulty_level must be an integer between 1 and 5 (got {0})")]
    InvalidDifficulty(i64),

    #[error("conjugations must contain at least one tense")]
    NoConjugations,

    #[error("conjugations: unknown tense {0:?}")]
    UnknownTense(String),

    #[error("conjugations.{tense}: unknown person {person:?}")]
    UnknownPerson { tense: Tense, person: String },

    #[error("conjugations.{0} must contain at least one person")]
    EmptyTense(Tense),

    #[error("conjugations.{tense}.{person} cannot be empty")]
    EmptyForm { tense: Tense, person: Person },
}

/// A person key that is not one of the six grammatical persons.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown person {0:?}")]
pub struct UnknownPersonError(pub String);

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Grammatical class of a verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbCategory {
    Weak,
    Strong,
    Irregular,
    Modal,
}

impl VerbCategory {
    pub const ALL: [VerbCategory; 4] = [
        VerbCategory::Weak,
        VerbCategory::Strong,
        VerbCategory::Irregular,
        VerbCategory::Modal,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerbCategory::Weak => "weak",
            VerbCategory::Strong => "strong",
            VerbCategory::Irregular => "irregular",
            VerbCategory::Modal => "modal",
        }
    }
}

impl fmt::Display for VerbCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerbCategory {
    type Err = VerbValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weak" => Ok(Self::Weak),
            "strong" => Ok(Self::Strong),
            "irregular" => Ok(Self::Irregular),
            "modal" => Ok(Self::Modal),
            _ => Err(VerbValidationError::UnknownVerbType(s.to_owned())),
        }
    }
}

//
// ─── TENSE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tense {
    #[serde(rename = "präsens", alias = "praesens")]
    Praesens,
    #[serde(rename = "präteritum", alias = "praeteritum")]
    Praeteritum,
    #[serde(rename = "perfekt")]
    Perfekt,
    #[serde(rename = "plusquamperfekt")]
    Plusquamperfekt,
    #[serde(rename = "futur_i")]
    FuturI,
    #[serde(rename = "futur_ii")]
    FuturII,
    #[serde(rename = "konjunktiv_i")]
    KonjunktivI,
    #[serde(rename = "konjunktiv_ii")]
    KonjunktivII,
    #[serde(rename = "imperativ")]
    Imperativ,
}

impl Tense {
    /// Storage/wire key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tense::Praesens => "präsens",
            Tense::Praeteritum => "präteritum",
            Tense::Perfekt => "perfekt",
            Tense::Plusquamperfekt => "plusquamperfekt",
            Tense::FuturI => "futur_i",
            Tense::FuturII => "futur_ii",
            Tense::KonjunktivI => "konjunktiv_i",
            Tense::KonjunktivII => "konjunktiv_ii",
            Tense::Imperativ => "imperativ",
        }
    }

    /// Human-readable German label used in prompts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Tense::Praesens => "Präsens",
            Tense::Praeteritum => "Präteritum",
            Tense::Perfekt => "Perfekt",
            Tense::Plusquamperfekt => "Plusquamperfekt",
            Tense::FuturI => "Futur I",
            Tense::FuturII => "Futur II",
            Tense::KonjunktivI => "Konjunktiv I",
            Tense::KonjunktivII => "Konjunktiv II",
            Tense::Imperativ => "Imperativ",
        }
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tense {
    type Err = VerbValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "präsens" | "praesens" => Ok(Self::Praesens),
            "präteritum" | "praeteritum" => Ok(Self::Praeteritum),
            "perfekt" => Ok(Self::Perfekt),
            "plusquamperfekt" => Ok(Self::Plusquamperfekt),
            "futur_i" | "futur1" => Ok(Self::FuturI),
            "futur_ii" | "futur2" => Ok(Self::FuturII),
            "konjunktiv_i" => Ok(Self::KonjunktivI),
            "konjunktiv_ii" => Ok(Self::KonjunktivII),
            "imperativ" => Ok(Self::Imperativ),
            _ => Err(VerbValidationError::UnknownTense(s.to_owned())),
        }
    }
}

//
// ─── PERSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Person {
    #[serde(rename = "ich")]
    Ich,
    #[serde(rename = "du")]
    Du,
    #[serde(rename = "er/sie/es", alias = "er")]
    ErSieEs,
    #[serde(rename = "wir")]
    Wir,
    #[serde(rename = "ihr")]
    Ihr,
    #[serde(rename = "sie/Sie", alias = "Sie")]
    SieSie,
}

impl Person {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Person::Ich => "ich",
            Person::Du => "du",
            Person::ErSieEs => "er/sie/es",
            Person::Wir => "wir",
            Person::Ihr => "ihr",
            Person::SieSie => "sie/Sie",
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Person {
    type Err = UnknownPersonError;

    /// Accepts the canonical keys plus `er` and `Sie`. A bare lowercase `sie`
    /// is ambiguous and rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "Sie" {
            return Ok(Self::SieSie);
        }
        match trimmed.to_lowercase().as_str() {
            "ich" => Ok(Self::Ich),
            "du" => Ok(Self::Du),
            "er/sie/es" | "er" => Ok(Self::ErSieEs),
            "wir" => Ok(Self::Wir),
            "ihr" => Ok(Self::Ihr),
            "sie/sie" => Ok(Self::SieSie),
            _ => Err(UnknownPersonError(s.to_owned())),
        }
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty level in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns `VerbValidationError::InvalidDifficulty` outside `1..=5`.
    pub fn new(level: i64) -> Result<Self, VerbValidationError> {
        u8::try_from(level)
            .ok()
            .filter(|l| (Self::MIN..=Self::MAX).contains(l))
            .map(Self)
            .ok_or(VerbValidationError::InvalidDifficulty(level))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = VerbValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Difficulty> for i64 {
    fn from(d: Difficulty) -> Self {
        i64::from(d.0)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── VERB ──────────────────────────────────────────────────────────────────────
//

/// Sparse tense → person → form table.
pub type ConjugationTable = BTreeMap<Tense, BTreeMap<Person, String>>;

/// A validated catalog entry. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verb {
    infinitive: String,
    english_translation: String,
    category: VerbCategory,
    stem: String,
    difficulty: Difficulty,
    conjugations: ConjugationTable,
}

impl Verb {
    /// Builds a verb from already-typed parts, trimming text fields.
    ///
    /// # Errors
    ///
    /// Returns the first `VerbValidationError` found.
    pub fn new(
        infinitive: impl Into<String>,
        english_translation: impl Into<String>,
        category: VerbCategory,
        stem: impl Into<String>,
        difficulty: Difficulty,
        conjugations: ConjugationTable,
    ) -> Result<Self, VerbValidationError> {
        let infinitive = infinitive.into().trim().to_owned();
        if infinitive.is_empty() {
            return Err(VerbValidationError::EmptyInfinitive);
        }
        let english_translation = english_translation.into().trim().to_owned();
        if english_translation.is_empty() {
            return Err(VerbValidationError::EmptyTranslation);
        }
        let stem = stem.into().trim().to_owned();
        if stem.is_empty() {
            return Err(VerbValidationError::EmptyStem);
        }
        if conjugations.is_empty() {
            return Err(VerbValidationError::NoConjugations);
        }

        let mut table = ConjugationTable::new();
        for (tense, persons) in conjugations {
            if persons.is_empty() {
                return Err(VerbValidationError::EmptyTense(tense));
            }
            let mut forms = BTreeMap::new();
            for (person, form) in persons {
                let form = form.trim().to_owned();
                if form.is_empty() {
                    return Err(VerbValidationError::EmptyForm { tense, person });
                }
                forms.insert(person, form);
            }
            table.insert(tense, forms);
        }

        Ok(Self {
            infinitive,
            english_translation,
            category,
            stem,
            difficulty,
            conjugations: table,
        })
    }

    #[must_use]
    pub fn infinitive(&self) -> &str {
        &self.infinitive
    }

    #[must_use]
    pub fn english_translation(&self) -> &str {
        &self.english_translation
    }

    #[must_use]
    pub fn category(&self) -> VerbCategory {
        self.category
    }

    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn conjugations(&self) -> &ConjugationTable {
        &self.conjugations
    }

    /// Looks up the form for `(tense, person)`, if this verb defines it.
    #[must_use]
    pub fn conjugation(&self, tense: Tense, person: Person) -> Option<&str> {
        self.conjugations
            .get(&tense)
            .and_then(|forms| forms.get(&person))
            .map(String::as_str)
    }

    /// True when every requested tense defines every requested person.
    #[must_use]
    pub fn covers(&self, tenses: &BTreeSet<Tense>, persons: &BTreeSet<Person>) -> bool {
        tenses.iter().all(|tense| {
            persons
                .iter()
                .all(|person| self.conjugation(*tense, *person).is_some())
        })
    }
}

//
// ─── UPLOAD RECORD ─────────────────────────────────────────────────────────────
//

/// Raw catalog record as produced by the upload collaborator.
///
/// Every field defaults so that a missing field surfaces as a field-specific
/// validation error instead of a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbDraft {
    pub infinitive: String,
    pub english_translation: String,
    pub verb_type: String,
    pub stem: String,
    pub difficulty_level: i64,
    pub conjugations: BTreeMap<String, BTreeMap<String, String>>,
}

impl VerbDraft {
    /// Validates the record against the catalog input contract.
    ///
    /// # Errors
    ///
    /// Returns the first field-level `VerbValidationError`.
    pub fn validate(self) -> Result<Verb, VerbValidationError> {
        if self.infinitive.trim().is_empty() {
            return Err(VerbValidationError::EmptyInfinitive);
        }
        if self.english_translation.trim().is_empty() {
            return Err(VerbValidationError::EmptyTranslation);
        }
        let category: VerbCategory = self.verb_type.parse()?;
        if self.stem.trim().is_empty() {
            return Err(VerbValidationError::EmptyStem);
        }
        let difficulty = Difficulty::new(self.difficulty_level)?;
        if self.conjugations.is_empty() {
            return Err(VerbValidationError::NoConjugations);
        }

        let mut table = ConjugationTable::new();
        for (raw_tense, raw_persons) in self.conjugations {
            let tense: Tense = raw_tense.parse()?;
            let mut forms = BTreeMap::new();
            for (raw_person, form) in raw_persons {
                let person: Person = raw_person
                    .parse()
                    .map_err(|_| VerbValidationError::UnknownPerson {
                        tense,
                        person: raw_person.clone(),
                    })?;
                forms.insert(person, form);
            }
            table.insert(tense, forms);
        }

        Verb::new(
            self.infinitive,
            self.english_translation,
            category,
            self.stem,
            difficulty,
            table,
        )
    }
}

impl From<&Verb> for VerbDraft {
    fn from(verb: &Verb) -> Self {
        Self {
            infinitive: verb.infinitive.clone(),
            english_translation: verb.english_translation.clone(),
            verb_type: verb.category.as_str().to_owned(),
            stem: verb.stem.clone(),
            difficulty_level: i64::from(verb.difficulty),
            conjugations: verb
                .conjugations
                .iter()
                .map(|(tense, forms)| {
                    let forms = forms
                        .iter()
                        .map(|(person, form)| (person.as_str().to_owned(), form.clone()))
                        .collect();
                    (tense.as_str().to_owned(), forms)
                })
                .collect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn gehen_draft() -> VerbDraft {
        let mut praesens = BTreeMap::new();
        praesens.insert("ich".to_owned(), "gehe".to_owned());
        praesens.insert("du".to_owned(), " gehst ".to_owned());
        let mut praeteritum = BTreeMap::new();
        praeteritum.insert("ich".to_owned(), "ging".to_owned());

        let mut conjugations = BTreeMap::new();
        conjugations.insert("präsens".to_owned(), praesens);
        conjugations.insert("praeteritum".to_owned(), praeteritum);

        VerbDraft {
            infinitive: "gehen".into(),
            english_translation: "to go".into(),
            verb_type: "strong".into(),
            stem: "geh".into(),
            difficulty_level: 2,
            conjugations,
        }
    }

    #[test]
    fn valid_draft_produces_verb() {
        let verb = gehen_draft().validate().unwrap();
        assert_eq!(verb.infinitive(), "gehen");
        assert_eq!(verb.category(), VerbCategory::Strong);
        assert_eq!(verb.difficulty().value(), 2);
        assert_eq!(verb.conjugation(Tense::Praesens, Person::Du), Some("gehst"));
        assert_eq!(verb.conjugation(Tense::Praeteritum, Person::Ich), Some("ging"));
        assert_eq!(verb.conjugation(Tense::Perfekt, Person::Ich), None);
    }

    #[test]
    fn draft_errors_name_the_field() {
        let mut draft = gehen_draft();
        draft.english_translation = "  ".into();
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::EmptyTranslation
        );

        let mut draft = gehen_draft();
        draft.verb_type = "mixed".into();
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::UnknownVerbType("mixed".into())
        );

        let mut draft = gehen_draft();
        draft.difficulty_level = 6;
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::InvalidDifficulty(6)
        );

        let mut draft = gehen_draft();
        draft.stem = String::new();
        assert_eq!(draft.validate().unwrap_err(), VerbValidationError::EmptyStem);
    }

    #[test]
    fn draft_rejects_bad_conjugation_tables() {
        let mut draft = gehen_draft();
        draft.conjugations.clear();
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::NoConjugations
        );

        let mut draft = gehen_draft();
        draft
            .conjugations
            .insert("aorist".into(), BTreeMap::from([("ich".into(), "x".into())]));
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::UnknownTense("aorist".into())
        );

        let mut draft = gehen_draft();
        draft.conjugations.insert("perfekt".into(), BTreeMap::new());
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::EmptyTense(Tense::Perfekt)
        );

        let mut draft = gehen_draft();
        draft
            .conjugations
            .insert("perfekt".into(), BTreeMap::from([("sie".into(), "x".into())]));
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::UnknownPerson {
                tense: Tense::Perfekt,
                person: "sie".into()
            }
        );

        let mut draft = gehen_draft();
        draft
            .conjugations
            .insert("perfekt".into(), BTreeMap::from([("wir".into(), " ".into())]));
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::EmptyForm {
                tense: Tense::Perfekt,
                person: Person::Wir
            }
        );
    }

    #[test]
    fn missing_json_fields_become_field_errors() {
        let draft: VerbDraft =
            serde_json::from_str(r#"{"english_translation": "to go"}"#).unwrap();
        assert_eq!(
            draft.validate().unwrap_err(),
            VerbValidationError::EmptyInfinitive
        );
    }

    #[test]
    fn covers_requires_every_combination() {
        let verb = gehen_draft().validate().unwrap();
        let tenses = BTreeSet::from([Tense::Praesens, Tense::Praeteritum]);
        assert!(verb.covers(&tenses, &BTreeSet::from([Person::Ich])));
        assert!(!verb.covers(&tenses, &BTreeSet::from([Person::Ich, Person::Du])));
    }

    #[test]
    fn person_and_tense_parsing() {
        assert_eq!("Sie".parse::<Person>().unwrap(), Person::SieSie);
        assert_eq!("er".parse::<Person>().unwrap(), Person::ErSieEs);
        assert!("sie".parse::<Person>().is_err());
        assert_eq!("Präteritum".parse::<Tense>().unwrap(), Tense::Praeteritum);
        assert_eq!(
            serde_json::to_string(&Tense::Praesens).unwrap(),
            "\"präsens\""
        );
    }

    #[test]
    fn draft_conversion_round_trips_through_validation() {
        let verb = gehen_draft().validate().unwrap();
        let again = VerbDraft::from(&verb).validate().unwrap();
        assert_eq!(again, verb);
    }
}
