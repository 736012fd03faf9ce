//! In-memory verb catalog.
//!
//! The catalog is loaded wholesale from an external source and then answers
//! synchronous queries. Every query returns an empty result until the first
//! successful load; callers that need to block should await
//! [`VerbCatalog::wait_ready`].

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;

use crate::model::{Difficulty, Verb, VerbCategory, VerbDraft, VerbValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate infinitive in catalog: {0}")]
    DuplicateInfinitive(String),

    #[error("record {index} ({infinitive:?}): {source}")]
    InvalidRecord {
        index: usize,
        infinitive: String,
        #[source]
        source: VerbValidationError,
    },

    #[error("catalog payload is not a JSON array of verbs: {0}")]
    Malformed(String),
}

//
// ─── FILTER ────────────────────────────────────────────────────────────────────
//

/// Query criteria. Fields are ANDed; values inside a field are ORed; `None`
/// imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerbFilter {
    pub categories: Option<BTreeSet<VerbCategory>>,
    pub difficulties: Option<BTreeSet<Difficulty>>,
    pub infinitives: Option<BTreeSet<String>>,
}

impl VerbFilter {
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = VerbCategory>) -> Self {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_difficulties(mut self, levels: impl IntoIterator<Item = Difficulty>) -> Self {
        self.difficulties = Some(levels.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_infinitives<S: Into<String>>(
        mut self,
        infinitives: impl IntoIterator<Item = S>,
    ) -> Self {
        self.infinitives = Some(infinitives.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn matches(&self, verb: &Verb) -> bool {
        if let Some(categories) = &self.categories {
            if !categories.contains(&verb.category()) {
                return false;
            }
        }
        if let Some(levels) = &self.difficulties {
            if !levels.contains(&verb.difficulty()) {
                return false;
            }
        }
        if let Some(infinitives) = &self.infinitives {
            if !infinitives.contains(verb.infinitive()) {
                return false;
            }
        }
        true
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct Snapshot {
    verbs: Vec<Arc<Verb>>,
    by_infinitive: HashMap<String, Arc<Verb>>,
}

/// Read-through index over the externally supplied verb list.
///
/// A load swaps in a new snapshot under a write lock; queries clone the
/// current `Arc` and never observe a half-built index.
#[derive(Debug)]
pub struct VerbCatalog {
    snapshot: RwLock<Arc<Snapshot>>,
    ready: watch::Sender<bool>,
}

impl Default for VerbCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl VerbCatalog {
    #[must_use]
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            ready,
        }
    }

    /// Replaces the whole index.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateInfinitive` if two verbs share an
    /// infinitive. The previous snapshot stays in place on error.
    pub fn load(&self, verbs: Vec<Verb>) -> Result<(), CatalogError> {
        let mut by_infinitive = HashMap::with_capacity(verbs.len());
        let mut list = Vec::with_capacity(verbs.len());
        for verb in verbs {
            let verb = Arc::new(verb);
            let key = verb.infinitive().to_owned();
            if by_infinitive.insert(key.clone(), Arc::clone(&verb)).is_some() {
                return Err(CatalogError::DuplicateInfinitive(key));
            }
            list.push(verb);
        }

        let next = Arc::new(Snapshot {
            verbs: list,
            by_infinitive,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.ready.send_replace(true);
        Ok(())
    }

    /// Validates raw upload records and loads them.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidRecord` for the first record that fails
    /// validation, or `DuplicateInfinitive`.
    pub fn load_drafts(&self, drafts: Vec<VerbDraft>) -> Result<(), CatalogError> {
        let verbs = validate_drafts(drafts)?;
        self.load(verbs)
    }

    /// Drops the current snapshot and marks the catalog not ready until the
    /// next successful [`load`](Self::load).
    pub fn begin_reload(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(Snapshot::default());
        self.ready.send_replace(false);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the catalog is ready. Returns immediately if it already is.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current().verbs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn all(&self) -> Vec<Arc<Verb>> {
        self.current().verbs.clone()
    }

    #[must_use]
    pub fn get(&self, infinitive: &str) -> Option<Arc<Verb>> {
        self.current().by_infinitive.get(infinitive).cloned()
    }

    #[must_use]
    pub fn filter(&self, criteria: &VerbFilter) -> Vec<Arc<Verb>> {
        self.current()
            .verbs
            .iter()
            .filter(|verb| criteria.matches(verb))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match on infinitive or translation.
    #[must_use]
    pub fn search(&self, text: &str) -> Vec<Arc<Verb>> {
        let needle = text.trim().to_lowercase();
        self.current()
            .verbs
            .iter()
            .filter(|verb| {
                verb.infinitive().to_lowercase().contains(&needle)
                    || verb.english_translation().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Uniformly random selection of up to `n` matching verbs.
    #[must_use]
    pub fn sample(&self, n: usize, criteria: Option<&VerbFilter>) -> Vec<Arc<Verb>> {
        self.sample_with_rng(n, criteria, &mut rand::rng())
    }

    /// Like [`sample`](Self::sample) with a caller-supplied RNG.
    ///
    /// Shuffles a copy of the matches (Fisher–Yates) so the backing store is
    /// never reordered.
    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        n: usize,
        criteria: Option<&VerbFilter>,
        rng: &mut R,
    ) -> Vec<Arc<Verb>> {
        let mut matched = match criteria {
            Some(criteria) => self.filter(criteria),
            None => self.all(),
        };
        matched.shuffle(rng);
        matched.truncate(n);
        matched
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Parses a JSON array of upload records.
///
/// # Errors
///
/// Returns `CatalogError::Malformed` if the payload is not an array of objects.
pub fn parse_catalog_json(json: &str) -> Result<Vec<VerbDraft>, CatalogError> {
    serde_json::from_str(json).map_err(|e| CatalogError::Malformed(e.to_string()))
}

/// Validates every record, reporting the first failure with its position.
///
/// # Errors
///
/// Returns `CatalogError::InvalidRecord` for the first invalid record.
pub fn validate_drafts(drafts: Vec<VerbDraft>) -> Result<Vec<Verb>, CatalogError> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let infinitive = draft.infinitive.trim().to_owned();
            draft
                .validate()
                .map_err(|source| CatalogError::InvalidRecord {
                    index,
                    infinitive,
                    source,
                })
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConjugationTable, Person, Tense};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn verb(infinitive: &str, translation: &str, category: VerbCategory, level: i64) -> Verb {
        let mut table = ConjugationTable::new();
        table.insert(
            Tense::Praesens,
            BTreeMap::from([(Person::Ich, format!("{infinitive}-ich"))]),
        );
        Verb::new(
            infinitive,
            translation,
            category,
            infinitive,
            Difficulty::new(level).unwrap(),
            table,
        )
        .unwrap()
    }

    fn loaded() -> VerbCatalog {
        let catalog = VerbCatalog::new();
        catalog
            .load(vec![
                verb("gehen", "to go", VerbCategory::Strong, 2),
                verb("machen", "to make, to do", VerbCategory::Weak, 1),
                verb("sein", "to be", VerbCategory::Irregular, 3),
                verb("können", "to be able to", VerbCategory::Modal, 2),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn queries_before_load_are_empty() {
        let catalog = VerbCatalog::new();
        assert!(!catalog.is_ready());
        assert!(catalog.get("gehen").is_none());
        assert!(catalog.filter(&VerbFilter::any()).is_empty());
        assert!(catalog.search("go").is_empty());
        assert!(catalog.sample(3, None).is_empty());
    }

    #[test]
    fn load_rejects_duplicate_infinitive_and_keeps_previous_snapshot() {
        let catalog = loaded();
        let err = catalog
            .load(vec![
                verb("haben", "to have", VerbCategory::Irregular, 1),
                verb("haben", "to own", VerbCategory::Irregular, 1),
            ])
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateInfinitive("haben".into()));
        assert_eq!(catalog.len(), 4);
        assert!(catalog.get("gehen").is_some());
    }

    #[test]
    fn filter_ands_fields_and_ors_values() {
        let catalog = loaded();
        let two = Difficulty::new(2).unwrap();

        let strong_or_modal = VerbFilter::any()
            .with_categories([VerbCategory::Strong, VerbCategory::Modal]);
        assert_eq!(catalog.filter(&strong_or_modal).len(), 2);

        let level_two_weak = VerbFilter::any()
            .with_categories([VerbCategory::Weak])
            .with_difficulties([two]);
        assert!(catalog.filter(&level_two_weak).is_empty());

        let named = VerbFilter::any().with_infinitives(["sein", "gehen"]);
        let mut names: Vec<_> = catalog
            .filter(&named)
            .iter()
            .map(|v| v.infinitive().to_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["gehen", "sein"]);
    }

    #[test]
    fn search_matches_infinitive_or_translation_case_insensitively() {
        let catalog = loaded();
        assert_eq!(catalog.search("GEH").len(), 1);
        let be: Vec<_> = catalog
            .search("To Be")
            .iter()
            .map(|v| v.infinitive().to_owned())
            .collect();
        assert_eq!(be.len(), 2);
        assert!(be.contains(&"sein".to_owned()));
        assert!(be.contains(&"können".to_owned()));
    }

    #[test]
    fn sample_never_reorders_backing_store() {
        let catalog = loaded();
        let before: Vec<_> = catalog.all().iter().map(|v| v.infinitive().to_owned()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = catalog.sample_with_rng(2, None, &mut rng);
            assert_eq!(picked.len(), 2);
        }
        let after: Vec<_> = catalog.all().iter().map(|v| v.infinitive().to_owned()).collect();
        assert_eq!(before, after);
        assert_eq!(catalog.sample(10, None).len(), 4);
    }

    #[test]
    fn sample_is_roughly_uniform() {
        let catalog = loaded();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let rounds = 8_000;
        for _ in 0..rounds {
            for verb in catalog.sample_with_rng(1, None, &mut rng) {
                *counts.entry(verb.infinitive().to_owned()).or_default() += 1;
            }
        }
        // Expected 2000 per verb; allow a generous band.
        for name in ["gehen", "machen", "sein", "können"] {
            let seen = counts.get(name).copied().unwrap_or_default();
            assert!((1_700..=2_300).contains(&seen), "{name} picked {seen} times");
        }
    }

    #[test]
    fn load_drafts_reports_record_index() {
        let catalog = VerbCatalog::new();
        let good = VerbDraft::from(&verb("gehen", "to go", VerbCategory::Strong, 2));
        let mut bad = good.clone();
        bad.infinitive = "laufen".into();
        bad.difficulty_level = 9;

        let err = catalog.load_drafts(vec![good, bad]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::InvalidRecord {
                index: 1,
                infinitive: "laufen".into(),
                source: VerbValidationError::InvalidDifficulty(9),
            }
        );
        assert!(!catalog.is_ready());
    }

    #[test]
    fn parse_catalog_json_reads_upload_format() {
        let json = r#"[{
            "infinitive": "gehen",
            "english_translation": "to go",
            "verb_type": "strong",
            "stem": "geh",
            "difficulty_level": 2,
            "conjugations": {"präsens": {"ich": "gehe", "du": "gehst"}}
        }]"#;
        let drafts = parse_catalog_json(json).unwrap();
        let catalog = VerbCatalog::new();
        catalog.load_drafts(drafts).unwrap();
        let gehen = catalog.get("gehen").unwrap();
        assert_eq!(gehen.conjugation(Tense::Praesens, Person::Du), Some("gehst"));

        assert!(matches!(
            parse_catalog_json("{}"),
            Err(CatalogError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn wait_ready_resolves_after_load() {
        let catalog = Arc::new(VerbCatalog::new());
        let waiter = {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.wait_ready().await })
        };
        tokio::task::yield_now().await;
        catalog
            .load(vec![verb("gehen", "to go", VerbCategory::Strong, 2)])
            .unwrap();
        waiter.await.unwrap();
        assert!(catalog.is_ready());
    }

    #[test]
    fn begin_reload_resets_readiness() {
        let catalog = loaded();
        catalog.begin_reload();
        assert!(!catalog.is_ready());
        assert!(catalog.is_empty());
        catalog
            .load(vec![verb("sein", "to be", VerbCategory::Irregular, 3)])
            .unwrap();
        assert!(catalog.is_ready());
        assert_eq!(catalog.len(), 1);
    }
}
