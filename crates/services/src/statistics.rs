//! Aggregate progress figures derived from ledger contents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use drill_core::model::{
    AnsweredQuestion, Attempt, Difficulty, Person, Tense, TestMode, VerbCategory,
};

/// Mean-percentage change below which the trend counts as flat.
const STABLE_THRESHOLD: f64 = 1.0;

/// Restricts which attempts feed [`compute`]. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsFilter {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub mode: Option<TestMode>,
}

impl StatisticsFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn matches(&self, attempt: &Attempt) -> bool {
        let started = attempt.started_at();
        self.from.is_none_or(|from| started >= from)
            && self.until.is_none_or(|until| started <= until)
            && self.mode.is_none_or(|mode| attempt.mode() == mode)
    }
}

/// Correct/attempted counts for one dimension value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub attempted: u32,
    pub correct: u32,
}

impl Breakdown {
    fn record(&mut self, is_correct: bool) {
        self.attempted = self.attempted.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        drill_core::model::percentage(self.correct, self.attempted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Older-half versus newer-half comparison of mean percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub older_mean: f64,
    pub newer_mean: f64,
    pub change: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_attempts: usize,
    pub total_questions: u64,
    pub total_correct: u64,
    pub average_percentage: f64,
    pub best_percentage: Option<f64>,
    pub worst_percentage: Option<f64>,
    /// Mean over attempts that recorded a duration.
    pub average_duration_seconds: Option<f64>,
    pub by_tense: BTreeMap<Tense, Breakdown>,
    pub by_person: BTreeMap<Person, Breakdown>,
    pub by_category: BTreeMap<VerbCategory, Breakdown>,
    pub by_difficulty: BTreeMap<Difficulty, Breakdown>,
    pub trend: Option<Trend>,
}

/// Aggregates the attempts selected by `filter`.
///
/// Dimension breakdowns only count conjugation attempts; vocabulary attempts
/// still contribute to the top-level totals.
#[must_use]
pub fn compute(attempts: &[Attempt], filter: &StatisticsFilter) -> Statistics {
    let mut selected: Vec<&Attempt> = attempts.iter().filter(|a| filter.matches(a)).collect();
    if selected.is_empty() {
        return Statistics::default();
    }
    selected.sort_by_key(|a| a.started_at());

    let mut stats = Statistics {
        total_attempts: selected.len(),
        ..Statistics::default()
    };

    let mut durations = Vec::new();
    let mut percentages = Vec::with_capacity(selected.len());
    for attempt in &selected {
        stats.total_questions += u64::from(attempt.total_questions());
        stats.total_correct += u64::from(attempt.score());
        percentages.push(attempt.percentage());
        if let Some(seconds) = attempt.duration_seconds() {
            durations.push(seconds);
        }
        if attempt.mode() == TestMode::Conjugation {
            for answer in attempt.answers() {
                record_dimensions(&mut stats, answer);
            }
        }
    }

    stats.average_percentage = round2(mean(&percentages));
    stats.best_percentage = percentages.iter().copied().reduce(f64::max);
    stats.worst_percentage = percentages.iter().copied().reduce(f64::min);
    if !durations.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let as_f64: Vec<f64> = durations.iter().map(|d| *d as f64).collect();
        stats.average_duration_seconds = Some(round2(mean(&as_f64)));
    }
    stats.trend = trend(&percentages);
    stats
}

fn record_dimensions(stats: &mut Statistics, answer: &AnsweredQuestion) {
    if let Some(tense) = answer.tense {
        stats.by_tense.entry(tense).or_default().record(answer.is_correct);
    }
    if let Some(person) = answer.person {
        stats.by_person.entry(person).or_default().record(answer.is_correct);
    }
    stats
        .by_category
        .entry(answer.category)
        .or_default()
        .record(answer.is_correct);
    stats
        .by_difficulty
        .entry(answer.difficulty)
        .or_default()
        .record(answer.is_correct);
}

/// `chronological` must be ordered oldest first. The newer half takes the
/// extra element when the count is odd.
fn trend(chronological: &[f64]) -> Option<Trend> {
    if chronological.len() < 2 {
        return None;
    }
    let (older, newer) = chronological.split_at(chronological.len() / 2);
    let older_mean = round2(mean(older));
    let newer_mean = round2(mean(newer));
    let change = round2(newer_mean - older_mean);
    let direction = if change.abs() < STABLE_THRESHOLD {
        TrendDirection::Stable
    } else if change > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };
    Some(Trend {
        older_mean,
        newer_mean,
        change,
        direction,
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
