use chrono::{DateTime, Duration, Utc};

/// Source of the current time for scoring and sync bookkeeping.
///
/// Services take a `Clock` by value so tests can pin time with [`Clock::fixed`].
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. A system clock is left untouched.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Whole seconds elapsed between `earlier` and now, never negative.
    #[must_use]
    pub fn seconds_since(&self, earlier: DateTime<Utc>) -> i64 {
        self.now()
            .signed_duration_since(earlier)
            .num_seconds()
            .max(0)
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0).unwrap_or_default()
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));
        assert_eq!(clock.seconds_since(fixed_now()), 90);
    }

    #[test]
    fn seconds_since_future_is_clamped() {
        let clock = fixed_clock();
        assert_eq!(clock.seconds_since(fixed_now() + Duration::seconds(5)), 0);
    }
}
