//! Cooldown gate shared by the timed actions.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a cooldown evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownCheck {
    pub allowed: bool,
    pub remaining_seconds: u64,
}

impl CooldownCheck {
    const READY: Self = Self {
        allowed: true,
        remaining_seconds: 0,
    };

    /// Instant at which an action last performed at `last` becomes available again.
    #[must_use]
    pub fn ready_at(last: Option<DateTime<Utc>>, interval_seconds: u64) -> Option<DateTime<Utc>> {
        let interval = i64::try_from(interval_seconds).unwrap_or(i64::MAX);
        last.and_then(|at| at.checked_add_signed(Duration::try_seconds(interval)?))
    }
}

/// Evaluate whether an action last performed at `last` may run again at `now`.
///
/// A missing timestamp means the action was never performed, so it is always
/// allowed. Elapsed time is measured in whole seconds and the boundary is
/// inclusive: exactly `interval_seconds` after the last action is allowed.
#[must_use]
pub fn evaluate(
    last: Option<DateTime<Utc>>,
    interval_seconds: u64,
    now: DateTime<Utc>,
) -> CooldownCheck {
    let Some(last) = last else {
        return CooldownCheck::READY;
    };

    let elapsed = i128::from((now - last).num_seconds());
    let interval = i128::from(interval_seconds);
    let remaining = (interval - elapsed).max(0);

    CooldownCheck {
        allowed: elapsed >= interval,
        remaining_seconds: u64::try_from(remaining).unwrap_or(u64::MAX),
    }
}
