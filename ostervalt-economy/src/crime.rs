//! Probabilistic crime outcomes.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive money range for crime gains or losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: i64,
    pub max: i64,
}

impl AmountRange {
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn fixed(amount: i64) -> Self {
        Self::new(amount, amount)
    }

    /// Non-negative bounds in ascending order.
    #[must_use]
    pub fn normalized(self) -> Self {
        let a = self.min.max(0);
        let b = self.max.max(0);
        Self::new(a.min(b), a.max(b))
    }

    #[must_use]
    pub fn contains(&self, amount: i64) -> bool {
        let range = self.normalized();
        range.min <= amount && amount <= range.max
    }

    fn sample(self, rng: &mut impl Rng) -> i64 {
        let range = self.normalized();
        if range.min == range.max {
            range.min
        } else {
            rng.gen_range(range.min..=range.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrimeOutcome {
    pub success: bool,
    /// Positive on success, negative (or zero) on failure.
    pub amount: i64,
}

/// Resolve a crime attempt.
///
/// The success roll is uniform in `1..=100` and succeeds when it does not
/// exceed `success_probability` (values above 100 behave as 100). The
/// magnitude is a separate draw, uniform within the gain or loss range of the
/// branch taken.
pub fn resolve(
    rng: &mut impl Rng,
    success_probability: u8,
    gain: AmountRange,
    loss: AmountRange,
) -> CrimeOutcome {
    let roll: u8 = rng.gen_range(1..=100);
    let success = roll <= success_probability.min(100);
    let amount = if success {
        gain.sample(rng)
    } else {
        -loss.sample(rng)
    };
    CrimeOutcome { success, amount }
}
