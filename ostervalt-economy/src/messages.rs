//! Narrative text for action results.
use rand::Rng;

pub const DEFAULT_WORK_MESSAGE: &str = "You put in an honest day's work.";
pub const DEFAULT_CRIME_MESSAGE: &str = "You tried your luck on the wrong side of the law.";

/// Pick one template uniformly, falling back to `default` for an empty list.
pub fn pick_template<'a>(rng: &mut impl Rng, templates: &'a [String], default: &'a str) -> &'a str {
    if templates.is_empty() {
        return default;
    }
    let idx = rng.gen_range(0..templates.len());
    templates[idx].as_str()
}

#[must_use]
pub fn work_message(template: &str, reward: i64, balance: i64) -> String {
    format!("{template} You earned {reward} coins. Balance: {balance} coins.")
}

#[must_use]
pub fn crime_message(template: &str, success: bool, amount: i64, balance: i64) -> String {
    if success {
        format!("{template} You got away with {amount} coins. Balance: {balance} coins.")
    } else {
        let lost = amount.unsigned_abs();
        format!("{template} You were caught and lost {lost} coins. Balance: {balance} coins.")
    }
}
