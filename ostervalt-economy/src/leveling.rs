//! Progress units ("marks" in sixteenths) and the level track derived from them.

/// Progress units that make up one full mark.
pub const UNITS_PER_MARK: u32 = 16;
/// Lowest reachable level.
pub const MIN_LEVEL: u32 = 1;
/// Highest reachable level; progress beyond it still accumulates.
pub const MAX_LEVEL: u32 = 20;
/// Levels up to this one display whole marks only.
const WHOLE_MARK_DISPLAY_MAX_LEVEL: u32 = 4;

/// Convert accumulated progress units into a level in `[MIN_LEVEL, MAX_LEVEL]`.
///
/// Negative input is treated as zero progress.
#[must_use]
pub fn calculate_level(progress_units: i64) -> u32 {
    let units = progress_units.max(0);
    let marks = units / i64::from(UNITS_PER_MARK);
    let level = marks.saturating_add(1);
    u32::try_from(level)
        .unwrap_or(MAX_LEVEL)
        .clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Human readable progress, e.g. `"4 and 8/16 Marks"`.
///
/// Fractions are hidden while the character is at level 4 or below, where
/// every award is a whole mark.
#[must_use]
pub fn format_progress(progress_units: i64) -> String {
    let units = progress_units.max(0);
    let full = units / i64::from(UNITS_PER_MARK);
    let remainder = units % i64::from(UNITS_PER_MARK);

    if remainder == 0 || calculate_level(units) <= WHOLE_MARK_DISPLAY_MAX_LEVEL {
        format!("{full} Marks")
    } else {
        format!("{full} and {remainder}/{UNITS_PER_MARK} Marks")
    }
}

/// Progress units granted per award at a given level.
///
/// Diminishing returns: later levels need more awards per level.
#[must_use]
pub const fn progress_to_gain(level: u32) -> u32 {
    match level {
        0..=4 => 16,
        5..=12 => 4,
        13..=16 => 2,
        _ => 1,
    }
}

/// Level transition produced by granting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub previous_level: u32,
    pub new_level: u32,
    pub units_added: u32,
}

impl LevelChange {
    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}
