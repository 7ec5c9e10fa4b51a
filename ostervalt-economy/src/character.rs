//! Player characters as the engine sees them.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ActionKind;
use crate::leveling::{self, LevelChange};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Opaque character identifier assigned by the repository.
    CharacterId
);
id_newtype!(
    /// Chat-platform user that owns characters.
    UserId
);
id_newtype!(
    /// Tenant boundary: every guild runs an independent economy.
    GuildId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Active,
    /// Terminal; retired characters take no further actions.
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub owner_id: UserId,
    pub guild_id: GuildId,
    pub money: i64,
    level: u32,
    progress_units: u32,
    pub last_work_time: Option<DateTime<Utc>>,
    pub last_crime_time: Option<DateTime<Utc>>,
    #[serde(default)]
    status: CharacterStatus,
}

impl Character {
    /// Fresh character: level 1, no progress, no money, never acted.
    #[must_use]
    pub fn new(
        id: CharacterId,
        name: impl Into<String>,
        owner_id: UserId,
        guild_id: GuildId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            guild_id,
            money: 0,
            level: leveling::MIN_LEVEL,
            progress_units: 0,
            last_work_time: None,
            last_crime_time: None,
            status: CharacterStatus::Active,
        }
    }

    /// Builder used when restoring or seeding characters with prior progress.
    #[must_use]
    pub fn with_progress_units(mut self, progress_units: u32) -> Self {
        self.progress_units = progress_units;
        self.level = leveling::calculate_level(i64::from(progress_units));
        self
    }

    #[must_use]
    pub const fn with_money(mut self, money: i64) -> Self {
        self.money = money;
        self
    }

    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub const fn progress_units(&self) -> u32 {
        self.progress_units
    }

    #[must_use]
    pub const fn status(&self) -> CharacterStatus {
        self.status
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, CharacterStatus::Active)
    }

    #[must_use]
    pub fn formatted_progress(&self) -> String {
        leveling::format_progress(i64::from(self.progress_units))
    }

    #[must_use]
    pub const fn last_action_time(&self, action: ActionKind) -> Option<DateTime<Utc>> {
        match action {
            ActionKind::Work => self.last_work_time,
            ActionKind::Crime => self.last_crime_time,
        }
    }

    pub fn mark_action(&mut self, action: ActionKind, at: DateTime<Utc>) {
        match action {
            ActionKind::Work => self.last_work_time = Some(at),
            ActionKind::Crime => self.last_crime_time = Some(at),
        }
    }

    /// Add `units` of progress and re-derive the level from the new total.
    pub fn grant_progress(&mut self, units: u32) -> LevelChange {
        let previous_level = self.level;
        self.progress_units = self.progress_units.saturating_add(units);
        self.level = leveling::calculate_level(i64::from(self.progress_units));
        LevelChange {
            previous_level,
            new_level: self.level,
            units_added: units,
        }
    }

    /// Re-derive the stored level from progress units.
    ///
    /// Returns the stale level when the stored value disagreed.
    pub fn resync_level(&mut self) -> Option<u32> {
        let derived = leveling::calculate_level(i64::from(self.progress_units));
        if derived == self.level {
            return None;
        }
        let stale = self.level;
        self.level = derived;
        Some(stale)
    }

    /// Move an active character to the terminal retired state.
    ///
    /// Returns `false` when the character was already retired.
    pub fn retire(&mut self) -> bool {
        if self.is_active() {
            self.status = CharacterStatus::Retired;
            true
        } else {
            false
        }
    }
}
