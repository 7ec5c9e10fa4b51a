//! Error taxonomy for the action engine.
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::character::{CharacterId, UserId};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Timed action kinds guarded by a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Work,
    Crime,
}

impl ActionKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Crime => "crime",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Failures surfaced by orchestrator operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("character {0} not found")]
    CharacterNotFound(CharacterId),
    #[error("{action} is on cooldown for another {remaining_seconds}s")]
    ActionOnCooldown {
        action: ActionKind,
        remaining_seconds: u64,
    },
    #[error("user {user} lacks {policy} permission")]
    PermissionDenied { policy: &'static str, user: UserId },
    #[error("balance cannot be set to a negative amount ({0})")]
    NegativeAmount(i64),
    #[error("character repository failed")]
    Repository(#[source] BoxError),
    #[error("guild configuration unavailable")]
    Config(#[source] BoxError),
}

impl EngineError {
    pub(crate) fn repository<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Repository(Box::new(err))
    }

    pub(crate) fn config<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Config(Box::new(err))
    }

    /// Seconds left on the cooldown, when this is a cooldown failure.
    #[must_use]
    pub const fn remaining_seconds(&self) -> Option<u64> {
        match self {
            Self::ActionOnCooldown {
                remaining_seconds, ..
            } => Some(*remaining_seconds),
            _ => None,
        }
    }
}

/// Non-fatal configuration problems. The action proceeds with a zero reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationDegraded {
    #[error("tier table is empty")]
    EmptyTierTable,
    #[error("no tier covers level {level}")]
    NoTierForLevel { level: u32 },
}

/// Errors raised while loading guild configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid guild configuration JSON")]
    Json(#[from] serde_json::Error),
    #[error("unsupported guild configuration schema version {0}")]
    UnsupportedSchema(u32),
    #[error("legacy guild configuration must be a JSON object")]
    LegacyNotObject,
}
