//! Ostervalt Economy Engine
//!
//! Platform-agnostic progression and economy rules for the Ostervalt guild bot:
//! cooldown-gated work and crime actions, tier rewards, and mark-based leveling.
//! Persistence, configuration storage and time are supplied through ports.

pub mod actions;
pub mod character;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod crime;
pub mod error;
pub mod leveling;
pub mod locks;
pub mod memory;
pub mod messages;
pub mod permissions;
pub mod rng;
pub mod tiers;

use std::sync::Arc;

use async_trait::async_trait;

// Re-export commonly used types
pub use actions::{
    ActionOrchestrator, BalanceView, CooldownStatus, CrimeResult, ProgressResult, ProgressView,
    WorkResult,
};
pub use character::{Character, CharacterId, CharacterStatus, GuildId, UserId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CrimeConfig, GuildConfig, MigrationReport, RoleConfig};
pub use cooldown::CooldownCheck;
pub use crime::{AmountRange, CrimeOutcome};
pub use error::{ActionKind, ConfigError, ConfigurationDegraded, EngineError};
pub use leveling::{LevelChange, calculate_level, format_progress, progress_to_gain};
pub use memory::{MemoryCharacterRepository, StaticGuildConfigs};
pub use permissions::{Actor, PermissionPolicy, RoleKind};
pub use tiers::{Tier, TierResolution, TierTable};

/// Character persistence supplied by the host platform.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a character, `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn get_by_id(&self, id: CharacterId) -> Result<Option<Character>, Self::Error>;

    /// Persist the full character record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    async fn update(&self, character: &Character) -> Result<(), Self::Error>;
}

/// Per-guild configuration lookup.
#[async_trait]
pub trait GuildConfigSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Configuration for `guild`; implementations fall back to defaults for
    /// guilds that never configured anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    async fn guild_config(&self, guild: GuildId) -> Result<Arc<GuildConfig>, Self::Error>;
}

#[async_trait]
impl<T: CharacterRepository + ?Sized> CharacterRepository for Arc<T> {
    type Error = T::Error;

    async fn get_by_id(&self, id: CharacterId) -> Result<Option<Character>, Self::Error> {
        (**self).get_by_id(id).await
    }

    async fn update(&self, character: &Character) -> Result<(), Self::Error> {
        (**self).update(character).await
    }
}
