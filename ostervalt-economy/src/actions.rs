//! Work and crime use-cases, plus the progression and admin operations that
//! share their load-check-mutate-save shape.
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::character::{Character, CharacterId, CharacterStatus};
use crate::clock::Clock;
use crate::config::GuildConfig;
use crate::cooldown::{self, CooldownCheck};
use crate::crime;
use crate::error::{ActionKind, ConfigurationDegraded, EngineError};
use crate::leveling;
use crate::locks::CharacterLocks;
use crate::messages::{self, DEFAULT_CRIME_MESSAGE, DEFAULT_WORK_MESSAGE};
use crate::permissions::{Actor, PermissionPolicy, permits};
use crate::rng::RngStreams;
use crate::tiers;
use crate::{CharacterRepository, GuildConfigSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkResult {
    pub character_id: CharacterId,
    pub new_balance: i64,
    pub reward: i64,
    /// Tier that paid out; `None` when the tier table could not price the level.
    pub tier: Option<String>,
    pub degraded: Option<ConfigurationDegraded>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrimeResult {
    pub character_id: CharacterId,
    pub new_balance: i64,
    pub success: bool,
    /// Change actually applied to the balance.
    pub amount_delta: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressResult {
    pub character_id: CharacterId,
    pub previous_level: u32,
    pub new_level: u32,
    pub units_added: u32,
    pub progress_units: u32,
    pub formatted: String,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub character_id: CharacterId,
    pub name: String,
    pub balance: i64,
    pub status: CharacterStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub character_id: CharacterId,
    pub name: String,
    pub level: u32,
    pub progress_units: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub work: CooldownCheck,
    pub work_ready_at: Option<DateTime<Utc>>,
    pub crime: CooldownCheck,
    pub crime_ready_at: Option<DateTime<Utc>>,
}

/// Composes the cooldown gate, reward resolvers and character persistence.
///
/// Every operation holds the character's lock from load to save, performs a
/// single load and at most a single save, and never retries.
pub struct ActionOrchestrator<R, G, C> {
    characters: R,
    configs: G,
    clock: C,
    rng: Mutex<RngStreams>,
    locks: CharacterLocks,
}

impl<R, G, C> ActionOrchestrator<R, G, C>
where
    R: CharacterRepository,
    G: GuildConfigSource,
    C: Clock,
{
    /// Wire the orchestrator to its collaborators; `seed` fixes the RNG streams.
    pub fn new(characters: R, configs: G, clock: C, seed: u64) -> Self {
        Self {
            characters,
            configs,
            clock,
            rng: Mutex::new(RngStreams::from_user_seed(seed)),
            locks: CharacterLocks::new(),
        }
    }

    pub const fn characters(&self) -> &R {
        &self.characters
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Work for the tier reward matching the character's level.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` for absent or retired characters,
    /// `ActionOnCooldown` while the work interval has not elapsed, and
    /// repository or configuration failures unchanged.
    pub async fn perform_work(&self, id: CharacterId) -> Result<WorkResult, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        let now = self.clock.now();
        ensure_ready(&character, ActionKind::Work, config.work_interval_seconds, now)?;

        let resolution = tiers::resolve(character.level(), &config.tiers);
        if let Some(reason) = resolution.degraded {
            log::warn!(
                "guild {}: work reward degraded to 0 ({reason})",
                character.guild_id
            );
        }
        character.money = character.money.saturating_add(resolution.reward);
        character.mark_action(ActionKind::Work, now);
        self.save(&character).await?;

        let template = self.with_rng(|rng| {
            messages::pick_template(rng.messages(), &config.work_messages, DEFAULT_WORK_MESSAGE)
                .to_owned()
        });
        log::debug!(
            "character {id} worked: +{} (tier {:?}), balance {}",
            resolution.reward,
            resolution.tier,
            character.money
        );

        Ok(WorkResult {
            character_id: id,
            new_balance: character.money,
            reward: resolution.reward,
            tier: resolution.tier,
            degraded: resolution.degraded,
            message: messages::work_message(&template, resolution.reward, character.money),
        })
    }

    /// Attempt a crime: a weighted success roll, then a payout or penalty.
    ///
    /// # Errors
    ///
    /// Same as [`ActionOrchestrator::perform_work`], against the crime interval.
    pub async fn perform_crime(&self, id: CharacterId) -> Result<CrimeResult, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        let now = self.clock.now();
        ensure_ready(&character, ActionKind::Crime, config.crime_interval_seconds, now)?;

        let settings = &config.crime;
        let outcome = self.with_rng(|rng| {
            crime::resolve(
                rng.crime(),
                settings.success_probability,
                settings.gain,
                settings.loss,
            )
        });

        let previous = character.money;
        let mut new_balance = previous.saturating_add(outcome.amount);
        if !settings.allow_negative_balance {
            new_balance = new_balance.max(previous.min(0));
        }
        character.money = new_balance;
        character.mark_action(ActionKind::Crime, now);
        self.save(&character).await?;

        let amount_delta = new_balance - previous;
        let template = self.with_rng(|rng| {
            messages::pick_template(rng.messages(), &config.crime_messages, DEFAULT_CRIME_MESSAGE)
                .to_owned()
        });
        log::debug!(
            "character {id} crime {}: {amount_delta:+}, balance {new_balance}",
            if outcome.success { "succeeded" } else { "failed" }
        );

        Ok(CrimeResult {
            character_id: id,
            new_balance,
            success: outcome.success,
            amount_delta,
            message: messages::crime_message(&template, outcome.success, amount_delta, new_balance),
        })
    }

    /// Grant one award of progress at the character's current rate.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` for absent or retired characters,
    /// `PermissionDenied` unless the actor is an admin, holds a progress role,
    /// or owns the character.
    pub async fn award_progress(
        &self,
        actor: &Actor,
        id: CharacterId,
    ) -> Result<ProgressResult, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::PROGRESS, actor, &character, &config)?;

        let units = leveling::progress_to_gain(character.level());
        let change = character.grant_progress(units);
        self.save(&character).await?;

        if change.leveled_up() {
            log::info!("character {id} reached level {}", change.new_level);
        }
        Ok(ProgressResult {
            character_id: id,
            previous_level: change.previous_level,
            new_level: change.new_level,
            units_added: change.units_added,
            progress_units: character.progress_units(),
            formatted: character.formatted_progress(),
            leveled_up: change.leveled_up(),
        })
    }

    /// Wallet view; retired characters remain visible.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` or `PermissionDenied`.
    pub async fn balance_of(
        &self,
        actor: &Actor,
        id: CharacterId,
    ) -> Result<BalanceView, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let character = self.load(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::BALANCE, actor, &character, &config)?;
        Ok(BalanceView {
            character_id: id,
            balance: character.money,
            status: character.status(),
            name: character.name,
        })
    }

    /// Level and marks view.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` or `PermissionDenied`.
    pub async fn progress_of(
        &self,
        actor: &Actor,
        id: CharacterId,
    ) -> Result<ProgressView, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let character = self.load(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::PROGRESS, actor, &character, &config)?;
        Ok(ProgressView {
            character_id: id,
            level: character.level(),
            progress_units: character.progress_units(),
            formatted: character.formatted_progress(),
            name: character.name,
        })
    }

    /// Current cooldown state for both timed actions.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` for absent or retired characters.
    pub async fn cooldowns(&self, id: CharacterId) -> Result<CooldownStatus, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        let now = self.clock.now();
        let work_interval = config.work_interval_seconds;
        let crime_interval = config.crime_interval_seconds;
        Ok(CooldownStatus {
            work: cooldown::evaluate(character.last_work_time, work_interval, now),
            work_ready_at: CooldownCheck::ready_at(character.last_work_time, work_interval),
            crime: cooldown::evaluate(character.last_crime_time, crime_interval, now),
            crime_ready_at: CooldownCheck::ready_at(character.last_crime_time, crime_interval),
        })
    }

    /// Administrative credit (positive) or debit (negative).
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` for absent or retired characters, `PermissionDenied`
    /// for non-admins.
    pub async fn adjust_balance(
        &self,
        actor: &Actor,
        id: CharacterId,
        amount: i64,
    ) -> Result<i64, EngineError> {
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::ADMIN_ONLY, actor, &character, &config)?;

        character.money = character.money.saturating_add(amount);
        self.save(&character).await?;
        log::info!(
            "user {} adjusted character {id} by {amount:+}, balance {}",
            actor.user_id,
            character.money
        );
        Ok(character.money)
    }

    /// Administrative overwrite of the balance with an absolute amount.
    ///
    /// # Errors
    ///
    /// `NegativeAmount` for `amount < 0` (checked before any read),
    /// `CharacterNotFound` for absent or retired characters, `PermissionDenied`
    /// for non-admins.
    pub async fn set_balance(
        &self,
        actor: &Actor,
        id: CharacterId,
        amount: i64,
    ) -> Result<i64, EngineError> {
        if amount < 0 {
            return Err(EngineError::NegativeAmount(amount));
        }
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load_active(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::ADMIN_ONLY, actor, &character, &config)?;

        let previous = character.money;
        character.money = amount;
        self.save(&character).await?;
        log::info!(
            "user {} set character {id} balance from {previous} to {amount}",
            actor.user_id
        );
        Ok(character.money)
    }

    /// Retire an active character for good.
    ///
    /// # Errors
    ///
    /// `CharacterNotFound` when absent or already retired, `PermissionDenied`
    /// for non-admins.
    pub async fn retire(&self, actor: &Actor, id: CharacterId) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(id).await;
        let mut character = self.load(id).await?;
        let config = self.config_for(&character).await?;
        authorize(PermissionPolicy::ADMIN_ONLY, actor, &character, &config)?;

        if !character.retire() {
            return Err(EngineError::CharacterNotFound(id));
        }
        self.save(&character).await?;
        log::info!("character {id} retired by user {}", actor.user_id);
        Ok(())
    }

    async fn load(&self, id: CharacterId) -> Result<Character, EngineError> {
        let mut character = self
            .characters
            .get_by_id(id)
            .await
            .map_err(EngineError::repository)?
            .ok_or(EngineError::CharacterNotFound(id))?;
        if let Some(stale) = character.resync_level() {
            log::warn!(
                "character {id}: stored level {stale} disagreed with progress, using {}",
                character.level()
            );
        }
        Ok(character)
    }

    async fn load_active(&self, id: CharacterId) -> Result<Character, EngineError> {
        let character = self.load(id).await?;
        if character.is_active() {
            Ok(character)
        } else {
            Err(EngineError::CharacterNotFound(id))
        }
    }

    async fn config_for(&self, character: &Character) -> Result<Arc<GuildConfig>, EngineError> {
        self.configs
            .guild_config(character.guild_id)
            .await
            .map_err(EngineError::config)
    }

    async fn save(&self, character: &Character) -> Result<(), EngineError> {
        self.characters
            .update(character)
            .await
            .map_err(EngineError::repository)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut RngStreams) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

fn ensure_ready(
    character: &Character,
    action: ActionKind,
    interval_seconds: u64,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let gate = cooldown::evaluate(character.last_action_time(action), interval_seconds, now);
    if gate.allowed {
        Ok(())
    } else {
        Err(EngineError::ActionOnCooldown {
            action,
            remaining_seconds: gate.remaining_seconds,
        })
    }
}

fn authorize(
    policies: &'static [PermissionPolicy],
    actor: &Actor,
    character: &Character,
    config: &GuildConfig,
) -> Result<(), EngineError> {
    if permits(policies, actor, character, &config.roles) {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied {
            policy: PermissionPolicy::label(policies),
            user: actor.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{GuildId, UserId};
    use crate::clock::ManualClock;
    use crate::crime::AmountRange;
    use crate::memory::{MemoryCharacterRepository, StaticGuildConfigs};
    use crate::tiers::Tier;
    use chrono::{Duration, TimeZone};

    type TestOrchestrator =
        ActionOrchestrator<MemoryCharacterRepository, StaticGuildConfigs, ManualClock>;

    const OWNER: UserId = UserId(10);
    const GUILD: GuildId = GuildId(1);

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn config() -> GuildConfig {
        let mut config = GuildConfig::default();
        config.tiers.upsert(Tier::new("t1", 1, 5, 100));
        config
    }

    fn orchestrator(config: GuildConfig, characters: Vec<Character>) -> TestOrchestrator {
        ActionOrchestrator::new(
            MemoryCharacterRepository::with_characters(characters),
            StaticGuildConfigs::new(config),
            ManualClock::new(start()),
            7,
        )
    }

    fn hero() -> Character {
        Character::new(CharacterId(1), "Ayla", OWNER, GUILD)
    }

    #[tokio::test]
    async fn work_respects_cooldown_then_pays_again() {
        let engine = orchestrator(config(), vec![hero()]);
        assert_eq!(engine.perform_work(CharacterId(1)).await.unwrap().new_balance, 100);

        engine.clock().advance(Duration::seconds(3_599));
        let err = engine.perform_work(CharacterId(1)).await.unwrap_err();
        assert_eq!(err.remaining_seconds(), Some(1));

        engine.clock().advance(Duration::seconds(1));
        assert_eq!(engine.perform_work(CharacterId(1)).await.unwrap().new_balance, 200);
    }

    #[tokio::test]
    async fn work_with_no_matching_tier_still_starts_cooldown() {
        let engine = orchestrator(GuildConfig::default(), vec![hero()]);
        let result = engine.perform_work(CharacterId(1)).await.unwrap();
        assert_eq!(result.reward, 0);
        assert_eq!(result.degraded, Some(ConfigurationDegraded::EmptyTierTable));
        assert!(result.message.contains(DEFAULT_WORK_MESSAGE));

        let stored = engine.characters().get_by_id(CharacterId(1)).await.unwrap().unwrap();
        assert_eq!(stored.last_work_time, Some(start()));
    }

    #[tokio::test]
    async fn crime_floor_applies_when_negative_balances_disabled() {
        let mut config = config();
        config.crime.success_probability = 0;
        config.crime.loss = AmountRange::fixed(80);
        config.crime.allow_negative_balance = false;
        let engine = orchestrator(config, vec![hero().with_money(30)]);

        let result = engine.perform_crime(CharacterId(1)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.new_balance, 0);
        assert_eq!(result.amount_delta, -30);
    }

    #[tokio::test]
    async fn crime_can_go_negative_by_default() {
        let mut config = config();
        config.crime.success_probability = 0;
        config.crime.loss = AmountRange::fixed(80);
        let engine = orchestrator(config, vec![hero().with_money(30)]);

        let result = engine.perform_crime(CharacterId(1)).await.unwrap();
        assert_eq!(result.new_balance, -50);
        assert_eq!(result.amount_delta, -80);
    }

    #[tokio::test]
    async fn work_and_crime_cooldowns_are_independent() {
        let engine = orchestrator(config(), vec![hero()]);
        engine.perform_work(CharacterId(1)).await.unwrap();
        engine.perform_crime(CharacterId(1)).await.unwrap();

        let status = engine.cooldowns(CharacterId(1)).await.unwrap();
        assert!(!status.work.allowed);
        assert!(!status.crime.allowed);
        assert_eq!(status.work_ready_at, Some(start() + Duration::seconds(3_600)));
    }

    #[tokio::test]
    async fn award_progress_follows_gain_schedule() {
        let engine = orchestrator(config(), vec![hero().with_progress_units(64)]);
        let owner = Actor::user(OWNER);

        let result = engine.award_progress(&owner, CharacterId(1)).await.unwrap();
        assert_eq!(result.previous_level, 5);
        assert_eq!(result.units_added, 4);
        assert_eq!(result.progress_units, 68);
        assert_eq!(result.formatted, "4 and 4/16 Marks");
        assert!(!result.leveled_up);
    }

    #[tokio::test]
    async fn strangers_cannot_view_or_award() {
        let engine = orchestrator(config(), vec![hero()]);
        let stranger = Actor::user(UserId(99));

        let err = engine.award_progress(&stranger, CharacterId(1)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PermissionDenied {
                policy: "progress",
                ..
            }
        ));
        assert!(engine.balance_of(&stranger, CharacterId(1)).await.is_err());
    }

    #[tokio::test]
    async fn retire_is_admin_only_and_terminal() {
        let engine = orchestrator(config(), vec![hero()]);
        let owner = Actor::user(OWNER);
        let admin = Actor::admin(UserId(1));

        assert!(matches!(
            engine.retire(&owner, CharacterId(1)).await,
            Err(EngineError::PermissionDenied { .. })
        ));
        engine.retire(&admin, CharacterId(1)).await.unwrap();
        assert!(matches!(
            engine.retire(&admin, CharacterId(1)).await,
            Err(EngineError::CharacterNotFound(_))
        ));
        assert!(matches!(
            engine.perform_crime(CharacterId(1)).await,
            Err(EngineError::CharacterNotFound(_))
        ));

        let wallet = engine.balance_of(&owner, CharacterId(1)).await.unwrap();
        assert_eq!(wallet.status, CharacterStatus::Retired);
    }

    #[tokio::test]
    async fn adjust_balance_requires_admin() {
        let engine = orchestrator(config(), vec![hero()]);
        let admin = Actor::admin(UserId(1));
        assert_eq!(engine.adjust_balance(&admin, CharacterId(1), -25).await.unwrap(), -25);
        assert!(
            engine
                .adjust_balance(&Actor::user(OWNER), CharacterId(1), 25)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn set_balance_overwrites_and_rejects_negatives() {
        let engine = orchestrator(config(), vec![hero().with_money(-30)]);
        let admin = Actor::admin(UserId(1));

        assert_eq!(engine.set_balance(&admin, CharacterId(1), 500).await.unwrap(), 500);
        assert_eq!(engine.set_balance(&admin, CharacterId(1), 0).await.unwrap(), 0);
        assert!(matches!(
            engine.set_balance(&admin, CharacterId(1), -1).await,
            Err(EngineError::NegativeAmount(-1))
        ));
        assert!(matches!(
            engine.set_balance(&Actor::user(OWNER), CharacterId(1), 9).await,
            Err(EngineError::PermissionDenied { .. })
        ));
        assert!(matches!(
            engine.set_balance(&admin, CharacterId(2), 9).await,
            Err(EngineError::CharacterNotFound(_))
        ));

        let wallet = engine.balance_of(&admin, CharacterId(1)).await.unwrap();
        assert_eq!(wallet.balance, 0);
    }
}
