use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ostervalt_economy::{
    ActionKind, ActionOrchestrator, Actor, AmountRange, Character, CharacterId,
    CharacterRepository, EngineError, GuildConfig, GuildId, ManualClock,
    MemoryCharacterRepository, StaticGuildConfigs, Tier, UserId,
};

type Engine =
    ActionOrchestrator<Arc<MemoryCharacterRepository>, StaticGuildConfigs, ManualClock>;

const GUILD: GuildId = GuildId(500);
const OWNER: UserId = UserId(42);
const ID: CharacterId = CharacterId(1);

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap()
}

fn tiered_config() -> GuildConfig {
    let mut config = GuildConfig::default();
    config.work_interval_seconds = 3_600;
    config.crime_interval_seconds = 3_600;
    config.tiers.upsert(Tier::new("t1", 1, 5, 100));
    config.tiers.upsert(Tier::new("t2", 6, 20, 250));
    config
}

/// Level 3 character: 32 progress units.
fn level_three() -> Character {
    Character::new(ID, "Ayla", OWNER, GUILD).with_progress_units(32)
}

fn engine_with(
    config: GuildConfig,
    character: Character,
) -> (Engine, Arc<MemoryCharacterRepository>) {
    let repo = Arc::new(MemoryCharacterRepository::with_characters([character]));
    let engine = ActionOrchestrator::new(
        Arc::clone(&repo),
        StaticGuildConfigs::default().with_guild(GUILD, config),
        ManualClock::new(epoch()),
        0xDEAD_BEEF,
    );
    (engine, repo)
}

#[tokio::test]
async fn work_pays_tier_reward_and_records_time() {
    let (engine, repo) = engine_with(tiered_config(), level_three());

    let result = engine.perform_work(ID).await.unwrap();
    assert_eq!(result.reward, 100);
    assert_eq!(result.new_balance, 100);
    assert_eq!(result.tier.as_deref(), Some("t1"));
    assert!(result.degraded.is_none());
    assert!(result.message.contains("100"));

    let stored = repo.get_by_id(ID).await.unwrap().unwrap();
    assert_eq!(stored.money, 100);
    assert_eq!(stored.last_work_time, Some(epoch()));
    assert_eq!(stored.last_crime_time, None);
}

#[tokio::test]
async fn second_work_inside_interval_is_rejected_without_changes() {
    let (engine, repo) = engine_with(tiered_config(), level_three());
    engine.perform_work(ID).await.unwrap();
    let before = repo.get_by_id(ID).await.unwrap();

    let err = engine.perform_work(ID).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::ActionOnCooldown {
            action: ActionKind::Work,
            remaining_seconds: 3_600
        }
    ));
    assert_eq!(repo.get_by_id(ID).await.unwrap(), before);
}

#[tokio::test]
async fn certain_crime_pays_fixed_gain() {
    let mut config = tiered_config();
    config.crime.success_probability = 100;
    config.crime.gain = AmountRange::fixed(50);
    let (engine, repo) = engine_with(config, level_three());

    let result = engine.perform_crime(ID).await.unwrap();
    assert!(result.success);
    assert_eq!(result.amount_delta, 50);
    assert_eq!(result.new_balance, 50);
    assert!(result.message.contains("got away with 50"));

    let stored = repo.get_by_id(ID).await.unwrap().unwrap();
    assert_eq!(stored.last_crime_time, Some(epoch()));
    assert_eq!(stored.last_work_time, None);
}

#[tokio::test]
async fn crime_is_rejected_on_cooldown_after_failure_too() {
    let mut config = tiered_config();
    config.crime.success_probability = 0;
    config.crime.loss = AmountRange::fixed(10);
    let (engine, _repo) = engine_with(config, level_three());

    let result = engine.perform_crime(ID).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.new_balance, -10);

    engine.clock().advance(Duration::seconds(1_800));
    let err = engine.perform_crime(ID).await.unwrap_err();
    assert_eq!(err.remaining_seconds(), Some(1_800));
}

#[tokio::test]
async fn crime_odds_are_roughly_honoured() {
    let mut config = tiered_config();
    config.crime_interval_seconds = 0;
    config.crime.success_probability = 30;
    let (engine, _repo) = engine_with(config, level_three());

    let mut successes = 0;
    for _ in 0..1_000 {
        if engine.perform_crime(ID).await.unwrap().success {
            successes += 1;
        }
    }
    assert!((220..=380).contains(&successes), "successes = {successes}");
}

#[tokio::test]
async fn same_seed_replays_identically() {
    let mut config = tiered_config();
    config.crime_interval_seconds = 0;
    config.crime_messages = vec!["A".into(), "B".into(), "C".into()];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let (engine, _repo) = engine_with(config.clone(), level_three());
        let mut outcomes = Vec::new();
        for _ in 0..20 {
            let r = engine.perform_crime(ID).await.unwrap();
            outcomes.push((r.success, r.amount_delta, r.message));
        }
        runs.push(outcomes);
    }
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_work_pays_exactly_once() {
    let (engine, repo) = engine_with(tiered_config(), level_three());
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.perform_work(ID).await })
        })
        .collect();

    let mut granted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(EngineError::ActionOnCooldown { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(rejected, 7);
    assert_eq!(repo.get_by_id(ID).await.unwrap().unwrap().money, 100);
}

#[tokio::test]
async fn retired_characters_cannot_act() {
    let (engine, _repo) = engine_with(tiered_config(), level_three());
    engine.retire(&Actor::admin(UserId(1)), ID).await.unwrap();

    let owner = Actor::user(OWNER);
    assert!(matches!(engine.perform_work(ID).await, Err(EngineError::CharacterNotFound(_))));
    assert!(matches!(engine.perform_crime(ID).await, Err(EngineError::CharacterNotFound(_))));
    assert!(matches!(
        engine.award_progress(&owner, ID).await,
        Err(EngineError::CharacterNotFound(_))
    ));
}

#[tokio::test]
async fn unknown_character_is_not_found() {
    let (engine, _repo) = engine_with(tiered_config(), level_three());
    let err = engine.perform_work(CharacterId(77)).await.unwrap_err();
    assert_eq!(err.to_string(), "character 77 not found");
}

#[tokio::test]
async fn guilds_use_their_own_intervals() {
    let mut fast = tiered_config();
    fast.work_interval_seconds = 60;
    let other = GuildId(600);
    let repo = Arc::new(MemoryCharacterRepository::with_characters([
        level_three(),
        Character::new(CharacterId(2), "Bram", OWNER, other),
    ]));
    let engine = ActionOrchestrator::new(
        Arc::clone(&repo),
        StaticGuildConfigs::new(tiered_config()).with_guild(other, fast),
        ManualClock::new(epoch()),
        9,
    );

    engine.perform_work(ID).await.unwrap();
    engine.perform_work(CharacterId(2)).await.unwrap();
    engine.clock().advance(Duration::seconds(60));

    assert!(engine.perform_work(ID).await.is_err());
    assert!(engine.perform_work(CharacterId(2)).await.is_ok());
}

#[tokio::test]
async fn progression_changes_the_work_tier() {
    let (engine, _repo) = engine_with(tiered_config(), level_three());
    let owner = Actor::user(OWNER);
    while engine.progress_of(&owner, ID).await.unwrap().level < 6 {
        engine.award_progress(&owner, ID).await.unwrap();
    }

    let result = engine.perform_work(ID).await.unwrap();
    assert_eq!(result.tier.as_deref(), Some("t2"));
    assert_eq!(result.reward, 250);
}

#[tokio::test]
async fn malformed_tier_table_still_lets_characters_act() {
    let json = r#"{
        "schema_version": 2,
        "work_interval_seconds": 3600,
        "tiers": {"bad": {"level_min": 1}},
        "crime": {"success_probability": 250, "gain": {"min": 40, "max": 40}}
    }"#;
    let config = GuildConfig::from_json(json).unwrap();
    let (engine, _repo) = engine_with(config, level_three());

    let work = engine.perform_work(ID).await.unwrap();
    assert_eq!(work.reward, 0);
    assert!(work.degraded.is_some());

    let crime = engine.perform_crime(ID).await.unwrap();
    assert!(crime.success);
    assert_eq!(crime.new_balance, 40);
}

#[tokio::test]
async fn set_balance_replaces_the_stored_amount() {
    let (engine, repo) = engine_with(tiered_config(), level_three().with_money(-75));
    let admin = Actor::admin(UserId(1));

    assert_eq!(engine.set_balance(&admin, ID, 1_000).await.unwrap(), 1_000);
    assert_eq!(repo.get_by_id(ID).await.unwrap().unwrap().money, 1_000);

    let before = repo.get_by_id(ID).await.unwrap();
    let err = engine.set_balance(&admin, ID, -1).await.unwrap_err();
    assert!(matches!(err, EngineError::NegativeAmount(-1)));
    assert_eq!(repo.get_by_id(ID).await.unwrap(), before);
}
