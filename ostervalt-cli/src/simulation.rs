use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use ostervalt_economy::{
    ActionOrchestrator, Actor, Character, CharacterId, EngineError, GuildConfig, GuildId,
    ManualClock, MemoryCharacterRepository, StaticGuildConfigs, UserId,
};
use serde::Serialize;

const SIM_GUILD: GuildId = GuildId(1);

/// Parameters for a seeded economy run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub characters: u32,
    pub days: u32,
    /// Awards of progress per simulated day, spread evenly.
    pub awards_per_day: u32,
}

impl SimulationConfig {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            characters: 3,
            days: 7,
            awards_per_day: 1,
        }
    }

    #[must_use]
    pub const fn with_characters(mut self, characters: u32) -> Self {
        self.characters = characters;
        self
    }

    #[must_use]
    pub const fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    #[must_use]
    pub const fn with_awards_per_day(mut self, awards_per_day: u32) -> Self {
        self.awards_per_day = awards_per_day;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationRow {
    pub character_id: CharacterId,
    pub name: String,
    pub level: u32,
    pub marks: String,
    pub balance: i64,
    pub works: u32,
    pub work_income: i64,
    pub crimes: u32,
    pub crime_successes: u32,
    pub crime_net: i64,
    pub degraded_works: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub days: u32,
    pub hours: u32,
    pub rows: Vec<SimulationRow>,
    pub total_balance: i64,
}

impl SimulationReport {
    #[must_use]
    pub fn crime_success_rate(&self) -> Option<f64> {
        let crimes: u32 = self.rows.iter().map(|r| r.crimes).sum();
        let successes: u32 = self.rows.iter().map(|r| r.crime_successes).sum();
        (crimes > 0).then(|| f64::from(successes) / f64::from(crimes))
    }
}

/// Drive every character hourly through work and crime with a manual clock.
///
/// Attempts that hit a cooldown are skipped; any other engine failure aborts
/// the run.
pub async fn run(
    config: GuildConfig,
    sim: SimulationConfig,
    start: DateTime<Utc>,
) -> Result<SimulationReport, EngineError> {
    let characters = (1..=u64::from(sim.characters)).map(|n| {
        Character::new(CharacterId(n), format!("Villager {n}"), UserId(n), SIM_GUILD)
    });
    let engine = ActionOrchestrator::new(
        MemoryCharacterRepository::with_characters(characters),
        StaticGuildConfigs::new(config),
        ManualClock::new(start),
        sim.seed,
    );

    let ids: Vec<CharacterId> = (1..=u64::from(sim.characters)).map(CharacterId).collect();
    let mut rows: BTreeMap<CharacterId, SimulationRow> = BTreeMap::new();
    let hours = sim.days.saturating_mul(24);

    for hour in 0..hours {
        for &id in &ids {
            let row = rows.entry(id).or_default();
            match engine.perform_work(id).await {
                Ok(work) => {
                    row.works += 1;
                    row.work_income += work.reward;
                    if work.degraded.is_some() {
                        row.degraded_works += 1;
                    }
                }
                Err(EngineError::ActionOnCooldown { .. }) => {}
                Err(err) => return Err(err),
            }
            match engine.perform_crime(id).await {
                Ok(crime) => {
                    row.crimes += 1;
                    row.crime_net += crime.amount_delta;
                    if crime.success {
                        row.crime_successes += 1;
                    }
                }
                Err(EngineError::ActionOnCooldown { .. }) => {}
                Err(err) => return Err(err),
            }
            for _ in 0..awards_in_hour(hour % 24, sim.awards_per_day) {
                engine.award_progress(&Actor::user(UserId(id.0)), id).await?;
            }
        }
        engine.clock().advance(Duration::hours(1));
    }

    for character in engine.characters().all().await {
        let row = rows.entry(character.id).or_default();
        row.character_id = character.id;
        row.level = character.level();
        row.marks = character.formatted_progress();
        row.balance = character.money;
        row.name = character.name;
    }
    let rows: Vec<SimulationRow> = rows.into_values().collect();
    let total_balance = rows.iter().map(|r| r.balance).sum();
    log::debug!(
        "simulated {} characters for {hours}h with seed {}",
        rows.len(),
        sim.seed
    );

    Ok(SimulationReport {
        seed: sim.seed,
        days: sim.days,
        hours,
        rows,
        total_balance,
    })
}

/// Spreads `per_day` awards over the 24 hours of a day, so every day grants
/// exactly `per_day` of them.
fn awards_in_hour(hour_of_day: u32, per_day: u32) -> u64 {
    let due_by = |hours: u32| u64::from(hours) * u64::from(per_day) / 24;
    due_by(hour_of_day + 1) - due_by(hour_of_day)
}
