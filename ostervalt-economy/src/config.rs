//! Typed, versioned per-guild economy configuration.
//!
//! Version 1 is the schema-less key/value blob the bot used to keep per
//! guild. It is migrated into the typed record on load; every key that had to
//! be defaulted or skipped is listed in the [`MigrationReport`] and logged.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crime::AmountRange;
use crate::error::ConfigError;
use crate::tiers::{Tier, TierTable};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

const LEGACY_KEY_TIERS: &str = "tiers_config";
const LEGACY_KEY_CRIME_PROBABILITY: &str = "probabilidade_crime";
const LEGACY_KEY_WORK_MESSAGES: &str = "mensagens_trabalho";
const LEGACY_KEY_CRIME_MESSAGES: &str = "mensagens_crime";
const LEGACY_KEY_BALANCE_ROLES: &str = "cargos_saldo_ids";
const LEGACY_KEY_PROGRESS_ROLES: &str = "cargos_marcos_ids";
const LEGACY_KEY_WORK_INTERVAL: &str = "intervalo_trabalhar";
const LEGACY_KEY_CRIME_INTERVAL: &str = "intervalo_crime";
const LEGACY_TIER_FIELDS: [&str; 3] = ["nivel_min", "nivel_max", "recompensa"];

const KEY_TIERS: &str = "tiers";
const KEY_CRIME: &str = "crime";
const KEY_SUCCESS_PROBABILITY: &str = "success_probability";
const TIER_FIELDS: [&str; 3] = ["level_min", "level_max", "reward"];

/// Crime odds and payout ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrimeConfig {
    #[serde(default = "CrimeConfig::default_success_probability")]
    pub success_probability: u8,
    #[serde(default = "CrimeConfig::default_gain")]
    pub gain: AmountRange,
    #[serde(default = "CrimeConfig::default_loss")]
    pub loss: AmountRange,
    /// When false, a failed crime floors the balance at zero.
    #[serde(default = "CrimeConfig::default_allow_negative_balance")]
    pub allow_negative_balance: bool,
}

impl CrimeConfig {
    const fn default_success_probability() -> u8 {
        50
    }

    const fn default_gain() -> AmountRange {
        AmountRange::new(50, 200)
    }

    const fn default_loss() -> AmountRange {
        AmountRange::new(25, 100)
    }

    const fn default_allow_negative_balance() -> bool {
        true
    }
}

impl Default for CrimeConfig {
    fn default() -> Self {
        Self {
            success_probability: Self::default_success_probability(),
            gain: Self::default_gain(),
            loss: Self::default_loss(),
            allow_negative_balance: Self::default_allow_negative_balance(),
        }
    }
}

/// Role ids granted elevated access to characters they do not own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub balance: Vec<u64>,
    #[serde(default)]
    pub progress: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub schema_version: u32,
    #[serde(default = "GuildConfig::default_work_interval")]
    pub work_interval_seconds: u64,
    #[serde(default = "GuildConfig::default_crime_interval")]
    pub crime_interval_seconds: u64,
    #[serde(default)]
    pub tiers: TierTable,
    #[serde(default)]
    pub crime: CrimeConfig,
    #[serde(default)]
    pub work_messages: Vec<String>,
    #[serde(default)]
    pub crime_messages: Vec<String>,
    #[serde(default)]
    pub roles: RoleConfig,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            work_interval_seconds: Self::default_work_interval(),
            crime_interval_seconds: Self::default_crime_interval(),
            tiers: TierTable::empty(),
            crime: CrimeConfig::default(),
            work_messages: Vec::new(),
            crime_messages: Vec::new(),
            roles: RoleConfig::default(),
        }
    }
}

/// What a load had to assume or drop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MigrationReport {
    pub from_version: u32,
    pub defaulted: Vec<&'static str>,
    pub skipped: Vec<String>,
}

impl MigrationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty() && self.skipped.is_empty()
    }
}

impl GuildConfig {
    const fn default_work_interval() -> u64 {
        3_600
    }

    const fn default_crime_interval() -> u64 {
        3_600
    }

    /// Parse a guild configuration document, migrating legacy blobs.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not valid JSON, has an unknown
    /// schema version, or a typed document fails to deserialize. Malformed
    /// tiers and out-of-range crime odds are skipped or clamped instead.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_json_with_report(json).map(|(config, _)| config)
    }

    /// Parse a guild configuration document and describe any migration.
    ///
    /// # Errors
    ///
    /// See [`GuildConfig::from_json`].
    pub fn from_json_with_report(json: &str) -> Result<(Self, MigrationReport), ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// # Errors
    ///
    /// See [`GuildConfig::from_json`].
    pub fn from_value(mut value: Value) -> Result<(Self, MigrationReport), ConfigError> {
        let version = value
            .get("schema_version")
            .and_then(Value::as_u64)
            .map_or(LEGACY_SCHEMA_VERSION, |v| u32::try_from(v).unwrap_or(u32::MAX));

        match version {
            CURRENT_SCHEMA_VERSION => {
                let mut report = MigrationReport {
                    from_version: CURRENT_SCHEMA_VERSION,
                    ..MigrationReport::default()
                };
                let tiers = value.as_object_mut().and_then(|map| map.remove(KEY_TIERS));
                if let Some(crime) = value.get_mut(KEY_CRIME) {
                    clamp_typed_probability(crime, &mut report);
                }
                let mut config: Self = serde_json::from_value(value)?;
                config.tiers = match tiers {
                    Some(Value::Object(entries)) => {
                        tiers_from_entries(&entries, TIER_FIELDS, KEY_TIERS, &mut report)
                    }
                    Some(_) => {
                        report.skipped.push(KEY_TIERS.to_string());
                        TierTable::empty()
                    }
                    None => TierTable::empty(),
                };
                log_report("guild config", &report);
                Ok((config, report))
            }
            LEGACY_SCHEMA_VERSION => {
                let Value::Object(map) = value else {
                    return Err(ConfigError::LegacyNotObject);
                };
                let (config, report) = Self::migrate_legacy(&map);
                log_report("legacy guild config", &report);
                Ok((config, report))
            }
            other => Err(ConfigError::UnsupportedSchema(other)),
        }
    }

    /// Convert the version 1 key/value blob into the typed record.
    #[must_use]
    pub fn migrate_legacy(blob: &Map<String, Value>) -> (Self, MigrationReport) {
        let mut report = MigrationReport {
            from_version: LEGACY_SCHEMA_VERSION,
            ..MigrationReport::default()
        };
        let mut config = Self::default();

        match legacy_value(blob, LEGACY_KEY_TIERS) {
            Some(Value::Object(entries)) => {
                config.tiers =
                    tiers_from_entries(&entries, LEGACY_TIER_FIELDS, LEGACY_KEY_TIERS, &mut report);
            }
            Some(_) => report.skipped.push(LEGACY_KEY_TIERS.to_string()),
            None => report.defaulted.push(LEGACY_KEY_TIERS),
        }

        match legacy_value(blob, LEGACY_KEY_CRIME_PROBABILITY).map(|v| v.as_u64()) {
            Some(Some(p)) => config.crime.success_probability = clamp_probability(p),
            Some(_) => {
                report.skipped.push(LEGACY_KEY_CRIME_PROBABILITY.to_string());
                report.defaulted.push(LEGACY_KEY_CRIME_PROBABILITY);
            }
            None => report.defaulted.push(LEGACY_KEY_CRIME_PROBABILITY),
        }
        // The legacy blob never carried crime payouts.
        report.defaulted.push("crime.gain");
        report.defaulted.push("crime.loss");

        config.work_messages = legacy_strings(blob, LEGACY_KEY_WORK_MESSAGES, &mut report);
        config.crime_messages = legacy_strings(blob, LEGACY_KEY_CRIME_MESSAGES, &mut report);
        config.roles.balance = legacy_ids(blob, LEGACY_KEY_BALANCE_ROLES, &mut report);
        config.roles.progress = legacy_ids(blob, LEGACY_KEY_PROGRESS_ROLES, &mut report);

        if let Some(secs) = legacy_seconds(blob, LEGACY_KEY_WORK_INTERVAL, &mut report) {
            config.work_interval_seconds = secs;
        }
        if let Some(secs) = legacy_seconds(blob, LEGACY_KEY_CRIME_INTERVAL, &mut report) {
            config.crime_interval_seconds = secs;
        }

        (config, report)
    }

    /// Serialize the typed record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Legacy values were sometimes stored JSON-encoded inside strings.
fn legacy_value(blob: &Map<String, Value>, key: &str) -> Option<Value> {
    match blob.get(key)? {
        Value::String(raw) => {
            Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())))
        }
        other => Some(other.clone()),
    }
}

fn log_report(source: &str, report: &MigrationReport) {
    for key in &report.defaulted {
        log::warn!("{source}: `{key}` missing, using default");
    }
    for entry in &report.skipped {
        log::warn!("{source}: skipped malformed `{entry}`");
    }
}

fn clamp_probability(p: u64) -> u8 {
    u8::try_from(p.min(100)).unwrap_or(100)
}

/// Keep well-formed tiers in document order; report the rest as skipped.
fn tiers_from_entries(
    entries: &Map<String, Value>,
    [min_key, max_key, reward_key]: [&str; 3],
    prefix: &str,
    report: &mut MigrationReport,
) -> TierTable {
    let mut table = TierTable::empty();
    for (name, bounds) in entries {
        let field = |key: &str| bounds.get(key).and_then(Value::as_i64);
        let bounds = (field(min_key), field(max_key), field(reward_key));
        let (Some(min), Some(max), Some(reward)) = bounds else {
            report.skipped.push(format!("{prefix}.{name}"));
            continue;
        };
        let (Ok(min), Ok(max)) = (u32::try_from(min), u32::try_from(max)) else {
            report.skipped.push(format!("{prefix}.{name}"));
            continue;
        };
        table.upsert(Tier::new(name.clone(), min, max, reward));
    }
    table
}

/// Odds above 100 clamp to certainty; anything else non-numeric falls back
/// to the default.
fn clamp_typed_probability(crime: &mut Value, report: &mut MigrationReport) {
    let Some(crime) = crime.as_object_mut() else {
        return;
    };
    let Some(raw) = crime.get(KEY_SUCCESS_PROBABILITY) else {
        return;
    };
    if let Some(p) = raw.as_u64() {
        crime.insert(KEY_SUCCESS_PROBABILITY.to_string(), Value::from(clamp_probability(p)));
    } else {
        crime.remove(KEY_SUCCESS_PROBABILITY);
        report.skipped.push(format!("{KEY_CRIME}.{KEY_SUCCESS_PROBABILITY}"));
        report.defaulted.push("crime.success_probability");
    }
}

fn legacy_strings(
    blob: &Map<String, Value>,
    key: &'static str,
    report: &mut MigrationReport,
) -> Vec<String> {
    match legacy_value(blob, key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Some(_) => {
            report.skipped.push(key.to_string());
            Vec::new()
        }
        None => {
            report.defaulted.push(key);
            Vec::new()
        }
    }
}

fn legacy_ids(
    blob: &Map<String, Value>,
    key: &'static str,
    report: &mut MigrationReport,
) -> Vec<u64> {
    match legacy_value(blob, key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_u64).collect(),
        Some(_) => {
            report.skipped.push(key.to_string());
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn legacy_seconds(
    blob: &Map<String, Value>,
    key: &'static str,
    report: &mut MigrationReport,
) -> Option<u64> {
    match legacy_value(blob, key) {
        Some(value) => {
            let secs = value.as_u64();
            if secs.is_none() {
                report.skipped.push(key.to_string());
                report.defaulted.push(key);
            }
            secs
        }
        None => {
            report.defaulted.push(key);
            None
        }
    }
}
