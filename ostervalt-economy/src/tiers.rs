//! Level-tiered rewards for the work action.
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigurationDegraded;

/// Level range mapped to a fixed work reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub name: String,
    pub level_min: u32,
    pub level_max: u32,
    pub reward: i64,
}

impl Tier {
    #[must_use]
    pub fn new(name: impl Into<String>, level_min: u32, level_max: u32, reward: i64) -> Self {
        Self {
            name: name.into(),
            level_min,
            level_max,
            reward,
        }
    }

    #[must_use]
    pub const fn contains(&self, level: u32) -> bool {
        self.level_min <= level && level <= self.level_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct TierBounds {
    level_min: u32,
    level_max: u32,
    reward: i64,
}

/// Tiers in configured order. Ranges may overlap or leave gaps.
///
/// Serialized as a JSON object keyed by tier name; key order is significant
/// and preserved in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierTable(Vec<Tier>);

impl TierTable {
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Insert a tier, replacing an existing tier of the same name in place.
    pub fn upsert(&mut self, tier: Tier) {
        if let Some(existing) = self.0.iter_mut().find(|t| t.name == tier.name) {
            *existing = tier;
        } else {
            self.0.push(tier);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tier> {
        self.0.iter()
    }

    /// First tier, in configured order, whose range contains `level`.
    #[must_use]
    pub fn find(&self, level: u32) -> Option<&Tier> {
        self.0.iter().find(|tier| tier.contains(level))
    }
}

impl FromIterator<Tier> for TierTable {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut table = Self::empty();
        for tier in iter {
            table.upsert(tier);
        }
        table
    }
}

impl<'a> IntoIterator for &'a TierTable {
    type Item = &'a Tier;
    type IntoIter = std::slice::Iter<'a, Tier>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for TierTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for tier in &self.0 {
            let bounds = TierBounds {
                level_min: tier.level_min,
                level_max: tier.level_max,
                reward: tier.reward,
            };
            map.serialize_entry(&tier.name, &bounds)?;
        }
        map.end()
    }
}

struct TierTableVisitor;

impl<'de> Visitor<'de> for TierTableVisitor {
    type Value = TierTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of tier name to {level_min, level_max, reward}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = TierTable::empty();
        while let Some((name, bounds)) = access.next_entry::<String, TierBounds>()? {
            table.upsert(Tier::new(
                name,
                bounds.level_min,
                bounds.level_max,
                bounds.reward,
            ));
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for TierTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TierTableVisitor)
    }
}

/// Reward lookup result, including the matched tier when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierResolution {
    pub reward: i64,
    pub tier: Option<String>,
    pub degraded: Option<ConfigurationDegraded>,
}

/// Resolve the work reward for `level`.
///
/// The first tier in configured order wins, even when a later tier is
/// narrower or pays more. An empty table or a level no tier covers yields a
/// zero reward together with the reason, so the action still goes ahead.
#[must_use]
pub fn resolve(level: u32, tiers: &TierTable) -> TierResolution {
    if tiers.is_empty() {
        return TierResolution {
            reward: 0,
            tier: None,
            degraded: Some(ConfigurationDegraded::EmptyTierTable),
        };
    }
    match tiers.find(level) {
        Some(tier) => TierResolution {
            reward: tier.reward,
            tier: Some(tier.name.clone()),
            degraded: None,
        },
        None => TierResolution {
            reward: 0,
            tier: None,
            degraded: Some(ConfigurationDegraded::NoTierForLevel { level }),
        },
    }
}

/// Reward for `level`, or 0 when no tier applies.
#[must_use]
pub fn resolve_reward(level: u32, tiers: &TierTable) -> i64 {
    resolve(level, tiers).reward
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(tiers: &[(&str, u32, u32, i64)]) -> TierTable {
        tiers
            .iter()
            .map(|&(name, min, max, reward)| Tier::new(name, min, max, reward))
            .collect()
    }

    #[test]
    fn first_match_wins_over_narrower_or_richer() {
        let tiers = table(&[("broad", 1, 20, 10), ("narrow", 3, 3, 500)]);
        assert_eq!(resolve_reward(3, &tiers), 10);

        let tiers = table(&[("narrow", 3, 3, 500), ("broad", 1, 20, 10)]);
        assert_eq!(resolve_reward(3, &tiers), 500);
        assert_eq!(resolve_reward(4, &tiers), 10);
    }

    #[test]
    fn empty_or_unmatched_pays_nothing() {
        let resolution = resolve(5, &TierTable::empty());
        assert_eq!(resolution.reward, 0);
        assert_eq!(
            resolution.degraded,
            Some(ConfigurationDegraded::EmptyTierTable)
        );

        let tiers = table(&[("low", 1, 4, 100), ("overlap", 2, 6, 200)]);
        let resolution = resolve(12, &tiers);
        assert_eq!(resolution.reward, 0);
        assert_eq!(
            resolution.degraded,
            Some(ConfigurationDegraded::NoTierForLevel { level: 12 })
        );
    }

    #[test]
    fn inverted_range_never_matches() {
        let tiers = table(&[("inverted", 9, 2, 1_000)]);
        assert_eq!(resolve_reward(5, &tiers), 0);
    }

    #[test]
    fn json_keeps_document_order() {
        let json = r#"{
            "zeta": {"level_min": 1, "level_max": 10, "reward": 1},
            "alpha": {"level_min": 1, "level_max": 10, "reward": 2}
        }"#;
        let tiers: TierTable = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = tiers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(resolve(5, &tiers).tier.as_deref(), Some("zeta"));

        let encoded = serde_json::to_string(&tiers).unwrap();
        assert!(encoded.find("zeta").unwrap() < encoded.find("alpha").unwrap());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut tiers = table(&[("t1", 1, 5, 100), ("t2", 6, 10, 200)]);
        tiers.upsert(Tier::new("t1", 1, 5, 150));
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers.iter().next().map(|t| t.reward), Some(150));
    }
}
