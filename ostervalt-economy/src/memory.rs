//! In-process collaborators backing tests and the command-line driver.
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::character::{Character, CharacterId, GuildId};
use crate::config::GuildConfig;
use crate::{CharacterRepository, GuildConfigSource};

#[derive(Debug, Default)]
pub struct MemoryCharacterRepository {
    characters: RwLock<HashMap<CharacterId, Character>>,
}

impl MemoryCharacterRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_characters(characters: impl IntoIterator<Item = Character>) -> Self {
        let map = characters.into_iter().map(|c| (c.id, c)).collect();
        Self {
            characters: RwLock::new(map),
        }
    }

    /// Seed or replace a character.
    pub async fn insert(&self, character: Character) {
        self.characters.write().await.insert(character.id, character);
    }

    /// Snapshot of every stored character ordered by id.
    pub async fn all(&self) -> Vec<Character> {
        let mut characters: Vec<Character> =
            self.characters.read().await.values().cloned().collect();
        characters.sort_by_key(|c| c.id);
        characters
    }
}

#[async_trait]
impl CharacterRepository for MemoryCharacterRepository {
    type Error = Infallible;

    async fn get_by_id(&self, id: CharacterId) -> Result<Option<Character>, Self::Error> {
        Ok(self.characters.read().await.get(&id).cloned())
    }

    async fn update(&self, character: &Character) -> Result<(), Self::Error> {
        self.characters
            .write()
            .await
            .insert(character.id, character.clone());
        Ok(())
    }
}

/// Fixed per-guild configuration with a fallback for unknown guilds.
#[derive(Debug, Clone, Default)]
pub struct StaticGuildConfigs {
    fallback: Arc<GuildConfig>,
    guilds: HashMap<GuildId, Arc<GuildConfig>>,
}

impl StaticGuildConfigs {
    #[must_use]
    pub fn new(fallback: GuildConfig) -> Self {
        Self {
            fallback: Arc::new(fallback),
            guilds: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_guild(mut self, guild: GuildId, config: GuildConfig) -> Self {
        self.guilds.insert(guild, Arc::new(config));
        self
    }
}

#[async_trait]
impl GuildConfigSource for StaticGuildConfigs {
    type Error = Infallible;

    async fn guild_config(&self, guild: GuildId) -> Result<Arc<GuildConfig>, Self::Error> {
        Ok(Arc::clone(self.guilds.get(&guild).unwrap_or(&self.fallback)))
    }
}
