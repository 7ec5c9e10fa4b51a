use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ostervalt_economy::{Character, CharacterId, CharacterRepository, GuildId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access state file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file is not valid JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    characters: Vec<Character>,
}

/// Character repository persisted to a single JSON document.
///
/// Every `update` rewrites the file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StateFile::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Allocate an id and persist a fresh character.
    pub async fn create(
        &self,
        name: &str,
        owner: UserId,
        guild: GuildId,
    ) -> Result<Character, StoreError> {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(max_id(&state.characters)) + 1;
        let character = Character::new(CharacterId(state.next_id), name, owner, guild);
        state.characters.push(character.clone());
        self.persist(&state).await?;
        Ok(character)
    }

    pub async fn list(&self) -> Vec<Character> {
        let mut characters = self.state.lock().await.characters.clone();
        characters.sort_by_key(|c| c.id);
        characters
    }

    async fn persist(&self, state: &StateFile) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, text).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        log::debug!(
            "wrote {} characters to {}",
            state.characters.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn max_id(characters: &[Character]) -> u64 {
    characters.iter().map(|c| c.id.0).max().unwrap_or(0)
}

#[async_trait]
impl CharacterRepository for JsonFileStore {
    type Error = StoreError;

    async fn get_by_id(&self, id: CharacterId) -> Result<Option<Character>, Self::Error> {
        let state = self.state.lock().await;
        Ok(state.characters.iter().find(|c| c.id == id).cloned())
    }

    async fn update(&self, character: &Character) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        match state.characters.iter_mut().find(|c| c.id == character.id) {
            Some(slot) => *slot = character.clone(),
            None => state.characters.push(character.clone()),
        }
        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ostervalt-store-{label}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[tokio::test]
    async fn characters_survive_reopen() {
        let path = temp_state("reopen");
        let store = JsonFileStore::open(&path).await.unwrap();
        let mut ayla = store.create("Ayla", UserId(1), GuildId(1)).await.unwrap();
        let bram = store.create("Bram", UserId(2), GuildId(1)).await.unwrap();
        assert_eq!(ayla.id, CharacterId(1));
        assert_eq!(bram.id, CharacterId(2));

        ayla.money = 321;
        store.update(&ayla).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_by_id(ayla.id).await.unwrap(), Some(ayla));
        assert_eq!(reopened.list().await.len(), 2);
        let carl = reopened.create("Carl", UserId(3), GuildId(1)).await.unwrap();
        assert_eq!(carl.id, CharacterId(3));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn corrupt_state_is_reported() {
        let path = temp_state("corrupt");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path).await,
            Err(StoreError::Json(_))
        ));
        let _ = std::fs::remove_file(path);
    }
}
