//! Favorite track ids and the key-value store they persist to.
//!
//! The stored snapshot is read once at startup. After that the in-memory
//! set is authoritative and every mutation is flushed back to the store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{playlist::TrackId, PlayerError, Result};

/// Minimal string key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Store that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk. Writes go through a
/// temporary file and a rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$XDG_DATA_HOME/music-player/store.json`, falling back to
    /// `~/.local/share`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            if !xdg.trim().is_empty() {
                return Some(PathBuf::from(xdg).join("music-player").join("store.json"));
            }
        }
        let home = std::env::var("HOME").ok()?;
        if home.trim().is_empty() {
            return None;
        }
        Some(
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("music-player")
                .join("store.json"),
        )
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(PlayerError::Storage(format!(
                "cannot read {}: {err}",
                self.path.display()
            ))),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Set of favorite track ids in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteSet {
    key: String,
    ids: Vec<TrackId>,
}

impl FavoriteSet {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ids: Vec::new(),
        }
    }

    /// Reads the stored snapshot. An unreadable or corrupt snapshot yields
    /// an empty set.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Self {
        let mut set = Self::new(key);
        match store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<TrackId>>(&raw) {
                Ok(ids) => {
                    for id in ids {
                        if !set.ids.contains(&id) {
                            set.ids.push(id);
                        }
                    }
                }
                Err(err) => tracing::warn!(%err, key, "ignoring corrupt favorites snapshot"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, key, "favorites snapshot unavailable"),
        }
        set
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[TrackId] {
        &self.ids
    }

    /// Flips membership of `id`, then flushes. Returns whether `id` is now a
    /// favorite. A failed flush is logged; the in-memory change stands.
    pub fn toggle(&mut self, id: &TrackId, store: &mut dyn KeyValueStore) -> bool {
        let now_favorite = match self.ids.iter().position(|existing| existing == id) {
            Some(index) => {
                self.ids.remove(index);
                false
            }
            None => {
                self.ids.push(id.clone());
                true
            }
        };

        if let Err(err) = self.flush(store) {
            tracing::warn!(%err, "failed to persist favorites");
        }
        now_favorite
    }

    pub fn flush(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        let body = serde_json::to_string(&self.ids)?;
        store.set(&self.key, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(PlayerError::Storage("offline".to_string()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(PlayerError::Storage("offline".to_string()))
        }
    }

    #[test]
    fn toggling_twice_restores_membership() {
        let mut store = MemoryStore::new();
        let mut favorites = FavoriteSet::load(&store, "mp_favs");
        let id = TrackId::new("abc1234");

        assert!(favorites.toggle(&id, &mut store));
        assert!(favorites.contains(&id));
        assert!(!favorites.toggle(&id, &mut store));
        assert!(!favorites.contains(&id));
        assert_eq!(store.get("mp_favs").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn every_toggle_is_flushed_in_insertion_order() {
        let mut store = MemoryStore::new();
        let mut favorites = FavoriteSet::new("mp_favs");
        favorites.toggle(&TrackId::new("b"), &mut store);
        favorites.toggle(&TrackId::new("a"), &mut store);

        assert_eq!(
            store.get("mp_favs").unwrap().as_deref(),
            Some(r#"["b","a"]"#)
        );
        let reloaded = FavoriteSet::load(&store, "mp_favs");
        assert_eq!(reloaded, favorites);
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let mut store = MemoryStore::new();
        store.set("mp_favs", "{not json").unwrap();

        assert!(FavoriteSet::load(&store, "mp_favs").is_empty());
        assert!(FavoriteSet::load(&BrokenStore, "mp_favs").is_empty());
    }

    #[test]
    fn failed_flush_keeps_in_memory_change() {
        let mut favorites = FavoriteSet::new("mp_favs");
        let id = TrackId::new("x");

        assert!(favorites.toggle(&id, &mut BrokenStore));
        assert!(favorites.contains(&id));
    }

    #[test]
    fn json_file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-player").join("store.json");

        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.get("mp_favs").unwrap(), None);
        let mut favorites = FavoriteSet::load(&store, "mp_favs");
        favorites.toggle(&TrackId::new("q1w2e3r"), &mut store);
        store.set("theme", "neon").unwrap();

        let reopened = JsonFileStore::new(&path);
        let loaded = FavoriteSet::load(&reopened, "mp_favs");
        assert!(loaded.contains(&TrackId::new("q1w2e3r")));
        assert_eq!(reopened.get("theme").unwrap().as_deref(), Some("neon"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_store_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "[1, 2").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.get("mp_favs").is_err());
        assert!(FavoriteSet::load(&store, "mp_favs").is_empty());
    }
}
