//! File-backed store of community configurations.
//!
//! Uses DashMap for concurrent access. Every mutation goes through
//! [`ConfigStore::update`], which applies a closure to one record while the
//! map entry is held (no suspension point), then rewrites the whole file.
//! Rewrites are serialized by a process-wide write lock so the last writer
//! always wins on disk too.
//!
//! Records are decoded one at a time. A record that cannot be decoded is
//! kept verbatim and written back untouched. A file that is not JSON at all
//! is moved aside to `<file>.corrupt` before anything is written.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::types::CommunityConfig;
use crate::error::{Error, Result};

/// Key of the community map in the file, and the name older files used.
const COMMUNITIES_KEY: &str = "communities";
const LEGACY_COMMUNITIES_KEY: &str = "guilds";

/// On-disk persistence format.
#[derive(Debug, Serialize)]
struct PersistedData {
    communities: Map<String, Value>,
    /// Top-level keys this version does not know about.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Result of reading the backing file.
#[derive(Debug, Default)]
struct LoadedData {
    communities: BTreeMap<String, CommunityConfig>,
    unreadable: Map<String, Value>,
    extra: Map<String, Value>,
    /// False when an unreadable file could not be moved aside.
    writable: bool,
}

impl LoadedData {
    fn empty() -> Self {
        Self {
            writable: true,
            ..Default::default()
        }
    }
}

/// Store for per-community configuration.
#[derive(Clone)]
pub struct ConfigStore {
    /// Community ID → config.
    communities: Arc<DashMap<String, CommunityConfig>>,

    /// Unknown top-level keys read at startup, written back on every save.
    extra: Arc<Map<String, Value>>,

    /// Records that failed to decode, written back verbatim until the
    /// community gets a fresh record.
    unreadable: Arc<Map<String, Value>>,

    /// Backing file. None = in-memory only.
    path: Option<PathBuf>,

    /// Serializes file rewrites.
    write_lock: Arc<Mutex<()>>,
}

impl ConfigStore {
    /// Open the store backed by `path`.
    ///
    /// A missing file starts an empty store. A file that cannot be read or
    /// parsed is moved to `<file>.corrupt` and the store starts empty; if it
    /// cannot be moved, the store runs without persistence rather than
    /// overwrite it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load_from_disk(&path);
        let path = if data.writable {
            Some(path)
        } else {
            tracing::error!(path = %path.display(), "Config persistence disabled for this run");
            None
        };
        Self {
            communities: Arc::new(data.communities.into_iter().collect()),
            extra: Arc::new(data.extra),
            unreadable: Arc::new(data.unreadable),
            path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            communities: Arc::new(DashMap::new()),
            extra: Arc::new(Map::new()),
            unreadable: Arc::new(Map::new()),
            path: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    fn load_from_disk(path: &Path) -> LoadedData {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No existing config file, starting fresh");
            return LoadedData::empty();
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read config file");
                return Self::quarantine(path);
            }
        };
        let mut root = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(root)) => root,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Config file is not a JSON object");
                return Self::quarantine(path);
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to parse config file");
                return Self::quarantine(path);
            }
        };

        // Current entries win over legacy ones for the same community.
        let mut records = Map::new();
        for key in [LEGACY_COMMUNITIES_KEY, COMMUNITIES_KEY] {
            match root.remove(key) {
                Some(Value::Object(map)) => records.extend(map),
                Some(Value::Null) | None => {}
                Some(_) => {
                    tracing::warn!(key = key, path = %path.display(), "Community map is not an object");
                    return Self::quarantine(path);
                }
            }
        }

        let mut data = LoadedData::empty();
        data.extra = root;
        for (id, record) in records {
            match CommunityConfig::from_stored(record.clone()) {
                Ok(config) => {
                    data.communities.insert(id, config);
                }
                Err(e) => {
                    tracing::warn!(
                        community_id = id.as_str(),
                        error = %e,
                        "Unreadable community record, keeping it as is"
                    );
                    data.unreadable.insert(id, record);
                }
            }
        }

        tracing::info!(
            communities = data.communities.len(),
            unreadable = data.unreadable.len(),
            path = %path.display(),
            "Community config loaded from disk"
        );
        data
    }

    /// Move an unusable file out of the way so the next save cannot
    /// overwrite it.
    fn quarantine(path: &Path) -> LoadedData {
        let target = sibling_path(path, ".corrupt");
        match std::fs::rename(path, &target) {
            Ok(()) => {
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %target.display(),
                    "Moved unusable config file aside, starting fresh"
                );
                LoadedData::empty()
            }
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Failed to move unusable config file aside");
                LoadedData::default()
            }
        }
    }

    /// Serialize the whole store and atomically replace the backing file.
    ///
    /// Writes `<file>.tmp` and renames it over the file. On failure the
    /// in-memory state is untouched and remains authoritative.
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };

        let _guard = self.write_lock.lock();

        // Snapshot under the write lock so a later save never writes older data.
        let mut communities: Map<String, Value> = self
            .unreadable
            .iter()
            .filter(|(id, _)| !self.communities.contains_key(id.as_str()))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        for (id, config) in self.snapshot() {
            communities.insert(id, serde_json::to_value(config)?);
        }
        let data = PersistedData {
            communities,
            extra: (*self.extra).clone(),
        };
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::error!(error = %e, path = %parent.display(), "Failed to create data directory");
                Error::Persistence(format!("create {}: {}", parent.display(), e))
            })?;
        }

        let tmp_path = sibling_path(path, ".tmp");
        if let Err(e) = std::fs::write(&tmp_path, &json) {
            tracing::error!(error = %e, "Failed to write config temp file");
            return Err(Error::Persistence(format!("write {}: {}", tmp_path.display(), e)));
        }
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            tracing::error!(error = %e, "Failed to rename temp file over config file");
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Error::Persistence(format!("rename {}: {}", path.display(), e)));
        }

        tracing::debug!(communities = data.communities.len(), "Config saved");
        Ok(())
    }

    /// Final save; consumes the store handle.
    pub fn close(self) -> Result<()> {
        self.save()
    }

    // ── Access ───────────────────────────────────────────────────────────────

    /// Get a community's config, creating and persisting the defaults on
    /// first access.
    pub fn get(&self, community_id: &str) -> CommunityConfig {
        let config = match self.communities.entry(community_id.to_string()) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(CommunityConfig::default()).clone(),
        };

        tracing::info!(community_id = community_id, "Created default community config");
        if let Err(e) = self.save() {
            tracing::warn!(
                community_id = community_id,
                error = %e,
                "Failed to persist new community config"
            );
        }
        config
    }

    /// Read-modify-write one community's config, then save.
    ///
    /// The closure runs while the entry is held and must not block. If the
    /// save fails the mutation stays applied in memory and the error is
    /// returned.
    pub fn update<T>(
        &self,
        community_id: &str,
        f: impl FnOnce(&mut CommunityConfig) -> T,
    ) -> Result<T> {
        let out = {
            let mut entry = self
                .communities
                .entry(community_id.to_string())
                .or_insert_with(CommunityConfig::default);
            f(entry.value_mut())
        };
        self.save()?;
        Ok(out)
    }

    /// Whether a community has a record.
    pub fn contains(&self, community_id: &str) -> bool {
        self.communities.contains_key(community_id)
    }

    /// Clone of every record, ordered by community ID.
    pub fn snapshot(&self) -> BTreeMap<String, CommunityConfig> {
        self.communities
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn community_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.communities.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

/// `path` with `suffix` appended to the file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::WarningRecord;

    fn store_in(dir: &tempfile::TempDir) -> (ConfigStore, PathBuf) {
        let path = dir.path().join("warden.json");
        (ConfigStore::open(&path), path)
    }

    #[test]
    fn test_get_creates_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_in(&dir);

        let cfg = store.get("g1");
        assert_eq!(cfg, CommunityConfig::default());
        assert!(path.exists());

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["communities"]["g1"]["prefix"], "!");
    }

    #[test]
    fn test_get_is_idempotent() {
        let store = ConfigStore::in_memory();
        store.get("g1");
        store.update("g1", |cfg| cfg.prefix = "?".into()).unwrap();

        let second = store.get("g1");
        assert_eq!(second.prefix, "?");
        assert_eq!(store.get("g1"), second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_in(&dir);

        let count = store
            .update("g1", |cfg| {
                cfg.automod.spam_max = 4;
                let list = cfg.warnings.entry("u1".into()).or_default();
                list.push(WarningRecord {
                    reason: "spam".into(),
                    issuer_id: "mod".into(),
                    timestamp: 1,
                });
                list.len()
            })
            .unwrap();
        assert_eq!(count, 1);
        store.close().unwrap();

        let reopened = ConfigStore::open(&path);
        let cfg = reopened.get("g1");
        assert_eq!(cfg.automod.spam_max, 4);
        assert_eq!(cfg.warnings_for("u1").len(), 1);
        assert!(!sibling_path(&path, ".tmp").exists());
    }

    #[test]
    fn test_legacy_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{
                "guilds": {
                    "g1": { "prefix": "?", "automod": { "antiLink": true, "badWords": ["Scam"] } }
                },
                "reactionRolePanels": { "p1": ["r1"] }
            }"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        let cfg = store.get("g1");
        assert_eq!(cfg.prefix, "?");
        assert!(cfg.automod.anti_link);
        assert!(cfg.automod.anti_invite);
        assert_eq!(cfg.automod.spam_window_ms, 8000);
        assert_eq!(cfg.automod.banned_words, vec!["scam".to_string()]);

        // Unknown top-level data survives a save.
        store.save().unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["reactionRolePanels"]["p1"][0], "r1");
        assert!(raw["communities"]["g1"].is_object());
    }

    #[test]
    fn test_corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(&path);
        assert!(store.is_empty());
        assert_eq!(
            std::fs::read_to_string(sibling_path(&path, ".corrupt")).unwrap(),
            "{ not json"
        );

        store.get("g1");
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["communities"]["g1"].is_object());
    }

    #[test]
    fn test_bad_record_does_not_discard_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(
            &path,
            r#"{
                "communities": {
                    "g1": {
                        "prefix": "?",
                        "warnings": { "u1": [{ "reason": "spam", "issuerId": "mod", "timestamp": 1 }] }
                    },
                    "g2": { "automod": { "badWords": ["a"], "bannedWords": ["b"] } },
                    "g3": { "automod": { "spamMax": "lots" } }
                }
            }"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.len(), 2);
        let g1 = store.get("g1");
        assert_eq!(g1.prefix, "?");
        assert_eq!(g1.warnings_for("u1").len(), 1);
        assert_eq!(
            store.get("g2").automod.banned_words,
            vec!["b".to_string(), "a".to_string()]
        );
        assert!(!store.contains("g3"));

        store.update("g1", |cfg| cfg.prefix = "$".into()).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["communities"]["g1"]["prefix"], "$");
        assert_eq!(raw["communities"]["g1"]["warnings"]["u1"][0]["reason"], "spam");
        assert_eq!(raw["communities"]["g3"]["automod"]["spamMax"], "lots");
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a file, so the save must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("warden.json");

        let store = ConfigStore::open(&path);
        let result = store.update("g1", |cfg| cfg.prefix = "$".into());
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(store.get("g1").prefix, "$");
    }

    #[test]
    fn test_community_ids_sorted() {
        let store = ConfigStore::in_memory();
        store.get("b");
        store.get("a");
        assert_eq!(store.community_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.contains("a"));
        assert!(!store.contains("c"));
    }
}
