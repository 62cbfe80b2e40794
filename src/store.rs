use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persisted UI settings: one JSON object in `config.json` under the
/// per-user data directory. Every mutation is a full-document
/// read-modify-write; the host is single-instance, so there is no
/// concurrent-writer protection.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("config.json"),
        }
    }

    /// Store under the per-user data directory (`<data_dir>/deskrig`).
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir().context("no per-user data directory available")?;
        Ok(Self::new(&base.join("deskrig")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole map. Read or parse failures yield an empty map.
    pub fn load(&self) -> BTreeMap<String, Value> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "config file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read config file");
                BTreeMap::new()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.load().get(key).cloned()
    }

    /// Returns false when the rewrite fails; never panics.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let mut map = self.load();
        map.insert(key.to_string(), value);
        self.persist(&map)
    }

    /// Removing an absent key still rewrites the document and reports success.
    pub fn delete(&self, key: &str) -> bool {
        let mut map = self.load();
        map.remove(key);
        self.persist(&map)
    }

    fn persist(&self, map: &BTreeMap<String, Value>) -> bool {
        match self.save(map) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write config file");
                false
            }
        }
    }

    fn save(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("config path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config dir {}", dir.display()))?;

        let content = serde_json::to_string_pretty(map)?;
        // Atomic write: write to tmp file then rename
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.load().is_empty());
        assert_eq!(store.get("theme"), None);
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        assert!(store.set("theme", json!("dark")));
        assert!(store.set("volume", json!(70)));
        assert_eq!(store.get("theme"), Some(json!("dark")));
        assert_eq!(store.get("volume"), Some(json!(70)));

        assert!(store.delete("theme"));
        assert_eq!(store.get("theme"), None);
        assert_eq!(store.get("volume"), Some(json!(70)));
    }

    #[test]
    fn delete_of_absent_key_succeeds() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.delete("never-set"));
    }

    #[test]
    fn corrupt_file_loads_empty_and_recovers() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_empty());
        assert!(store.set("theme", json!("light")));
        assert_eq!(store.get("theme"), Some(json!("light")));
    }

    #[test]
    fn rewrite_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.set("k", json!(1)));
        assert!(!dir.path().join("config.json.tmp").exists());
        assert!(dir.path().join("config.json").exists());
    }
}
