//! Key-value persistence backends.

use crate::{RegistryError, RegistryResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Byte store keyed by `/`-separated relative keys.
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &str) -> RegistryResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> RegistryResult<()>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> RegistryResult<()>;
    fn keys(&self, prefix: &str) -> RegistryResult<Vec<String>>;
}

/// Stores each key as a file under `root`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> RegistryResult<PathBuf> {
        let rel = Path::new(key);
        let clean = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(RegistryError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn get(&self, key: &str) -> RegistryResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::io(path, e)),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> RegistryResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }
        // Atomic replace via a temp file.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| RegistryError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| RegistryError::io(&path, e))
    }

    fn delete(&self, key: &str) -> RegistryResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RegistryError::io(path, e)),
        }
        // Drop the artifact directory once it is empty.
        if let Some(parent) = path.parent().filter(|p| *p != self.root) {
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> RegistryResult<Vec<String>> {
        let mut out = Vec::new();
        collect_keys(&self.root, &self.root, &mut out)?;
        out.retain(|k| k.starts_with(prefix));
        out.sort();
        Ok(out)
    }
}

fn collect_keys(root: &Path, dir: &Path, out: &mut Vec<String>) -> RegistryResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RegistryError::io(dir, e)),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_keys(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let key: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(key.join("/"));
        }
    }
    Ok(())
}

/// In-process store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> T) -> T {
        match self.entries.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &str) -> RegistryResult<Option<Vec<u8>>> {
        Ok(self.with(|m| m.get(key).cloned()))
    }

    fn put(&self, key: &str, value: &[u8]) -> RegistryResult<()> {
        self.with(|m| m.insert(key.to_string(), value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &str) -> RegistryResult<()> {
        self.with(|m| m.remove(key));
        Ok(())
    }

    fn keys(&self, prefix: &str) -> RegistryResult<Vec<String>> {
        Ok(self.with(|m| {
            m.keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_round_trips_and_rejects_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        store.put("models/1/model.json", b"{}").unwrap();
        assert_eq!(store.get("models/1/model.json").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.keys("models/").unwrap(), vec!["models/1/model.json"]);
        assert!(store.get("missing").unwrap().is_none());
        assert!(matches!(store.put("../x", b"1"), Err(RegistryError::InvalidKey(_))));
        store.delete("models/1/model.json").unwrap();
        store.delete("models/1/model.json").unwrap();
        assert!(!tmp.path().join("models/1").exists());
    }

    #[test]
    fn memory_store_lists_by_prefix() {
        let store = MemoryArtifactStore::new();
        store.put("a/1", b"x").unwrap();
        store.put("b/1", b"y").unwrap();
        assert_eq!(store.keys("a/").unwrap(), vec!["a/1"]);
        store.delete("a/1").unwrap();
        assert_eq!(store.len(), 1);
    }
}
