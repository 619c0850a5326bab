//! Blob stores holding input documents and output files.
//!
//! A store maps `/`-separated keys to opaque byte blobs. Remote object stores
//! fit the same interface; this crate ships a local-directory store and an
//! in-memory one.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised by blob stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to list {root:?}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no blob stored under {0:?}")]
    NotFound(String),

    #[error("invalid key {0:?}: keys must be relative and must not contain `..`")]
    InvalidKey(String),
}

/// Listing, reading and writing of opaque byte blobs.
pub trait BlobStore {
    /// Human-readable location, used in log messages.
    fn location(&self) -> String;

    /// All keys starting with `prefix`, in ascending order.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Store backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Absolute path of `key`. Keys escaping the root are rejected.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_plain {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl BlobStore for LocalStore {
    fn location(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|source| StoreError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match self.key_for(entry.path()) {
                Some(key) if key.starts_with(prefix) => keys.push(key),
                Some(_) => {}
                None => tracing::warn!("Skipping non UTF-8 path {:?}", entry.path()),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Io {
                key: key.to_string(),
                source,
            },
        })
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, value).map_err(io_err)
    }
}

/// Store kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn location(&self) -> String {
        "memory://".to_string()
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .blobs
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_list_is_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("completions/nested")).unwrap();
        std::fs::write(temp.path().join("completions/2.json"), "{}").unwrap();
        std::fs::write(temp.path().join("completions/nested/1.json"), "{}").unwrap();
        std::fs::write(temp.path().join("readme.txt"), "hi").unwrap();

        let store = LocalStore::new(temp.path());
        assert_eq!(
            store.list("").unwrap(),
            vec!["completions/2.json", "completions/nested/1.json", "readme.txt"]
        );
        assert_eq!(
            store.list("completions/").unwrap(),
            vec!["completions/2.json", "completions/nested/1.json"]
        );
    }

    #[test]
    fn test_local_set_creates_parents_and_get_reads_back() {
        let temp = TempDir::new().unwrap();
        let mut store = LocalStore::create(temp.path().join("out")).unwrap();

        store.set("train/train.words.txt", b"a b\n").unwrap();
        assert_eq!(store.get("train/train.words.txt").unwrap(), b"a b\n");
        assert!(temp.path().join("out/train/train.words.txt").is_file());
    }

    #[test]
    fn test_local_missing_key() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        assert!(matches!(store.get("nope.json"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_local_rejects_escaping_keys() {
        let temp = TempDir::new().unwrap();
        let mut store = LocalStore::new(temp.path());
        assert!(matches!(store.path_for("../x"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.path_for("/etc/passwd"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.path_for(""), Err(StoreError::InvalidKey(_))));
        assert!(store.set("a/../../b", b"x").is_err());
    }

    #[test]
    fn test_local_missing_root_fails_to_list() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path().join("absent"));
        assert!(matches!(store.list(""), Err(StoreError::Walk { .. })));
    }

    #[test]
    fn test_memory_store_prefix_listing() {
        let mut store = MemoryStore::new();
        store.set("b/2.json", b"2").unwrap();
        store.set("a/1.json", b"1").unwrap();
        store.set("b/1.json", b"1").unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.list("b/").unwrap(), vec!["b/1.json", "b/2.json"]);
        assert_eq!(store.list("").unwrap().len(), 3);
        assert!(matches!(store.get("c"), Err(StoreError::NotFound(_))));
    }
}
