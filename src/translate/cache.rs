//! Durable JSON key-value caches
//!
//! Every cache tier (translations, glossary snapshots, resume state) is a
//! `CacheStore` backed by one JSON file. Writes only happen in [`CacheStore::sync`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no cache entry for key: {0}")]
    NotFound(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug)]
pub struct CacheStore<V> {
    path: PathBuf,
    data: BTreeMap<String, V>,
    dirty: bool,
}

impl<V> CacheStore<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Load the cache at `path`. A missing file is an empty cache; an
    /// unreadable one is an error.
    pub fn open<P: Into<PathBuf>>(path: P) -> CacheResult<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                CacheError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        tracing::debug!(
            "Loaded {} cache entries from {}",
            data.len(),
            path.display()
        );
        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.data.insert(key.into(), value);
        self.dirty = true;
    }

    /// Remove an entry that is known to exist.
    pub fn delete(&mut self, key: &str) -> CacheResult<V> {
        let value = self
            .data
            .remove(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        self.dirty = true;
        Ok(value)
    }

    pub fn replace_all(&mut self, data: BTreeMap<String, V>) {
        self.data = data;
        self.dirty = true;
    }

    pub fn entries(&self) -> &BTreeMap<String, V> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flush to disk: an empty cache removes its file, a dirty one is written
    /// to a swap file and renamed over the real one.
    pub fn sync(&mut self) -> CacheResult<()> {
        if self.data.is_empty() {
            self.dirty = false;
            return self.wipe_from_disk();
        }
        if !self.is_dirty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let content = to_json_pretty(&self.data).map_err(|source| CacheError::Serialize {
            path: self.path.clone(),
            source,
        })?;

        let swap = self.swap_path();
        fs::write(&swap, content).map_err(|source| self.io_error(source))?;
        fs::rename(&swap, &self.path).map_err(|source| self.io_error(source))?;

        self.dirty = false;
        tracing::debug!(
            "Synced {} cache entries to {}",
            self.data.len(),
            self.path.display()
        );
        Ok(())
    }

    fn wipe_from_disk(&self) -> CacheResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn swap_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".swp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Tab-indented JSON with non-ASCII characters left as is.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
