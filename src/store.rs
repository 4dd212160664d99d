// src/store.rs
//! String key-value port for the detector's persisted state.
//!
//! The dashboard keeps two JSON blobs under fixed keys. Anything that can
//! `get`/`set` strings can back them: an in-memory map for tests, a directory
//! of files for the service. [`WriteBehindStore`] puts a cache in front of a
//! slow backend and moves its writes onto a background task.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};

pub trait KvStore: Send + Sync {
    /// Missing or unreadable entries are `None`.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Some(s),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(target: "store", path = %path.display(), "read failed: {e:#}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating state dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves half a JSON document behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

enum WriteOp {
    Set(String, String),
    Flush(oneshot::Sender<()>),
}

/// Cache in front of another store. `set` updates the cache and queues the
/// write; a background task applies queued writes in order on the blocking
/// pool, so callers never touch the disk while holding their own locks.
pub struct WriteBehindStore {
    inner: Arc<dyn KvStore>,
    cache: Mutex<HashMap<String, String>>,
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehindStore {
    /// Must be called inside a tokio runtime.
    pub fn spawn(inner: Arc<dyn KvStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let backend = inner.clone();
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Set(key, value) => {
                        let backend = backend.clone();
                        let res =
                            tokio::task::spawn_blocking(move || backend.set(&key, &value)).await;
                        match res {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::warn!(target: "store", "deferred write failed: {e:#}"),
                            Err(e) => tracing::warn!(target: "store", "deferred write aborted: {e}"),
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            tx,
        }
    }

    /// Resolves once every write queued before the call has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl KvStore for WriteBehindStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Some(v.clone());
        }
        let loaded = self.inner.get(key)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        // a `set` that raced the read wins
        Some(cache.entry(key.to_string()).or_insert(loaded).clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.tx
            .send(WriteOp::Set(key.to_string(), value.to_string()))
            .map_err(|_| anyhow::anyhow!("write-behind task stopped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites() {
        let s = MemoryStore::new();
        assert!(s.get("k").is_none());
        s.set("k", "1").unwrap();
        s.set("k", "2").unwrap();
        assert_eq!(s.get("k").as_deref(), Some("2"));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn file_store_round_trips_and_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let s = FileStore::new(tmp.path().join("state"));
        assert!(s.get("scrapers_art_last_state").is_none());
        s.set("scrapers_art_last_state", r#"{"a":1}"#).unwrap();
        assert_eq!(
            s.get("scrapers_art_last_state").as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(tmp.path().join("state/scrapers_art_last_state.json").exists());
    }

    #[tokio::test]
    async fn write_behind_serves_cache_then_lands_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = Arc::new(FileStore::new(tmp.path()));
        disk.set("seed", "old").unwrap();

        let store = WriteBehindStore::spawn(disk.clone());
        assert_eq!(store.get("seed").as_deref(), Some("old"));
        assert!(store.get("missing").is_none());

        store.set("seed", "1").unwrap();
        store.set("seed", "2").unwrap();
        store.set("other", "x").unwrap();
        assert_eq!(store.get("seed").as_deref(), Some("2"));

        store.flush().await;
        assert_eq!(disk.get("seed").as_deref(), Some("2"));
        assert_eq!(disk.get("other").as_deref(), Some("x"));
    }
}
