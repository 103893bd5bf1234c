//! In-process store with optional JSON snapshot persistence.
//!
//! One mutex guards the whole key space and is held by a transaction from
//! `begin` until commit or drop, so transactions never interleave.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use super::{Store, StoreError, Tx};

type Data = BTreeMap<String, Value>;

#[derive(Clone, Default)]
pub struct MemoryStore {
  data: Arc<Mutex<Data>>,
  path: Option<PathBuf>,
}

impl MemoryStore {
  /// Volatile store, used when no snapshot path is configured and in tests.
  pub fn new() -> Self {
    Self::default()
  }

  /// Store backed by a snapshot file. A missing file starts an empty store.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let data = match tokio::fs::read(&path).await {
      Ok(bytes) => serde_json::from_slice::<Data>(&bytes).map_err(|source| StoreError::CorruptSnapshot {
        path: path.display().to_string(),
        source,
      })?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Data::new(),
      Err(source) => {
        return Err(StoreError::Snapshot { path: path.display().to_string(), source });
      }
    };
    info!(target: "store", keys = data.len(), "Loaded store snapshot");
    Ok(Self { data: Arc::new(Mutex::new(data)), path: Some(path) })
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn begin(&self) -> Result<Box<dyn Tx>, StoreError> {
    let guard = self.data.clone().lock_owned().await;
    Ok(Box::new(MemoryTx { guard, staged: Data::new(), path: self.path.clone() }))
  }
}

struct MemoryTx {
  guard: OwnedMutexGuard<Data>,
  staged: Data,
  path: Option<PathBuf>,
}

#[async_trait]
impl Tx for MemoryTx {
  fn get(&self, key: &str) -> Option<Value> {
    self.staged.get(key).or_else(|| self.guard.get(key)).cloned()
  }

  fn set(&mut self, key: &str, value: Value) {
    self.staged.insert(key.to_string(), value);
  }

  async fn commit(self: Box<Self>) -> Result<(), StoreError> {
    let MemoryTx { mut guard, staged, path } = *self;
    if staged.is_empty() {
      return Ok(());
    }

    let mut next = (*guard).clone();
    let written = staged.len();
    next.extend(staged);

    if let Some(path) = &path {
      write_snapshot(path, &next).await?;
    }
    *guard = next;
    debug!(target: "store", keys = written, "Committed transaction");
    Ok(())
  }
}

async fn write_snapshot(path: &Path, data: &Data) -> Result<(), StoreError> {
  let io_err = |source| StoreError::Snapshot { path: path.display().to_string(), source };
  let bytes = serde_json::to_vec_pretty(data).map_err(|source| StoreError::Encode {
    key: "<snapshot>".into(),
    source,
  })?;

  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);
  tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
  tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use serde_json::json;

  use super::*;
  use crate::store::{get_json_default, set_json};

  #[tokio::test]
  async fn uncommitted_writes_are_discarded() {
    let store = MemoryStore::new();
    {
      let mut tx = store.begin().await.unwrap();
      tx.set("k", json!(1));
      assert_eq!(tx.get("k"), Some(json!(1)));
    }
    let tx = store.begin().await.unwrap();
    assert_eq!(tx.get("k"), None);
  }

  #[tokio::test]
  async fn concurrent_read_modify_write_loses_no_updates() {
    let store = MemoryStore::new();
    let mut handles = Vec::new();
    for i in 0..16 {
      let store = store.clone();
      handles.push(tokio::spawn(async move {
        let mut tx = store.begin().await.unwrap();
        let mut ids: Vec<i32> = get_json_default(tx.as_ref(), "ids", Vec::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        ids.push(i);
        set_json(tx.as_mut(), "ids", &ids).unwrap();
        tx.commit().await.unwrap();
      }));
    }
    for h in handles {
      h.await.unwrap();
    }
    let tx = store.begin().await.unwrap();
    let ids: Vec<i32> = get_json_default(tx.as_ref(), "ids", Vec::new()).unwrap();
    assert_eq!(ids.len(), 16);
  }

  #[tokio::test]
  async fn snapshot_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("boardwhite-store-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("state.json");
    let _ = tokio::fs::remove_file(&path).await;

    let store = MemoryStore::open(&path).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.set("boardwhite:neetcode:pinned_messages", json!([10, 11]));
    tx.commit().await.unwrap();

    let reopened = MemoryStore::open(&path).await.unwrap();
    let tx = reopened.begin().await.unwrap();
    assert_eq!(tx.get("boardwhite:neetcode:pinned_messages"), Some(json!([10, 11])));
    let _ = tokio::fs::remove_dir_all(&dir).await;
  }

  #[tokio::test]
  async fn failed_persist_leaves_state_untouched() {
    let path = std::env::temp_dir().join("boardwhite-missing-dir").join("nested").join("state.json");
    let store = MemoryStore { data: Arc::default(), path: Some(path) };
    let mut tx = store.begin().await.unwrap();
    tx.set("k", json!("v"));
    assert!(matches!(tx.commit().await, Err(StoreError::Snapshot { .. })));

    let tx = store.begin().await.unwrap();
    assert_eq!(tx.get("k"), None);
  }
}
