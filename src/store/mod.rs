//! Transactional key-value store shared by every bot feature.
//!
//! A transaction is opened with [`Store::begin`], read and written through the
//! returned [`Tx`], and made durable with [`Tx::commit`]. Dropping a `Tx` without
//! committing discards every staged write.
//!
//! Values are JSON documents; [`get_json_default`] and [`set_json`] give typed access.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("decode key {key}: {source}")]
  Decode {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("encode key {key}: {source}")]
  Encode {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("snapshot {path}: {source}")]
  Snapshot {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("snapshot {path} is corrupt: {source}")]
  CorruptSnapshot {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

#[async_trait]
pub trait Store: Send + Sync {
  /// Open a transaction. Transactions touching the store are serializable.
  async fn begin(&self) -> Result<Box<dyn Tx>, StoreError>;
}

#[async_trait]
pub trait Tx: Send {
  /// Read a key, observing writes staged earlier in the same transaction.
  fn get(&self, key: &str) -> Option<Value>;

  fn set(&mut self, key: &str, value: Value);

  async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn get_json_default<T: DeserializeOwned>(tx: &dyn Tx, key: &str, default: T) -> Result<T, StoreError> {
  match tx.get(key) {
    Some(v) => serde_json::from_value(v).map_err(|source| StoreError::Decode { key: key.to_string(), source }),
    None => Ok(default),
  }
}

pub fn set_json<T: Serialize>(tx: &mut dyn Tx, key: &str, value: &T) -> Result<(), StoreError> {
  let v = serde_json::to_value(value).map_err(|source| StoreError::Encode { key: key.to_string(), source })?;
  tx.set(key, v);
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[tokio::test]
  async fn typed_helpers_default_and_roundtrip_int_keyed_maps() {
    let store = MemoryStore::new();
    let mut tx = store.begin().await.unwrap();

    let empty: Vec<i32> = get_json_default(tx.as_ref(), "ids", Vec::new()).unwrap();
    assert!(empty.is_empty());

    let mut m = BTreeMap::new();
    m.insert(42i32, "x".to_string());
    set_json(tx.as_mut(), "map", &m).unwrap();
    let back: BTreeMap<i32, String> = get_json_default(tx.as_ref(), "map", BTreeMap::new()).unwrap();
    assert_eq!(back, m);
  }

  #[tokio::test]
  async fn decode_error_names_the_key() {
    let store = MemoryStore::new();
    let mut tx = store.begin().await.unwrap();
    tx.set("ids", Value::String("nope".into()));
    let err = get_json_default::<Vec<i32>>(tx.as_ref(), "ids", Vec::new()).unwrap_err();
    assert!(err.to_string().starts_with("decode key ids"));
  }
}
