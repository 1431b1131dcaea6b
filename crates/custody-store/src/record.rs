// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed JSON records over a [`SecretStore`].

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::SecretStore;

#[derive(Debug, Clone)]
pub struct RecordStore {
	inner: Arc<dyn SecretStore>,
}

impl RecordStore {
	pub fn new(inner: Arc<dyn SecretStore>) -> Self {
		Self { inner }
	}

	/// The underlying byte store.
	pub fn raw(&self) -> &Arc<dyn SecretStore> {
		&self.inner
	}

	pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
		match self.inner.get(key).await? {
			Some(bytes) => serde_json::from_slice(&bytes)
				.map(Some)
				.map_err(|source| StoreError::Serialization {
					key: key.to_string(),
					source,
				}),
			None => Ok(None),
		}
	}

	pub async fn put<T: Serialize>(&self, key: &str, record: &T) -> StoreResult<()> {
		let bytes = serde_json::to_vec(record).map_err(|source| StoreError::Serialization {
			key: key.to_string(),
			source,
		})?;
		self.inner.put(key, &bytes).await
	}

	pub async fn delete(&self, key: &str) -> StoreResult<()> {
		self.inner.delete(key).await
	}

	pub async fn increment(&self, counter: &str) -> StoreResult<u64> {
		self.inner.atomic_increment(counter).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MemoryStore;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Head {
		seq_num: u64,
		chain_hash: String,
	}

	#[tokio::test]
	async fn records_roundtrip_as_json() {
		let store = RecordStore::new(Arc::new(MemoryStore::new()));
		let head = Head {
			seq_num: 3,
			chain_hash: "ab".into(),
		};
		store.put("audit:head", &head).await.unwrap();
		assert_eq!(store.get::<Head>("audit:head").await.unwrap(), Some(head));

		let raw = store.raw().get("audit:head").await.unwrap().unwrap();
		assert_eq!(raw, br#"{"seq_num":3,"chain_hash":"ab"}"#);
	}

	#[tokio::test]
	async fn corrupt_record_reports_key() {
		let store = RecordStore::new(Arc::new(MemoryStore::new()));
		store.raw().put("audit:head", b"not json").await.unwrap();
		let err = store.get::<Head>("audit:head").await.unwrap_err();
		assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "audit:head"));
	}
}
