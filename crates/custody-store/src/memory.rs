// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory store for tests and ephemeral instances.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::SecretStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Vec<u8>>>,
	counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored keys.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	/// Copy of every stored entry, sorted by key.
	pub async fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
		self.entries
			.read()
			.await
			.iter()
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}
}

#[async_trait]
impl SecretStore for MemoryStore {
	async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
		Ok(self.entries.read().await.get(key).cloned())
	}

	async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
		self
			.entries
			.write()
			.await
			.insert(key.to_string(), value.to_vec());
		Ok(())
	}

	async fn delete(&self, key: &str) -> StoreResult<()> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn atomic_increment(&self, counter: &str) -> StoreResult<u64> {
		let mut counters = self.counters.lock().await;
		let value = counters.entry(counter.to_string()).or_insert(0);
		*value = value
			.checked_add(1)
			.ok_or_else(|| StoreError::CounterOverflow(counter.to_string()))?;
		Ok(*value)
	}
}
