// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret store adapter.
//!
//! The custody core only needs per-key get/put/delete and an atomic counter.
//! [`SecretStore`] is that contract; [`MemoryStore`] and [`SqliteStore`] are
//! the two engines shipped here, and [`RecordStore`] layers JSON records on top.

pub mod clock;
pub mod error;
pub mod memory;
pub mod pool;
pub mod record;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pool::create_pool;
pub use record::RecordStore;
pub use sqlite::SqliteStore;

/// Storage contract consumed by the custody core.
///
/// No transactional guarantees are assumed beyond per-key atomicity and
/// [`SecretStore::atomic_increment`].
#[async_trait]
pub trait SecretStore: Send + Sync + std::fmt::Debug {
	async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

	async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

	/// Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> StoreResult<()>;

	/// Increment `counter` and return the new value. The first call returns 1.
	async fn atomic_increment(&self, counter: &str) -> StoreResult<u64>;
}

/// Open a store from a URL: `memory` for an ephemeral store, otherwise a SQLite URL.
pub async fn open_store(url: &str) -> StoreResult<Arc<dyn SecretStore>> {
	if url == "memory" {
		return Ok(Arc::new(MemoryStore::new()));
	}
	let pool = create_pool(url).await?;
	let store = SqliteStore::new(pool);
	store.migrate().await?;
	Ok(Arc::new(store))
}
