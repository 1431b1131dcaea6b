// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite engine for [`SecretStore`].

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};
use crate::SecretStore;

#[derive(Debug, Clone)]
pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create the `kv` and `counters` tables if they do not exist.
	#[instrument(skip(self))]
	pub async fn migrate(&self) -> StoreResult<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS kv (
				key TEXT PRIMARY KEY,
				value BLOB NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS counters (
				name TEXT PRIMARY KEY,
				value INTEGER NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		debug!("store schema ready");
		Ok(())
	}
}

#[async_trait]
impl SecretStore for SqliteStore {
	#[instrument(skip(self))]
	async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
		let value: Option<Vec<u8>> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
			.bind(key)
			.fetch_optional(&self.pool)
			.await?;
		Ok(value)
	}

	#[instrument(skip(self, value), fields(len = value.len()))]
	async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
		sqlx::query(
			r#"
			INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn delete(&self, key: &str) -> StoreResult<()> {
		sqlx::query("DELETE FROM kv WHERE key = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn atomic_increment(&self, counter: &str) -> StoreResult<u64> {
		let value: i64 = sqlx::query_scalar(
			r#"
			INSERT INTO counters (name, value) VALUES (?, 1)
			ON CONFLICT(name) DO UPDATE SET value = value + 1
			RETURNING value
			"#,
		)
		.bind(counter)
		.fetch_one(&self.pool)
		.await?;

		u64::try_from(value).map_err(|_| StoreError::CounterOverflow(counter.to_string()))
	}
}
