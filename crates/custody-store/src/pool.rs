// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

use crate::error::StoreError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// In-memory databases are pinned to a single long-lived connection; every
/// connection to `:memory:` opens its own empty database.
///
/// # Errors
/// Returns `StoreError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
	let in_memory = database_url.contains(":memory:");
	let mut options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StoreError::Internal(format!("Invalid database URL: {e}")))?
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);
	if !in_memory {
		options = options.journal_mode(SqliteJournalMode::Wal);
	}

	let pool_options = if in_memory {
		SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
	} else {
		SqlitePoolOptions::new()
	};
	let pool = pool_options.connect_with(options).await?;

	tracing::debug!(in_memory, "database pool created");
	Ok(pool)
}
