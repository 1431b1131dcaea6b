// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Serialization error for {key}: {source}")]
	Serialization {
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Counter overflow: {0}")]
	CounterOverflow(String),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
