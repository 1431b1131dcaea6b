// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use custody_crypto::CryptoError;
use custody_store::StoreError;
use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("unsupported {record} version {version}")]
	UnsupportedVersion { record: &'static str, version: u32 },

	#[error("audit signing key missing: {0}")]
	SigningKeyMissing(String),

	#[error("invalid audit event: {0}")]
	InvalidEvent(String),

	#[error("audit log corrupted: {0}")]
	Corrupted(String),
}

impl AuditError {
	/// Whether this error indicates a storage or integrity fault rather than bad input.
	pub fn is_internal(&self) -> bool {
		!matches!(self, AuditError::InvalidEvent(_))
	}
}
