// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the custody core.

use custody_audit::AuditError;
use custody_crypto::CryptoError;
use custody_store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for custody operations.
pub type KmsResult<T> = Result<T, KmsError>;

/// Which lease quota refused an issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
	TokensPerHour,
	SendsPerMinute,
	EndpointSendsPerMinute,
}

impl QuotaKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			QuotaKind::TokensPerHour => "tokens_per_hour",
			QuotaKind::SendsPerMinute => "sends_per_minute",
			QuotaKind::EndpointSendsPerMinute => "endpoint_sends_per_minute",
		}
	}
}

impl fmt::Display for QuotaKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum KmsError {
	// =========================================================================
	// Enrollment and credentials
	// =========================================================================
	#[error("no enrollment is configured")]
	NotConfigured,

	#[error("already initialized")]
	AlreadyInitialized,

	/// Wrong credential, unknown method, KCV, AAD or tag failure. Never more specific.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("cannot remove the last enrollment")]
	LastEnrollment,

	// =========================================================================
	// Keys
	// =========================================================================
	#[error("key not found: {0}")]
	KeyNotFound(String),

	// =========================================================================
	// Leases
	// =========================================================================
	#[error("lease not found: {0}")]
	LeaseNotFound(String),

	#[error("lease has expired")]
	LeaseExpired,

	#[error("lease key is stale: the application key was regenerated")]
	LeaseKeyStale,

	#[error("lease has been revoked")]
	LeaseRevoked,

	#[error("quota exceeded: {0}")]
	QuotaExceeded(QuotaKind),

	#[error("endpoint not authorized for lease: {0}")]
	EndpointNotAuthorized(String),

	#[error("invalid token: {0}")]
	InvalidToken(String),

	// =========================================================================
	// Audit
	// =========================================================================
	#[error("audit chain integrity violation at entry {index}: {reason}")]
	ChainIntegrityViolation { index: u64, reason: String },

	// =========================================================================
	// Records and requests
	// =========================================================================
	#[error("unsupported {record} version {version}")]
	UnsupportedVersion { record: &'static str, version: u32 },

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	// =========================================================================
	// Infrastructure
	// =========================================================================
	#[error("crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("audit error: {0}")]
	Audit(AuditError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<AuditError> for KmsError {
	fn from(err: AuditError) -> Self {
		match err {
			AuditError::Store(e) => KmsError::Store(e),
			AuditError::UnsupportedVersion { record, version } => KmsError::UnsupportedVersion { record, version },
			other => KmsError::Audit(other),
		}
	}
}

impl From<tokio::task::JoinError> for KmsError {
	fn from(err: tokio::task::JoinError) -> Self {
		KmsError::Internal(format!("blocking task failed: {err}"))
	}
}

impl KmsError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			KmsError::Crypto(_)
				| KmsError::Store(_)
				| KmsError::Audit(_)
				| KmsError::Internal(_)
				| KmsError::ChainIntegrityViolation { .. }
		)
	}

	/// Stable machine-readable code for the transport layer.
	pub fn code(&self) -> &'static str {
		match self {
			KmsError::NotConfigured => "not_configured",
			KmsError::AlreadyInitialized => "already_initialized",
			KmsError::InvalidCredentials => "invalid_credentials",
			KmsError::LastEnrollment => "last_enrollment",
			KmsError::KeyNotFound(_) => "key_not_found",
			KmsError::LeaseNotFound(_) => "lease_not_found",
			KmsError::LeaseExpired => "lease_expired",
			KmsError::LeaseKeyStale => "lease_key_stale",
			KmsError::LeaseRevoked => "lease_revoked",
			KmsError::QuotaExceeded(_) => "quota_exceeded",
			KmsError::EndpointNotAuthorized(_) => "endpoint_not_authorized",
			KmsError::InvalidToken(_) => "invalid_token",
			KmsError::ChainIntegrityViolation { .. } => "chain_integrity_violation",
			KmsError::UnsupportedVersion { .. } => "unsupported_version",
			KmsError::InvalidRequest(_) => "invalid_request",
			KmsError::Crypto(_) | KmsError::Store(_) | KmsError::Audit(_) | KmsError::Internal(_) => "internal",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credential_errors_are_generic() {
		assert_eq!(KmsError::InvalidCredentials.to_string(), "invalid credentials");
		assert!(!KmsError::InvalidCredentials.is_internal());
	}

	#[test]
	fn quota_code_names_the_quota() {
		let err = KmsError::QuotaExceeded(QuotaKind::EndpointSendsPerMinute);
		assert_eq!(err.code(), "quota_exceeded");
		assert_eq!(err.to_string(), "quota exceeded: endpoint_sends_per_minute");
	}

	#[test]
	fn audit_store_errors_unwrap_to_store() {
		let err: KmsError = AuditError::Store(StoreError::Internal("disk".into())).into();
		assert!(matches!(err, KmsError::Store(_)));
		assert!(err.is_internal());
	}

	#[test]
	fn infrastructure_errors_share_internal_code() {
		assert_eq!(KmsError::Crypto(CryptoError::Decryption).code(), "internal");
		assert_eq!(KmsError::Internal("x".into()).code(), "internal");
	}
}
