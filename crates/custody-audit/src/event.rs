// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operation descriptors handed to [`crate::AuditLog::append`].
//!
//! - [`AuditOperation`]: every privileged operation the core records
//! - [`AuditAuthority`]: who authorised it (owner credentials, a lease, or the system)
//! - [`AuditEventBuilder`]: fluent construction of an [`AuditEvent`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
	// Enrollment
	Setup,
	EnrollmentAdded,
	EnrollmentRemoved,
	Unlock,

	// Application keys
	KeyGenerated,
	Sign,

	// Leases
	LeaseCreated,
	LeaseExtended,
	LeaseRevoked,
	TokenIssued,
	TokenBatchIssued,

	// Audit log maintenance
	AuditKeyRotated,
}

impl AuditOperation {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditOperation::Setup => "setup",
			AuditOperation::EnrollmentAdded => "enrollment_added",
			AuditOperation::EnrollmentRemoved => "enrollment_removed",
			AuditOperation::Unlock => "unlock",
			AuditOperation::KeyGenerated => "key_generated",
			AuditOperation::Sign => "sign",
			AuditOperation::LeaseCreated => "lease_created",
			AuditOperation::LeaseExtended => "lease_extended",
			AuditOperation::LeaseRevoked => "lease_revoked",
			AuditOperation::TokenIssued => "token_issued",
			AuditOperation::TokenBatchIssued => "token_batch_issued",
			AuditOperation::AuditKeyRotated => "audit_key_rotated",
		}
	}
}

impl fmt::Display for AuditOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Authority under which an operation ran.
///
/// `Lease` marks delegated issuance, distinct from operations that presented
/// owner credentials in the same call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAuthority {
	Owner { method: String },
	Lease { lease_id: String },
	System,
}

impl AuditAuthority {
	pub fn owner(method: impl Into<String>) -> Self {
		AuditAuthority::Owner {
			method: method.into(),
		}
	}

	pub fn lease(lease_id: impl Into<String>) -> Self {
		AuditAuthority::Lease {
			lease_id: lease_id.into(),
		}
	}

	pub fn is_delegated(&self) -> bool {
		matches!(self, AuditAuthority::Lease { .. })
	}
}

impl fmt::Display for AuditAuthority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuditAuthority::Owner { method } => write!(f, "owner:{method}"),
			AuditAuthority::Lease { lease_id } => write!(f, "lease:{lease_id}"),
			AuditAuthority::System => f.write_str("system"),
		}
	}
}

/// Everything about an operation except its position in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
	pub op: AuditOperation,
	pub authority: AuditAuthority,
	pub kid: Option<String>,
	pub lease_id: Option<String>,
	pub request_id: Option<String>,
	pub unlock_time: Option<DateTime<Utc>>,
	pub lock_time: Option<DateTime<Utc>>,
	/// Must be a JSON object and never carry secret material.
	pub details: serde_json::Value,
}

impl AuditEvent {
	pub fn builder(op: AuditOperation, authority: AuditAuthority) -> AuditEventBuilder {
		AuditEventBuilder::new(op, authority)
	}
}

pub struct AuditEventBuilder {
	event: AuditEvent,
}

impl AuditEventBuilder {
	pub fn new(op: AuditOperation, authority: AuditAuthority) -> Self {
		Self {
			event: AuditEvent {
				op,
				authority,
				kid: None,
				lease_id: None,
				request_id: None,
				unlock_time: None,
				lock_time: None,
				details: serde_json::Value::Object(serde_json::Map::new()),
			},
		}
	}

	/// The application key the operation touched.
	pub fn kid(mut self, kid: impl Into<String>) -> Self {
		self.event.kid = Some(kid.into());
		self
	}

	pub fn lease(mut self, lease_id: impl Into<String>) -> Self {
		self.event.lease_id = Some(lease_id.into());
		self
	}

	pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
		self.event.request_id = Some(request_id.into());
		self
	}

	/// Timing of the unlock scope the operation ran in.
	pub fn unlock_window(mut self, unlock_time: DateTime<Utc>, lock_time: DateTime<Utc>) -> Self {
		self.event.unlock_time = Some(unlock_time);
		self.event.lock_time = Some(lock_time);
		self
	}

	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		if let serde_json::Value::Object(map) = &mut self.event.details {
			map.insert(key.to_string(), value.into());
		}
		self
	}

	pub fn build(self) -> AuditEvent {
		self.event
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn operation_display_matches_serde() {
		for op in [
			AuditOperation::Setup,
			AuditOperation::LeaseCreated,
			AuditOperation::TokenBatchIssued,
			AuditOperation::AuditKeyRotated,
		] {
			let json = serde_json::to_string(&op).unwrap();
			assert_eq!(json, format!("\"{op}\""));
		}
	}

	#[test]
	fn authority_display() {
		assert_eq!(AuditAuthority::owner("passphrase").to_string(), "owner:passphrase");
		assert_eq!(AuditAuthority::lease("l-1").to_string(), "lease:l-1");
		assert_eq!(AuditAuthority::System.to_string(), "system");
		assert!(AuditAuthority::lease("l-1").is_delegated());
		assert!(!AuditAuthority::owner("passkey-prf").is_delegated());
	}

	#[test]
	fn builder_collects_details() {
		let now = Utc::now();
		let event = AuditEvent::builder(AuditOperation::KeyGenerated, AuditAuthority::owner("passphrase"))
			.kid("kid-1")
			.unlock_window(now, now)
			.detail("purpose", "signing")
			.detail("count", 3)
			.build();

		assert_eq!(event.kid.as_deref(), Some("kid-1"));
		assert_eq!(event.details["purpose"], "signing");
		assert_eq!(event.details["count"], 3);
		assert_eq!(event.unlock_time, Some(now));
	}
}
