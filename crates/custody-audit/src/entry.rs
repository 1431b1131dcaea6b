// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted audit entries and their canonical encoding.

use chrono::{DateTime, Utc};
use custody_crypto::hash::{chain_hash, HASH_SIZE};
use custody_crypto::CanonicalEncoder;
use serde::{Deserialize, Serialize};

use crate::event::{AuditAuthority, AuditOperation};

/// Record format version for audit entries.
pub const AUDIT_ENTRY_VERSION: u32 = 2;

/// `prevHash` of the first entry.
pub const GENESIS_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];

const ENTRY_DOMAIN: &str = "custody/audit-entry";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
	pub kms_version: u32,
	pub seq_num: u64,
	pub timestamp: DateTime<Utc>,
	pub op: AuditOperation,
	pub authority: AuditAuthority,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lease_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unlock_time: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lock_time: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<i64>,
	pub details: serde_json::Value,
	/// Hex SHA-256 of the previous entry, or of [`GENESIS_HASH`].
	pub prev_hash: String,
	/// Hex `SHA-256(canonical || prev_hash)`.
	pub chain_hash: String,
	/// Key id of the audit signing key.
	pub signing_kid: String,
	/// Base64url Ed25519 signature over the raw chain hash bytes.
	pub signature: String,
}

impl AuditEntry {
	/// Deterministic bytes covering every field except the hash links and signature.
	///
	/// `details` is serialised through `serde_json::Value`, whose object map
	/// is key-sorted, so the same logical details always encode identically.
	pub fn canonical_bytes(&self) -> Vec<u8> {
		let details = serde_json::to_string(&self.details).unwrap_or_default();
		CanonicalEncoder::new(ENTRY_DOMAIN)
			.u64("kmsVersion", u64::from(self.kms_version))
			.u64("seqNum", self.seq_num)
			.i64("timestamp", self.timestamp.timestamp_millis())
			.str("op", self.op.as_str())
			.str("authority", &self.authority.to_string())
			.opt_str("kid", self.kid.as_deref())
			.opt_str("leaseId", self.lease_id.as_deref())
			.opt_str("requestId", self.request_id.as_deref())
			.opt_i64("unlockTime", self.unlock_time.map(|t| t.timestamp_millis()))
			.opt_i64("lockTime", self.lock_time.map(|t| t.timestamp_millis()))
			.opt_i64("durationMs", self.duration_ms)
			.str("details", &details)
			.str("signingKid", &self.signing_kid)
			.finish()
	}

	/// Recompute the chain hash from this entry's fields and stored `prev_hash`.
	///
	/// Returns `None` when `prev_hash` is not a valid 32-byte hex string.
	pub fn recompute_chain_hash(&self) -> Option<[u8; HASH_SIZE]> {
		let prev = decode_hash(&self.prev_hash)?;
		Some(chain_hash(&self.canonical_bytes(), &prev))
	}
}

pub fn decode_hash(value: &str) -> Option<[u8; HASH_SIZE]> {
	hex::decode(value).ok()?.try_into().ok()
}

/// Store key for the entry with sequence number `seq_num`.
pub fn entry_key(seq_num: u64) -> String {
	format!("audit:entry:{seq_num:020}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn entry() -> AuditEntry {
		AuditEntry {
			kms_version: AUDIT_ENTRY_VERSION,
			seq_num: 1,
			timestamp: Utc::now(),
			op: AuditOperation::Setup,
			authority: AuditAuthority::owner("passphrase"),
			kid: None,
			lease_id: None,
			request_id: None,
			unlock_time: None,
			lock_time: None,
			duration_ms: None,
			details: serde_json::json!({"b": 1, "a": 2}),
			prev_hash: hex::encode(GENESIS_HASH),
			chain_hash: String::new(),
			signing_kid: "audit-kid".into(),
			signature: String::new(),
		}
	}

	#[test]
	fn canonical_bytes_ignore_hash_and_signature_fields() {
		let a = entry();
		let mut b = a.clone();
		b.chain_hash = "ff".into();
		b.signature = "sig".into();
		assert_eq!(a.canonical_bytes(), b.canonical_bytes());
	}

	#[test]
	fn canonical_bytes_cover_operation() {
		let a = entry();
		let mut b = a.clone();
		b.op = AuditOperation::Unlock;
		assert_ne!(a.canonical_bytes(), b.canonical_bytes());
	}

	#[test]
	fn canonical_bytes_survive_json_roundtrip() {
		let a = entry();
		let json = serde_json::to_vec(&a).unwrap();
		let b: AuditEntry = serde_json::from_slice(&json).unwrap();
		assert_eq!(a.canonical_bytes(), b.canonical_bytes());
	}

	#[test]
	fn recompute_rejects_malformed_prev_hash() {
		let mut a = entry();
		a.prev_hash = "xyz".into();
		assert!(a.recompute_chain_hash().is_none());
	}

	#[test]
	fn entry_keys_sort_by_sequence() {
		assert!(entry_key(9) < entry_key(10));
		assert_eq!(entry_key(1), "audit:entry:00000000000000000001");
	}

	proptest! {
		#[test]
		fn detail_insertion_order_does_not_matter(a in any::<i64>(), b in ".{0,16}") {
			let mut forward = serde_json::Map::new();
			forward.insert("count".into(), a.into());
			forward.insert("endpoint".into(), b.clone().into());
			let mut reverse = serde_json::Map::new();
			reverse.insert("endpoint".into(), b.into());
			reverse.insert("count".into(), a.into());

			let mut x = entry();
			x.details = forward.into();
			let mut y = x.clone();
			y.details = reverse.into();
			prop_assert_eq!(x.recompute_chain_hash(), y.recompute_chain_hash());
		}

		#[test]
		fn changed_details_change_the_chain_hash(a in any::<i64>(), b in any::<i64>()) {
			prop_assume!(a != b);
			let mut x = entry();
			x.details = serde_json::json!({ "count": a });
			let mut y = x.clone();
			y.details = serde_json::json!({ "count": b });
			prop_assert_ne!(x.recompute_chain_hash(), y.recompute_chain_hash());
		}
	}
}
