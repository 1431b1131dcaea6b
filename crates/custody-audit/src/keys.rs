// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit signing keys.
//!
//! Public halves are kept forever in a key ring so old entries stay
//! verifiable after rotation. The private half of the active key is read only
//! by [`crate::AuditLog`] and never returned from it.

use chrono::{DateTime, Utc};
use custody_crypto::encoding::b64;
use custody_crypto::signing::{
	generate_signing_key, jwk_thumbprint, signing_key_from_seed, signing_key_seed,
	verifying_key_from_bytes,
};
use custody_store::RecordStore;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{AuditError, AuditResult};

pub(crate) const KEY_RING_KEY: &str = "audit:keys";
pub(crate) const ACTIVE_SIGNER_KEY: &str = "audit:signer";

/// Public record of an audit signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSigningKey {
	pub kid: String,
	#[serde(with = "b64")]
	pub public_key: Vec<u8>,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub retired_at: Option<DateTime<Utc>>,
}

impl AuditSigningKey {
	pub fn verifying_key(&self) -> AuditResult<VerifyingKey> {
		Ok(verifying_key_from_bytes(&self.public_key)?)
	}
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct KeyRing {
	pub keys: Vec<AuditSigningKey>,
}

impl KeyRing {
	pub fn find(&self, kid: &str) -> Option<&AuditSigningKey> {
		self.keys.iter().find(|k| k.kid == kid)
	}
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignerRecord {
	kid: String,
	#[serde(with = "b64")]
	seed: Vec<u8>,
}

impl Drop for SignerRecord {
	fn drop(&mut self) {
		self.seed.zeroize();
	}
}

/// The active signing key, held only inside the audit log.
pub(crate) struct ActiveSigner {
	pub kid: String,
	pub key: SigningKey,
}

impl std::fmt::Debug for ActiveSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ActiveSigner")
			.field("kid", &self.kid)
			.field("key", &"[REDACTED]")
			.finish()
	}
}

pub(crate) async fn load_key_ring(records: &RecordStore) -> AuditResult<KeyRing> {
	Ok(records.get::<KeyRing>(KEY_RING_KEY).await?.unwrap_or_default())
}

pub(crate) async fn load_active_signer(records: &RecordStore) -> AuditResult<Option<ActiveSigner>> {
	let Some(record) = records.get::<SignerRecord>(ACTIVE_SIGNER_KEY).await? else {
		return Ok(None);
	};
	let key = signing_key_from_seed(&record.seed)?;
	if jwk_thumbprint(&key.verifying_key()) != record.kid {
		return Err(AuditError::SigningKeyMissing(format!(
			"signer record {} does not match its key",
			record.kid
		)));
	}
	Ok(Some(ActiveSigner {
		kid: record.kid.clone(),
		key,
	}))
}

/// Generate a key, add it to the ring (retiring the previous one) and make it active.
pub(crate) async fn provision_signer(records: &RecordStore, now: DateTime<Utc>) -> AuditResult<ActiveSigner> {
	let key = generate_signing_key();
	let verifying_key = key.verifying_key();
	let kid = jwk_thumbprint(&verifying_key);

	let mut ring = load_key_ring(records).await?;
	for existing in ring.keys.iter_mut().filter(|k| k.retired_at.is_none()) {
		existing.retired_at = Some(now);
	}
	ring.keys.push(AuditSigningKey {
		kid: kid.clone(),
		public_key: verifying_key.to_bytes().to_vec(),
		created_at: now,
		retired_at: None,
	});

	// Public key first: a signer without a ring entry would produce unverifiable entries.
	records.put(KEY_RING_KEY, &ring).await?;
	let seed = signing_key_seed(&key);
	records
		.put(
			ACTIVE_SIGNER_KEY,
			&SignerRecord {
				kid: kid.clone(),
				seed: seed.to_vec(),
			},
		)
		.await?;

	Ok(ActiveSigner { kid, key })
}
