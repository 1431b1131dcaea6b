// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The append-only audit log.
//!
//! Entries are written under `audit:entry:<seq>` with a head record pointing
//! at the latest one. Appends on a single [`AuditLog`] are serialised by an
//! internal lock; sequence numbers come from the store's atomic counter so a
//! crash between allocation and write leaves a gap that [`AuditLog::verify`]
//! reports.

use std::sync::Arc;

use custody_crypto::encoding::{b64url_decode, b64url_encode};
use custody_crypto::hash::{chain_hash, HASH_SIZE};
use custody_crypto::signing::{sign, verify};
use custody_store::{Clock, RecordStore, SystemClock};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::entry::{decode_hash, entry_key, AuditEntry, AUDIT_ENTRY_VERSION, GENESIS_HASH};
use crate::error::{AuditError, AuditResult};
use crate::event::{AuditAuthority, AuditEvent, AuditOperation};
use crate::keys::{load_active_signer, load_key_ring, provision_signer, ActiveSigner, AuditSigningKey, KeyRing};

const HEAD_KEY: &str = "audit:head";
const SEQ_COUNTER: &str = "audit:seq";

/// A point in the chain: the last sequence number and its chain hash.
///
/// Held outside the store, an anchor lets [`AuditLog::verify_against`]
/// detect truncation that rewrote the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAnchor {
	pub seq_num: u64,
	pub chain_hash: String,
}

impl AuditAnchor {
	fn genesis() -> Self {
		Self {
			seq_num: 0,
			chain_hash: hex::encode(GENESIS_HASH),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainErrorKind {
	MissingEntry,
	Unreadable,
	UnsupportedVersion,
	SequenceMismatch,
	PrevHashMismatch,
	HashMismatch,
	UnknownSigner,
	BadSignature,
	HeadMismatch,
	EntriesBeyondHead,
	Truncated,
	AnchorMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainError {
	pub seq_num: u64,
	pub kind: ChainErrorKind,
	pub detail: String,
}

/// Outcome of a full chain walk. Every problem found is listed, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
	pub valid: bool,
	pub checked_count: u64,
	pub errors: Vec<ChainError>,
}

impl ChainVerification {
	pub fn has(&self, kind: ChainErrorKind) -> bool {
		self.errors.iter().any(|e| e.kind == kind)
	}

	fn push(&mut self, seq_num: u64, kind: ChainErrorKind, detail: impl Into<String>) {
		self.valid = false;
		self.errors.push(ChainError {
			seq_num,
			kind,
			detail: detail.into(),
		});
	}
}

#[derive(Debug)]
pub struct AuditLog {
	records: RecordStore,
	signer: Mutex<Option<ActiveSigner>>,
	clock: Arc<dyn Clock>,
	mirror_to_tracing: bool,
}

impl AuditLog {
	pub fn new(records: RecordStore) -> Self {
		Self {
			records,
			signer: Mutex::new(None),
			clock: Arc::new(SystemClock),
			mirror_to_tracing: true,
		}
	}

	/// Time source for entry timestamps and signing key creation.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Whether appended entries are also emitted on the `custody::audit` tracing target.
	pub fn with_tracing_mirror(mut self, enabled: bool) -> Self {
		self.mirror_to_tracing = enabled;
		self
	}

	/// Create the signing keypair if none exists. Returns the active signing kid.
	#[instrument(skip(self))]
	pub async fn initialize(&self) -> AuditResult<String> {
		let mut slot = self.signer.lock().await;
		let signer = self.active_signer(&mut slot).await?;
		Ok(signer.kid.clone())
	}

	#[instrument(skip(self, event), fields(op = %event.op))]
	pub async fn append(&self, event: AuditEvent) -> AuditResult<AuditEntry> {
		if !event.details.is_object() {
			return Err(AuditError::InvalidEvent("details must be a JSON object".into()));
		}
		let mut slot = self.signer.lock().await;
		let signer = self.active_signer(&mut slot).await?;
		self.append_signed(signer, event).await
	}

	/// Generate a new signing key and record the rotation, signed by the new key.
	///
	/// Retired public keys stay in the key ring, so earlier entries still verify.
	#[instrument(skip(self))]
	pub async fn rotate_signing_key(&self, authority: AuditAuthority) -> AuditResult<AuditEntry> {
		let mut slot = self.signer.lock().await;
		let previous_kid = self.active_signer(&mut slot).await?.kid.clone();

		let signer = provision_signer(&self.records, self.clock.now()).await?;
		info!(previous_kid = %previous_kid, kid = %signer.kid, "rotated audit signing key");
		let signer = slot.insert(signer);

		let event = AuditEvent::builder(AuditOperation::AuditKeyRotated, authority)
			.detail("previousKid", previous_kid)
			.detail("newKid", signer.kid.clone())
			.build();
		self.append_signed(signer, event).await
	}

	/// The current head, or the genesis anchor for an empty log.
	pub async fn anchor(&self) -> AuditResult<AuditAnchor> {
		Ok(self
			.records
			.get::<AuditAnchor>(HEAD_KEY)
			.await?
			.unwrap_or_else(AuditAnchor::genesis))
	}

	/// Entries `offset+1 ..= offset+limit` in sequence order. Gaps are skipped.
	pub async fn entries(&self, offset: u64, limit: u64) -> AuditResult<Vec<AuditEntry>> {
		let head = self.anchor().await?;
		let last = head.seq_num.min(offset.saturating_add(limit));
		let mut entries = Vec::new();
		for seq in offset.saturating_add(1)..=last {
			if let Some(entry) = self.records.get::<AuditEntry>(&entry_key(seq)).await? {
				entries.push(entry);
			}
		}
		Ok(entries)
	}

	/// Every audit verification key, active and retired.
	pub async fn public_keys(&self) -> AuditResult<Vec<AuditSigningKey>> {
		Ok(load_key_ring(&self.records).await?.keys)
	}

	/// Walk the whole chain and report every integrity problem found.
	#[instrument(skip(self))]
	pub async fn verify(&self) -> AuditResult<ChainVerification> {
		let _guard = self.signer.lock().await;
		let head = self.records.get::<AuditAnchor>(HEAD_KEY).await?;
		let ring = load_key_ring(&self.records).await?;
		let head_seq = head.as_ref().map(|h| h.seq_num).unwrap_or(0);

		let mut report = ChainVerification {
			valid: true,
			checked_count: 0,
			errors: Vec::new(),
		};
		// Expected prev hash of the next entry; `None` after an entry that could not be read.
		let mut prev: Option<[u8; HASH_SIZE]> = Some(GENESIS_HASH);
		let mut last_hash: Option<[u8; HASH_SIZE]> = None;

		for seq in 1..=head_seq {
			let entry = match self.read_entry(seq).await? {
				Ok(entry) => entry,
				Err((kind, detail)) => {
					report.push(seq, kind, detail);
					prev = None;
					last_hash = None;
					continue;
				}
			};
			report.checked_count += 1;

			let stored = decode_hash(&entry.chain_hash);
			self.check_entry(seq, &entry, prev, stored, &ring, &mut report);
			// Linking on the stored hash keeps one tampered entry from failing every later link.
			prev = stored;
			last_hash = stored;
		}

		if let Some(head) = &head {
			if head_seq > 0 && last_hash.is_some() && decode_hash(&head.chain_hash) != last_hash {
				report.push(head_seq, ChainErrorKind::HeadMismatch, "head hash differs from last entry");
			}
		}
		if self.records.raw().get(&entry_key(head_seq + 1)).await?.is_some() {
			report.push(
				head_seq + 1,
				ChainErrorKind::EntriesBeyondHead,
				"entry exists past the recorded head",
			);
		}

		if !report.valid {
			warn!(errors = report.errors.len(), checked = report.checked_count, "audit chain verification failed");
		}
		Ok(report)
	}

	/// [`AuditLog::verify`] plus a check that the chain still reaches `anchor`.
	pub async fn verify_against(&self, anchor: &AuditAnchor) -> AuditResult<ChainVerification> {
		let mut report = self.verify().await?;
		let head = self.anchor().await?;

		if anchor.seq_num > head.seq_num {
			report.push(
				anchor.seq_num,
				ChainErrorKind::Truncated,
				format!("log ends at {} but anchor is at {}", head.seq_num, anchor.seq_num),
			);
			return Ok(report);
		}
		if anchor.seq_num == 0 {
			return Ok(report);
		}

		match self.records.get::<AuditEntry>(&entry_key(anchor.seq_num)).await {
			Ok(Some(entry)) if entry.chain_hash == anchor.chain_hash => {}
			Ok(Some(_)) => report.push(
				anchor.seq_num,
				ChainErrorKind::AnchorMismatch,
				"entry at anchor has a different chain hash",
			),
			// Already reported by the chain walk.
			Ok(None) | Err(_) => report.valid = false,
		}
		Ok(report)
	}

	async fn active_signer<'a>(&self, slot: &'a mut Option<ActiveSigner>) -> AuditResult<&'a ActiveSigner> {
		if slot.is_none() {
			let signer = match load_active_signer(&self.records).await? {
				Some(signer) => signer,
				None => {
					let signer = provision_signer(&self.records, self.clock.now()).await?;
					info!(kid = %signer.kid, "provisioned audit signing key");
					signer
				}
			};
			*slot = Some(signer);
		}
		slot.as_ref()
			.ok_or_else(|| AuditError::SigningKeyMissing("signer slot empty after load".into()))
	}

	async fn append_signed(&self, signer: &ActiveSigner, event: AuditEvent) -> AuditResult<AuditEntry> {
		let head = self.anchor().await?;
		let prev_hash = decode_hash(&head.chain_hash)
			.ok_or_else(|| AuditError::Corrupted(format!("head chain hash at {} is malformed", head.seq_num)))?;
		let seq_num = self.records.increment(SEQ_COUNTER).await?;
		if seq_num != head.seq_num + 1 {
			warn!(seq_num, head = head.seq_num, "audit sequence skipped past head");
		}

		let duration_ms = match (event.unlock_time, event.lock_time) {
			(Some(unlock), Some(lock)) => Some((lock - unlock).num_milliseconds()),
			_ => None,
		};
		let mut entry = AuditEntry {
			kms_version: AUDIT_ENTRY_VERSION,
			seq_num,
			timestamp: self.clock.now(),
			op: event.op,
			authority: event.authority,
			kid: event.kid,
			lease_id: event.lease_id,
			request_id: event.request_id,
			unlock_time: event.unlock_time,
			lock_time: event.lock_time,
			duration_ms,
			details: event.details,
			prev_hash: hex::encode(prev_hash),
			chain_hash: String::new(),
			signing_kid: signer.kid.clone(),
			signature: String::new(),
		};

		let hash = chain_hash(&entry.canonical_bytes(), &prev_hash);
		entry.chain_hash = hex::encode(hash);
		entry.signature = b64url_encode(sign(&signer.key, &hash));

		self.records.put(&entry_key(seq_num), &entry).await?;
		self.records
			.put(
				HEAD_KEY,
				&AuditAnchor {
					seq_num,
					chain_hash: entry.chain_hash.clone(),
				},
			)
			.await?;

		if self.mirror_to_tracing {
			info!(
				target: "custody::audit",
				seq_num,
				op = %entry.op,
				authority = %entry.authority,
				kid = ?entry.kid,
				lease_id = ?entry.lease_id,
				duration_ms = ?entry.duration_ms,
				"audit entry appended"
			);
		}
		Ok(entry)
	}

	async fn read_entry(&self, seq: u64) -> AuditResult<Result<AuditEntry, (ChainErrorKind, String)>> {
		let Some(bytes) = self.records.raw().get(&entry_key(seq)).await? else {
			return Ok(Err((ChainErrorKind::MissingEntry, "entry not found".into())));
		};
		Ok(serde_json::from_slice::<AuditEntry>(&bytes)
			.map_err(|e| (ChainErrorKind::Unreadable, e.to_string())))
	}

	fn check_entry(
		&self,
		seq: u64,
		entry: &AuditEntry,
		prev: Option<[u8; HASH_SIZE]>,
		stored: Option<[u8; HASH_SIZE]>,
		ring: &KeyRing,
		report: &mut ChainVerification,
	) {
		if entry.kms_version != AUDIT_ENTRY_VERSION {
			report.push(
				seq,
				ChainErrorKind::UnsupportedVersion,
				format!("version {}", entry.kms_version),
			);
			return;
		}
		if entry.seq_num != seq {
			report.push(
				seq,
				ChainErrorKind::SequenceMismatch,
				format!("stored at {seq} but claims {}", entry.seq_num),
			);
		}
		if let Some(expected) = prev {
			if decode_hash(&entry.prev_hash) != Some(expected) {
				report.push(seq, ChainErrorKind::PrevHashMismatch, "prevHash does not link to previous entry");
			}
		}

		let Some(stored) = stored else {
			report.push(seq, ChainErrorKind::HashMismatch, "chainHash is malformed");
			return;
		};
		if entry.recompute_chain_hash() != Some(stored) {
			report.push(seq, ChainErrorKind::HashMismatch, "chainHash does not match contents");
		}

		let Some(key) = ring.find(&entry.signing_kid) else {
			report.push(
				seq,
				ChainErrorKind::UnknownSigner,
				format!("signing key {} not in key ring", entry.signing_kid),
			);
			return;
		};
		let signature_ok = match (key.verifying_key(), b64url_decode(&entry.signature)) {
			(Ok(vk), Ok(signature)) => verify(&vk, &stored, &signature).is_ok(),
			_ => false,
		};
		if !signature_ok {
			report.push(seq, ChainErrorKind::BadSignature, "signature does not verify");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{DateTime, Utc};
	use custody_store::{ManualClock, MemoryStore};

	fn log() -> AuditLog {
		AuditLog::new(RecordStore::new(Arc::new(MemoryStore::new()))).with_tracing_mirror(false)
	}

	fn event(op: AuditOperation) -> AuditEvent {
		AuditEvent::builder(op, AuditAuthority::owner("passphrase")).build()
	}

	#[tokio::test]
	async fn initialize_is_idempotent() {
		let log = log();
		let a = log.initialize().await.unwrap();
		let b = log.initialize().await.unwrap();
		assert_eq!(a, b);
		assert_eq!(log.public_keys().await.unwrap().len(), 1);
		assert_eq!(log.anchor().await.unwrap().seq_num, 0);
	}

	#[tokio::test]
	async fn first_entry_links_to_genesis() {
		let log = log();
		let entry = log.append(event(AuditOperation::Setup)).await.unwrap();
		assert_eq!(entry.seq_num, 1);
		assert_eq!(entry.prev_hash, hex::encode(GENESIS_HASH));
		assert_eq!(entry.recompute_chain_hash().map(hex::encode), Some(entry.chain_hash.clone()));
	}

	#[tokio::test]
	async fn duration_is_lock_minus_unlock() {
		let log = log();
		let unlock = Utc::now();
		let lock = unlock + chrono::Duration::milliseconds(42);
		let entry = log
			.append(
				AuditEvent::builder(AuditOperation::Unlock, AuditAuthority::owner("passphrase"))
					.unlock_window(unlock, lock)
					.build(),
			)
			.await
			.unwrap();
		assert_eq!(entry.duration_ms, Some(42));
	}

	#[tokio::test]
	async fn timestamps_follow_the_injected_clock() {
		let start = DateTime::parse_from_rfc3339("2030-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
		let clock = Arc::new(ManualClock::new(start));
		let log = log().with_clock(clock.clone());

		let entry = log.append(event(AuditOperation::Setup)).await.unwrap();
		assert_eq!(entry.timestamp, start);

		clock.advance(chrono::Duration::hours(1));
		let rotated = log.rotate_signing_key(AuditAuthority::owner("passphrase")).await.unwrap();
		assert_eq!(rotated.timestamp, start + chrono::Duration::hours(1));

		let keys = log.public_keys().await.unwrap();
		assert_eq!(keys[0].created_at, start);
		assert_eq!(keys[0].retired_at, Some(start + chrono::Duration::hours(1)));
		assert_eq!(keys[1].created_at, start + chrono::Duration::hours(1));
		assert!(log.verify().await.unwrap().valid);
	}

	#[tokio::test]
	async fn non_object_details_are_rejected() {
		let log = log();
		let mut event = event(AuditOperation::Sign);
		event.details = serde_json::json!([1, 2]);
		assert!(matches!(log.append(event).await, Err(AuditError::InvalidEvent(_))));
	}

	#[tokio::test]
	async fn empty_log_verifies() {
		let report = log().verify().await.unwrap();
		assert!(report.valid);
		assert_eq!(report.checked_count, 0);
	}

	#[tokio::test]
	async fn entries_pages_in_order() {
		let log = log();
		for _ in 0..5 {
			log.append(event(AuditOperation::TokenIssued)).await.unwrap();
		}
		let page: Vec<u64> = log.entries(1, 3).await.unwrap().iter().map(|e| e.seq_num).collect();
		assert_eq!(page, vec![2, 3, 4]);
		assert_eq!(log.entries(4, 10).await.unwrap().len(), 1);
		assert!(log.entries(5, 10).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn signer_survives_new_log_instance() {
		let records = RecordStore::new(Arc::new(MemoryStore::new()));
		let first = AuditLog::new(records.clone()).with_tracing_mirror(false);
		let kid = first.initialize().await.unwrap();
		first.append(event(AuditOperation::Setup)).await.unwrap();

		let second = AuditLog::new(records).with_tracing_mirror(false);
		let entry = second.append(event(AuditOperation::Unlock)).await.unwrap();
		assert_eq!(entry.signing_kid, kid);
		assert_eq!(entry.seq_num, 2);
		assert!(second.verify().await.unwrap().valid);
	}
}
