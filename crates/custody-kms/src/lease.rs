// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leases: one authenticated unlock converted into bounded, delegated issuance.
//!
//! Creating a lease unwraps an application key under the MKEK and re-wraps it
//! under a fresh session key stored in the lease record. Later issuances open
//! the key with that session key, so they need no credentials. Issuance checks
//! revocation first, then expiry, key currency and endpoint scope, and reserves
//! [`QuotaState`] last.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use custody_audit::{AuditAuthority, AuditEvent, AuditLog, AuditOperation};
use custody_config::LeaseConfig;
use custody_crypto::aead::generate_key;
use custody_crypto::encoding::b64;
use custody_crypto::{CanonicalEncoder, CryptoError, Sealed, KEY_SIZE};
use custody_store::RecordStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::error::{KmsError, KmsResult};
use crate::master::MasterSecretManager;
use crate::quota::{QuotaSnapshot, QuotaState};
use crate::token::{timestamp, SignedToken, TokenClaims};
use crate::types::{LeaseId, TokenId, DEFAULT_PURPOSE, KMS_VERSION};
use crate::wrapping::{ApplicationKey, WrappingService};

const LEASE_AAD_DOMAIN: &str = "custody/lease-key";
const LEASE_INDEX_KEY: &str = "kms:leases";

fn lease_key(id: LeaseId) -> String {
	format!("kms:lease:{id}")
}

fn quota_key(id: LeaseId) -> String {
	format!("kms:lease-quota:{id}")
}

fn lease_aad(id: LeaseId, user_id: &str, kid: &str) -> Vec<u8> {
	CanonicalEncoder::new(LEASE_AAD_DOMAIN)
		.u64("kmsVersion", u64::from(KMS_VERSION))
		.str("leaseId", &id.to_string())
		.str("userId", user_id)
		.str("kid", kid)
		.finish()
}

// =============================================================================
// Records
// =============================================================================

mod session_key_b64 {
	use custody_crypto::encoding::b64_array;
	use custody_crypto::KEY_SIZE;
	use serde::{Deserializer, Serializer};
	use zeroize::Zeroizing;

	pub fn serialize<S>(key: &Zeroizing<[u8; KEY_SIZE]>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		b64_array::serialize(&**key, serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Zeroizing<[u8; KEY_SIZE]>, D::Error>
	where
		D: Deserializer<'de>,
	{
		b64_array::deserialize(deserializer).map(Zeroizing::new)
	}
}

/// A persisted lease. Holds its own session key; never leaves this module.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaseRecord {
	kms_version: u32,
	lease_id: LeaseId,
	user_id: String,
	kid: String,
	purpose: String,
	created_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
	ttl_secs: u64,
	endpoints: Vec<String>,
	auto_extend: bool,
	#[serde(default)]
	revoked_at: Option<DateTime<Utc>>,
	#[serde(with = "session_key_b64")]
	session_key: Zeroizing<[u8; KEY_SIZE]>,
	wrapped_key: Sealed,
	#[serde(with = "b64")]
	aad: Vec<u8>,
}

impl LeaseRecord {
	fn check_version(&self) -> KmsResult<()> {
		if self.kms_version != KMS_VERSION {
			return Err(KmsError::UnsupportedVersion {
				record: "lease",
				version: self.kms_version,
			});
		}
		Ok(())
	}

	fn info(&self) -> LeaseInfo {
		LeaseInfo {
			lease_id: self.lease_id,
			user_id: self.user_id.clone(),
			kid: self.kid.clone(),
			purpose: self.purpose.clone(),
			created_at: self.created_at,
			expires_at: self.expires_at,
			endpoints: self.endpoints.clone(),
			auto_extend: self.auto_extend,
			revoked_at: self.revoked_at,
		}
	}

	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	fn open_key(&self) -> KmsResult<ApplicationKey> {
		if self.aad != lease_aad(self.lease_id, &self.user_id, &self.kid) {
			return Err(KmsError::Crypto(CryptoError::Decryption));
		}
		ApplicationKey::open_under(&self.session_key, &self.wrapped_key, &self.aad, &self.kid)
	}
}

impl fmt::Debug for LeaseRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LeaseRecord")
			.field("lease_id", &self.lease_id)
			.field("user_id", &self.user_id)
			.field("kid", &self.kid)
			.field("expires_at", &self.expires_at)
			.field("session_key", &"[REDACTED]")
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LeaseIndex {
	leases: Vec<LeaseId>,
}

// =============================================================================
// Public types
// =============================================================================

/// Parameters for [`LeaseManager::create_lease`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRequest {
	pub user_id: String,
	/// Defaults to the current key for `purpose`.
	#[serde(default)]
	pub kid: Option<String>,
	#[serde(default)]
	pub purpose: Option<String>,
	pub endpoints: Vec<String>,
	#[serde(default)]
	pub ttl_secs: Option<u64>,
	#[serde(default)]
	pub auto_extend: Option<bool>,
}

impl LeaseRequest {
	pub fn new(user_id: impl Into<String>, endpoints: Vec<String>) -> Self {
		Self {
			user_id: user_id.into(),
			kid: None,
			purpose: None,
			endpoints,
			ttl_secs: None,
			auto_extend: None,
		}
	}

	pub fn kid(mut self, kid: impl Into<String>) -> Self {
		self.kid = Some(kid.into());
		self
	}

	pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
		self.purpose = Some(purpose.into());
		self
	}

	pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
		self.ttl_secs = Some(ttl_secs);
		self
	}

	pub fn auto_extend(mut self, auto_extend: bool) -> Self {
		self.auto_extend = Some(auto_extend);
		self
	}

	fn validate(&self, config: &LeaseConfig) -> KmsResult<u64> {
		if self.user_id.trim().is_empty() {
			return Err(KmsError::InvalidRequest("userId must not be empty".into()));
		}
		if self.endpoints.is_empty() {
			return Err(KmsError::InvalidRequest("a lease needs at least one endpoint".into()));
		}
		if self.endpoints.iter().any(|e| e.trim().is_empty()) {
			return Err(KmsError::InvalidRequest("endpoints must not be empty".into()));
		}
		let ttl = self.ttl_secs.unwrap_or(config.default_ttl_secs);
		if ttl == 0 || ttl > config.max_ttl_secs {
			return Err(KmsError::InvalidRequest(format!(
				"ttl must be between 1 and {} seconds, got {ttl}",
				config.max_ttl_secs
			)));
		}
		Ok(ttl)
	}
}

/// The public view of a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseInfo {
	pub lease_id: LeaseId,
	pub user_id: String,
	pub kid: String,
	pub purpose: String,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub endpoints: Vec<String>,
	pub auto_extend: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseInvalidReason {
	NotFound,
	Revoked,
	Expired,
	KeyStale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseVerification {
	pub valid: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<LeaseInvalidReason>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quota: Option<QuotaSnapshot>,
}

impl LeaseVerification {
	fn invalid(reason: LeaseInvalidReason, expires_at: Option<DateTime<Utc>>) -> Self {
		Self {
			valid: false,
			reason: Some(reason),
			expires_at,
			quota: None,
		}
	}
}

// =============================================================================
// Manager
// =============================================================================

pub struct LeaseManager {
	records: RecordStore,
	master: Arc<MasterSecretManager>,
	wrapping: WrappingService,
	audit: Arc<AuditLog>,
	config: LeaseConfig,
	clock: Arc<dyn Clock>,
	/// Serialises lease and quota read-modify-write.
	state_lock: Mutex<()>,
}

impl LeaseManager {
	pub fn new(
		records: RecordStore,
		master: Arc<MasterSecretManager>,
		audit: Arc<AuditLog>,
		config: LeaseConfig,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			wrapping: WrappingService::new(records.clone(), clock.clone()),
			records,
			master,
			audit,
			config,
			clock,
			state_lock: Mutex::new(()),
		}
	}

	pub fn config(&self) -> &LeaseConfig {
		&self.config
	}

	/// Unlock once, re-wrap the application key under a fresh session key and persist the lease.
	#[instrument(skip(self, credentials, request), fields(user_id = %request.user_id))]
	pub async fn create_lease(&self, credentials: &Credentials, request: LeaseRequest) -> KmsResult<LeaseInfo> {
		let ttl_secs = request.validate(&self.config)?;
		let lease_id = LeaseId::generate();
		let created_at = self.clock.now();
		let expires_at = created_at + seconds(ttl_secs)?;
		let auto_extend = request.auto_extend.unwrap_or(self.config.auto_extend);

		let wrapping = self.wrapping.clone();
		let LeaseRequest {
			user_id,
			kid,
			purpose,
			endpoints,
			..
		} = request;

		let outcome = self
			.master
			.with_unlock(credentials, move |ctx| {
				Box::pin(async move {
					let kid = match kid {
						Some(kid) => kid,
						None => {
							let purpose = purpose.as_deref().unwrap_or(DEFAULT_PURPOSE);
							wrapping.require_current_kid(purpose).await?
						}
					};
					let wrapped = wrapping.wrapped_key(&kid).await?;
					if wrapping.current_kid(&wrapped.purpose).await?.as_deref() != Some(kid.as_str()) {
						return Err(KmsError::LeaseKeyStale);
					}

					let key = wrapping.unwrap(&kid, ctx.mkek()).await?;
					let session_key = generate_key();
					let aad = lease_aad(lease_id, &user_id, &kid);
					let wrapped_key = key.seal_under(&session_key, &aad)?;

					Ok(LeaseRecord {
						kms_version: KMS_VERSION,
						lease_id,
						user_id,
						kid,
						purpose: wrapped.purpose,
						created_at,
						expires_at,
						ttl_secs,
						endpoints,
						auto_extend,
						revoked_at: None,
						session_key,
						wrapped_key,
						aad,
					})
				})
			})
			.await?;

		let record = &outcome.result;
		{
			let _guard = self.state_lock.lock().await;
			self.records.put(&lease_key(lease_id), record).await?;
			self.records
				.put(&quota_key(lease_id), &QuotaState::new(lease_id, &self.config.quota, created_at.timestamp_millis()))
				.await?;
			let mut index = self.index().await?;
			index.leases.push(lease_id);
			self.records.put(LEASE_INDEX_KEY, &index).await?;
		}

		self.audit
			.append(
				AuditEvent::builder(AuditOperation::LeaseCreated, outcome.authority())
					.kid(record.kid.clone())
					.lease(lease_id.to_string())
					.unlock_window(outcome.unlock_time, outcome.lock_time)
					.detail("userId", record.user_id.clone())
					.detail("endpoints", record.endpoints.clone())
					.detail("ttlSeconds", ttl_secs)
					.detail("autoExtend", auto_extend)
					.detail("expiresAt", expires_at.to_rfc3339())
					.build(),
			)
			.await?;

		info!(lease_id = %lease_id, kid = %record.kid, ttl_secs, "lease created");
		Ok(record.info())
	}

	/// Issue one token for `endpoint` under the lease's delegated authority.
	#[instrument(skip(self))]
	pub async fn issue(&self, lease_id: LeaseId, endpoint: &str) -> KmsResult<SignedToken> {
		let mut tokens = self.issue_tokens(lease_id, endpoint, 1).await?;
		tokens
			.pop()
			.ok_or_else(|| KmsError::Internal("issuance produced no token".into()))
	}

	/// Issue `count` tokens whose validity windows overlap.
	///
	/// Token `i + 1` becomes valid `stagger_fraction` of the way through token
	/// `i`'s lifetime, so expirations step by `stagger_fraction * token_ttl`.
	#[instrument(skip(self))]
	pub async fn issue_batch(&self, lease_id: LeaseId, endpoint: &str, count: u32) -> KmsResult<Vec<SignedToken>> {
		if count == 0 || count > self.config.max_batch {
			return Err(KmsError::InvalidRequest(format!(
				"batch size must be between 1 and {}, got {count}",
				self.config.max_batch
			)));
		}
		self.issue_tokens(lease_id, endpoint, count).await
	}

	pub async fn verify_lease(&self, lease_id: LeaseId) -> KmsResult<LeaseVerification> {
		let Some(record) = self.load_optional(lease_id).await? else {
			return Ok(LeaseVerification::invalid(LeaseInvalidReason::NotFound, None));
		};
		let now = self.clock.now();
		let expires_at = Some(record.expires_at);
		if record.revoked_at.is_some() {
			return Ok(LeaseVerification::invalid(LeaseInvalidReason::Revoked, expires_at));
		}
		if record.is_expired(now) {
			return Ok(LeaseVerification::invalid(LeaseInvalidReason::Expired, expires_at));
		}
		if !self.key_is_current(&record).await? {
			return Ok(LeaseVerification::invalid(LeaseInvalidReason::KeyStale, expires_at));
		}

		let mut quota = self.load_quota(&record, now).await?;
		Ok(LeaseVerification {
			valid: true,
			reason: None,
			expires_at,
			quota: Some(quota.snapshot(&self.config.quota, now.timestamp_millis())),
		})
	}

	/// Push the lease's expiry out by its original TTL.
	///
	/// With credentials this runs an unlock and is recorded as an owner
	/// operation. Without, the lease must be auto-extending and still live.
	#[instrument(skip(self, credentials))]
	pub async fn extend_lease(&self, lease_id: LeaseId, credentials: Option<&Credentials>) -> KmsResult<LeaseInfo> {
		let (authority, window) = match credentials {
			Some(credentials) => {
				let outcome = self
					.master
					.with_unlock(credentials, |_ctx| Box::pin(async { Ok::<_, KmsError>(()) }))
					.await?;
				(outcome.authority(), Some((outcome.unlock_time, outcome.lock_time)))
			}
			None => (AuditAuthority::lease(lease_id.to_string()), None),
		};

		let (info, previous) = {
			let _guard = self.state_lock.lock().await;
			let mut record = self.load(lease_id).await?;
			let now = self.clock.now();
			if record.revoked_at.is_some() {
				return Err(KmsError::LeaseRevoked);
			}
			if !self.key_is_current(&record).await? {
				return Err(KmsError::LeaseKeyStale);
			}
			if credentials.is_none() {
				if !record.auto_extend {
					return Err(KmsError::InvalidRequest(
						"lease does not auto-extend; credentials are required".into(),
					));
				}
				if record.is_expired(now) {
					return Err(KmsError::LeaseExpired);
				}
			}
			let previous = record.expires_at;
			record.expires_at = now + seconds(record.ttl_secs)?;
			self.records.put(&lease_key(lease_id), &record).await?;
			(record.info(), previous)
		};

		let mut event = AuditEvent::builder(AuditOperation::LeaseExtended, authority)
			.kid(info.kid.clone())
			.lease(lease_id.to_string())
			.detail("previousExpiresAt", previous.to_rfc3339())
			.detail("expiresAt", info.expires_at.to_rfc3339());
		if let Some((unlock_time, lock_time)) = window {
			event = event.unlock_window(unlock_time, lock_time);
		}
		self.audit.append(event.build()).await?;

		info!(lease_id = %lease_id, expires_at = %info.expires_at, "lease extended");
		Ok(info)
	}

	/// Revoke a lease. Revoking twice is not an error and records one audit entry.
	#[instrument(skip(self))]
	pub async fn revoke_lease(&self, lease_id: LeaseId) -> KmsResult<LeaseInfo> {
		let (info, newly_revoked) = {
			let _guard = self.state_lock.lock().await;
			let mut record = self.load(lease_id).await?;
			if record.revoked_at.is_some() {
				(record.info(), false)
			} else {
				record.revoked_at = Some(self.clock.now());
				self.records.put(&lease_key(lease_id), &record).await?;
				(record.info(), true)
			}
		};

		if newly_revoked {
			self.audit
				.append(
					AuditEvent::builder(AuditOperation::LeaseRevoked, AuditAuthority::System)
						.kid(info.kid.clone())
						.lease(lease_id.to_string())
						.build(),
				)
				.await?;
			info!(lease_id = %lease_id, "lease revoked");
		}
		Ok(info)
	}

	pub async fn lease_info(&self, lease_id: LeaseId) -> KmsResult<LeaseInfo> {
		Ok(self.load(lease_id).await?.info())
	}

	/// All leases, optionally only those owned by `user_id`.
	pub async fn list_leases(&self, user_id: Option<&str>) -> KmsResult<Vec<LeaseInfo>> {
		let index = self.index().await?;
		let mut leases = Vec::with_capacity(index.leases.len());
		for id in index.leases {
			match self.load_optional(id).await? {
				Some(record) if user_id.map_or(true, |u| u == record.user_id) => leases.push(record.info()),
				Some(_) => {}
				None => warn!(lease_id = %id, "lease index names a missing lease"),
			}
		}
		Ok(leases)
	}

	// =========================================================================
	// Issuance
	// =========================================================================

	async fn issue_tokens(&self, lease_id: LeaseId, endpoint: &str, count: u32) -> KmsResult<Vec<SignedToken>> {
		let now = self.clock.now();
		let token_ttl = seconds(self.config.token_ttl_secs)?;
		let step_secs = (self.config.token_ttl_secs as f64 * self.config.stagger_fraction).round() as i64;

		let (record, auto_extended) = {
			let _guard = self.state_lock.lock().await;
			let mut record = self.load(lease_id).await?;
			self.check_usable(&record, endpoint, now).await?;

			let remaining = record.expires_at - now;
			let auto_extended = if record.auto_extend && remaining < seconds(record.ttl_secs / 2)? {
				let previous = record.expires_at;
				record.expires_at = now + seconds(record.ttl_secs)?;
				Some(previous)
			} else {
				None
			};

			// A lone token is capped at lease expiry. A batch must fit whole, or
			// the cap would collapse the staggered expirations.
			if count > 1 {
				let last_expiry = now + Duration::seconds(step_secs * i64::from(count - 1)) + token_ttl;
				if last_expiry > record.expires_at {
					return Err(KmsError::InvalidRequest(format!(
						"a batch of {count} would outlive the lease, which expires at {}",
						record.expires_at.to_rfc3339()
					)));
				}
			}

			let mut quota = self.load_quota(&record, now).await?;
			quota
				.try_reserve(&self.config.quota, endpoint, count, now.timestamp_millis())
				.map_err(KmsError::QuotaExceeded)?;
			self.records.put(&quota_key(lease_id), &quota).await?;
			if auto_extended.is_some() {
				self.records.put(&lease_key(lease_id), &record).await?;
			}
			(record, auto_extended)
		};

		let key = record.open_key()?;
		let mut tokens = Vec::with_capacity(count as usize);
		for i in 0..count {
			let not_before = now + Duration::seconds(step_secs * i64::from(i));
			let expires_at = (not_before + token_ttl).min(record.expires_at);
			let claims = TokenClaims {
				aud: endpoint.to_string(),
				sub: record.user_id.clone(),
				iat: now.timestamp(),
				nbf: not_before.timestamp(),
				exp: expires_at.timestamp(),
				jti: TokenId::generate(),
				lid: lease_id,
			};
			tokens.push(SignedToken {
				token: key.sign_jwt(&claims)?,
				jti: claims.jti,
				kid: record.kid.clone(),
				not_before: timestamp(claims.nbf)?,
				expires_at: timestamp(claims.exp)?,
			});
		}
		drop(key);

		let authority = AuditAuthority::lease(lease_id.to_string());
		if let Some(previous) = auto_extended {
			self.audit
				.append(
					AuditEvent::builder(AuditOperation::LeaseExtended, authority.clone())
						.kid(record.kid.clone())
						.lease(lease_id.to_string())
						.detail("automatic", true)
						.detail("previousExpiresAt", previous.to_rfc3339())
						.detail("expiresAt", record.expires_at.to_rfc3339())
						.build(),
				)
				.await?;
		}

		let event = if count == 1 {
			let token = &tokens[0];
			AuditEvent::builder(AuditOperation::TokenIssued, authority)
				.detail("jti", token.jti.to_string())
				.detail("notBefore", token.not_before.to_rfc3339())
				.detail("expiresAt", token.expires_at.to_rfc3339())
		} else {
			AuditEvent::builder(AuditOperation::TokenBatchIssued, authority)
				.detail("count", count)
				.detail("jtis", tokens.iter().map(|t| t.jti.to_string()).collect::<Vec<_>>())
				.detail("staggerSeconds", step_secs)
		};
		self.audit
			.append(
				event
					.kid(record.kid.clone())
					.lease(lease_id.to_string())
					.detail("endpoint", endpoint)
					.build(),
			)
			.await?;

		info!(lease_id = %lease_id, endpoint, count, "tokens issued");
		Ok(tokens)
	}

	/// Revoked, then expired, then stale, then out of scope.
	async fn check_usable(&self, record: &LeaseRecord, endpoint: &str, now: DateTime<Utc>) -> KmsResult<()> {
		if record.revoked_at.is_some() {
			return Err(KmsError::LeaseRevoked);
		}
		if record.is_expired(now) {
			return Err(KmsError::LeaseExpired);
		}
		if !self.key_is_current(record).await? {
			return Err(KmsError::LeaseKeyStale);
		}
		if !record.endpoints.iter().any(|e| e == endpoint) {
			return Err(KmsError::EndpointNotAuthorized(endpoint.to_string()));
		}
		Ok(())
	}

	async fn key_is_current(&self, record: &LeaseRecord) -> KmsResult<bool> {
		Ok(self.wrapping.current_kid(&record.purpose).await?.as_deref() == Some(record.kid.as_str()))
	}

	// =========================================================================
	// Storage
	// =========================================================================

	async fn load_optional(&self, lease_id: LeaseId) -> KmsResult<Option<LeaseRecord>> {
		let record = self.records.get::<LeaseRecord>(&lease_key(lease_id)).await?;
		if let Some(record) = &record {
			record.check_version()?;
		}
		Ok(record)
	}

	async fn load(&self, lease_id: LeaseId) -> KmsResult<LeaseRecord> {
		self.load_optional(lease_id)
			.await?
			.ok_or_else(|| KmsError::LeaseNotFound(lease_id.to_string()))
	}

	async fn load_quota(&self, record: &LeaseRecord, now: DateTime<Utc>) -> KmsResult<QuotaState> {
		Ok(self
			.records
			.get::<QuotaState>(&quota_key(record.lease_id))
			.await?
			.unwrap_or_else(|| QuotaState::new(record.lease_id, &self.config.quota, now.timestamp_millis())))
	}

	async fn index(&self) -> KmsResult<LeaseIndex> {
		Ok(self.records.get::<LeaseIndex>(LEASE_INDEX_KEY).await?.unwrap_or_default())
	}
}

impl fmt::Debug for LeaseManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LeaseManager")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

fn seconds(secs: u64) -> KmsResult<Duration> {
	i64::try_from(secs)
		.ok()
		.and_then(Duration::try_seconds)
		.ok_or_else(|| KmsError::InvalidRequest(format!("duration out of range: {secs}s")))
}
