// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The caller-facing custody service.
//!
//! [`Kms`] wires the master secret manager, wrapping service, audit log and
//! lease manager over one store and records every privileged operation.
//! [`KmsRequest`] and [`KmsResponse`] are the tagged forms a transport
//! carries; [`Kms::handle`] dispatches them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use custody_audit::{
	AuditAnchor, AuditAuthority, AuditEntry, AuditEvent, AuditLog, AuditOperation, AuditSigningKey, ChainVerification,
};
use custody_common_secret::SecretBytes;
use custody_config::CustodyConfig;
use custody_crypto::encoding::{b64, b64url_encode};
use custody_crypto::hash::sha256;
use custody_store::{open_store, RecordStore, SecretStore};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::credentials::{gate_pepper, Credentials};
use crate::enrollment::{EnrollmentInfo, EnrollmentSummary};
use crate::error::{KmsError, KmsResult};
use crate::lease::{LeaseInfo, LeaseManager, LeaseRequest, LeaseVerification};
use crate::master::MasterSecretManager;
use crate::token::{token_kid, verify_token, SignedToken, TokenClaims};
use crate::types::{EnrollmentMethod, KmsStatus, LeaseId, DEFAULT_PURPOSE};
use crate::wrapping::{PublicKeyInfo, WrappingService};

const DEFAULT_AUDIT_PAGE: u64 = 100;

// =============================================================================
// Results
// =============================================================================

/// Timing of a diagnostic unlock. The secret itself never leaves the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockReport {
	pub method: EnrollmentMethod,
	pub unlock_time: DateTime<Utc>,
	pub lock_time: DateTime<Utc>,
	pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
	pub kid: String,
	pub algorithm: String,
	/// Base64url Ed25519 signature.
	pub signature: String,
}

// =============================================================================
// Builder
// =============================================================================

pub struct KmsBuilder {
	store: Arc<dyn SecretStore>,
	config: CustodyConfig,
	clock: Option<Arc<dyn Clock>>,
}

impl KmsBuilder {
	pub fn config(mut self, config: CustodyConfig) -> Self {
		self.config = config;
		self
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Assemble the service and make sure the audit log has a signing key.
	pub async fn build(self) -> KmsResult<Kms> {
		let records = RecordStore::new(self.store);
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let master = Arc::new(MasterSecretManager::new(
			records.clone(),
			self.config.kdf.clone(),
			clock.clone(),
		));
		let audit = Arc::new(
			AuditLog::new(records.clone())
				.with_clock(clock.clone())
				.with_tracing_mirror(self.config.audit.mirror_to_tracing),
		);
		let audit_kid = audit.initialize().await?;
		let leases = LeaseManager::new(
			records.clone(),
			master.clone(),
			audit.clone(),
			self.config.lease.clone(),
			clock.clone(),
		);

		info!(audit_kid = %audit_kid, "custody service ready");
		Ok(Kms {
			wrapping: WrappingService::new(records, clock.clone()),
			master,
			audit,
			leases,
			clock,
		})
	}
}

// =============================================================================
// Service
// =============================================================================

pub struct Kms {
	master: Arc<MasterSecretManager>,
	wrapping: WrappingService,
	audit: Arc<AuditLog>,
	leases: LeaseManager,
	clock: Arc<dyn Clock>,
}

impl Kms {
	pub fn builder(store: Arc<dyn SecretStore>) -> KmsBuilder {
		KmsBuilder {
			store,
			config: CustodyConfig::default(),
			clock: None,
		}
	}

	/// Open the store named by `config.store.url` and build the service over it.
	pub async fn open(config: &CustodyConfig) -> KmsResult<Self> {
		let store = open_store(&config.store.url).await?;
		Self::builder(store).config(config.clone()).build().await
	}

	// =========================================================================
	// Enrollment
	// =========================================================================

	pub async fn status(&self) -> KmsResult<KmsStatus> {
		self.master.status().await
	}

	/// First enrollment. Generates the master secret.
	#[instrument(skip(self, credentials), fields(method = %credentials.method()))]
	pub async fn setup(&self, credentials: &Credentials) -> KmsResult<EnrollmentSummary> {
		let unlock_time = self.clock.now();
		let summary = self.master.setup(credentials).await?;
		let lock_time = self.clock.now();

		self.audit
			.append(
				AuditEvent::builder(AuditOperation::Setup, AuditAuthority::owner(summary.method.as_str()))
					.unlock_window(unlock_time, lock_time)
					.detail("method", summary.method.as_str())
					.build(),
			)
			.await?;
		Ok(summary)
	}

	/// Enroll `new` as another way to unlock, authenticating with `existing`.
	#[instrument(skip(self, existing, new), fields(auth_method = %existing.method(), method = %new.method()))]
	pub async fn enroll(&self, existing: &Credentials, new: &Credentials) -> KmsResult<EnrollmentSummary> {
		let unlock_time = self.clock.now();
		let summary = self.master.add_enrollment(existing, new).await?;
		let lock_time = self.clock.now();

		self.audit
			.append(
				AuditEvent::builder(AuditOperation::EnrollmentAdded, AuditAuthority::owner(existing.method().as_str()))
					.unlock_window(unlock_time, lock_time)
					.detail("method", summary.method.as_str())
					.detail("kdfIterations", summary.kdf_iterations)
					.build(),
			)
			.await?;
		Ok(summary)
	}

	#[instrument(skip(self, credentials), fields(auth_method = %credentials.method()))]
	pub async fn remove_enrollment(
		&self,
		credentials: &Credentials,
		method: EnrollmentMethod,
	) -> KmsResult<Vec<EnrollmentMethod>> {
		let unlock_time = self.clock.now();
		let remaining = self.master.remove_enrollment(credentials, method).await?;
		let lock_time = self.clock.now();

		self.audit
			.append(
				AuditEvent::builder(
					AuditOperation::EnrollmentRemoved,
					AuditAuthority::owner(credentials.method().as_str()),
				)
				.unlock_window(unlock_time, lock_time)
				.detail("method", method.as_str())
				.detail("remaining", remaining.iter().map(|m| m.as_str()).collect::<Vec<_>>())
				.build(),
			)
			.await?;
		Ok(remaining)
	}

	pub async fn enrollment_info(&self, method: EnrollmentMethod) -> KmsResult<Option<EnrollmentInfo>> {
		self.master.enrollment_info(method).await
	}

	/// A fresh pepper for a gate enrollment.
	pub fn gate_pepper(&self) -> SecretBytes {
		gate_pepper()
	}

	/// Check credentials and report the unlock timing. Diagnostic only.
	#[instrument(skip(self, credentials), fields(method = %credentials.method()))]
	pub async fn unlock(&self, credentials: &Credentials) -> KmsResult<UnlockReport> {
		let outcome = self
			.master
			.with_unlock(credentials, |_ctx| Box::pin(async { Ok::<_, KmsError>(()) }))
			.await?;

		self.audit
			.append(
				AuditEvent::builder(AuditOperation::Unlock, outcome.authority())
					.unlock_window(outcome.unlock_time, outcome.lock_time)
					.build(),
			)
			.await?;
		Ok(UnlockReport {
			method: outcome.method,
			unlock_time: outcome.unlock_time,
			lock_time: outcome.lock_time,
			duration_ms: outcome.duration_ms,
		})
	}

	// =========================================================================
	// Application keys
	// =========================================================================

	/// Generate a signing key for `purpose` and make it current. Leases on the previous key go stale.
	#[instrument(skip(self, credentials))]
	pub async fn generate_application_key(
		&self,
		credentials: &Credentials,
		purpose: Option<&str>,
	) -> KmsResult<PublicKeyInfo> {
		let purpose = purpose.unwrap_or(DEFAULT_PURPOSE).to_string();
		let previous = self.wrapping.current_kid(&purpose).await?;
		let wrapping = self.wrapping.clone();
		let key_purpose = purpose.clone();
		let outcome = self
			.master
			.with_unlock(credentials, move |ctx| {
				Box::pin(async move { wrapping.generate(&key_purpose, ctx.mkek()).await })
			})
			.await?;

		let info = outcome.result.public_info();
		let mut event = AuditEvent::builder(AuditOperation::KeyGenerated, outcome.authority())
			.kid(info.kid.clone())
			.unlock_window(outcome.unlock_time, outcome.lock_time)
			.detail("purpose", purpose)
			.detail("algorithm", info.algorithm.clone());
		if let Some(previous) = previous {
			event = event.detail("previousKid", previous);
		}
		self.audit.append(event.build()).await?;
		Ok(info)
	}

	pub async fn public_key(&self, kid: &str) -> KmsResult<PublicKeyInfo> {
		self.wrapping.public_key(kid).await
	}

	/// The current key for `purpose`.
	pub async fn current_public_key(&self, purpose: Option<&str>) -> KmsResult<PublicKeyInfo> {
		let kid = self
			.wrapping
			.require_current_kid(purpose.unwrap_or(DEFAULT_PURPOSE))
			.await?;
		self.wrapping.public_key(&kid).await
	}

	/// Sign `payload` with an application key under owner credentials.
	///
	/// Only the payload's SHA-256 is recorded.
	#[instrument(skip(self, credentials, payload), fields(payload_len = payload.len()))]
	pub async fn sign(&self, credentials: &Credentials, kid: Option<&str>, payload: &[u8]) -> KmsResult<SignatureResult> {
		let kid = match kid {
			Some(kid) => kid.to_string(),
			None => self.wrapping.require_current_kid(DEFAULT_PURPOSE).await?,
		};
		let wrapping = self.wrapping.clone();
		let key_id = kid.clone();
		let message = payload.to_vec();
		let outcome = self
			.master
			.with_unlock(credentials, move |ctx| {
				Box::pin(async move {
					let key = wrapping.unwrap(&key_id, ctx.mkek()).await?;
					Ok(key.sign(&message))
				})
			})
			.await?;

		let algorithm = self.wrapping.wrapped_key(&kid).await?.algorithm;
		self.audit
			.append(
				AuditEvent::builder(AuditOperation::Sign, outcome.authority())
					.kid(kid.clone())
					.unlock_window(outcome.unlock_time, outcome.lock_time)
					.detail("payloadSha256", hex::encode(sha256(payload)))
					.detail("payloadLength", payload.len())
					.build(),
			)
			.await?;
		Ok(SignatureResult {
			kid,
			algorithm,
			signature: b64url_encode(outcome.result),
		})
	}

	// =========================================================================
	// Leases
	// =========================================================================

	pub async fn create_lease(&self, credentials: &Credentials, request: LeaseRequest) -> KmsResult<LeaseInfo> {
		self.leases.create_lease(credentials, request).await
	}

	pub async fn issue(&self, lease_id: LeaseId, endpoint: &str) -> KmsResult<SignedToken> {
		self.leases.issue(lease_id, endpoint).await
	}

	pub async fn issue_batch(&self, lease_id: LeaseId, endpoint: &str, count: u32) -> KmsResult<Vec<SignedToken>> {
		self.leases.issue_batch(lease_id, endpoint, count).await
	}

	pub async fn verify_lease(&self, lease_id: LeaseId) -> KmsResult<LeaseVerification> {
		self.leases.verify_lease(lease_id).await
	}

	pub async fn extend_lease(&self, lease_id: LeaseId, credentials: Option<&Credentials>) -> KmsResult<LeaseInfo> {
		self.leases.extend_lease(lease_id, credentials).await
	}

	pub async fn revoke_lease(&self, lease_id: LeaseId) -> KmsResult<LeaseInfo> {
		self.leases.revoke_lease(lease_id).await
	}

	pub async fn list_leases(&self, user_id: Option<&str>) -> KmsResult<Vec<LeaseInfo>> {
		self.leases.list_leases(user_id).await
	}

	/// Verify a token against the public half of the key its header names.
	pub async fn verify_token(&self, token: &str) -> KmsResult<TokenClaims> {
		let kid = token_kid(token)?;
		let public = match self.wrapping.public_key(&kid).await {
			Ok(public) => public,
			Err(KmsError::KeyNotFound(_)) => return Err(KmsError::InvalidToken(format!("unknown key {kid}"))),
			Err(e) => return Err(e),
		};
		verify_token(token, &public.public_key, self.clock.now())
	}

	// =========================================================================
	// Audit
	// =========================================================================

	pub async fn get_audit_log(&self, offset: u64, limit: u64) -> KmsResult<Vec<AuditEntry>> {
		Ok(self.audit.entries(offset, limit).await?)
	}

	pub async fn verify_audit_chain(&self) -> KmsResult<ChainVerification> {
		let verification = self.audit.verify().await?;
		if !verification.valid {
			warn!(errors = verification.errors.len(), "audit chain failed verification");
		}
		Ok(verification)
	}

	/// Verify the chain and check it still reaches an anchor taken earlier.
	pub async fn verify_audit_chain_against(&self, anchor: &AuditAnchor) -> KmsResult<ChainVerification> {
		Ok(self.audit.verify_against(anchor).await?)
	}

	/// Verify the chain, failing with the first inconsistency found.
	pub async fn ensure_audit_chain(&self) -> KmsResult<ChainVerification> {
		let verification = self.verify_audit_chain().await?;
		match verification.errors.first() {
			None => Ok(verification),
			Some(first) => Err(KmsError::ChainIntegrityViolation {
				index: first.seq_num,
				reason: first.detail.clone(),
			}),
		}
	}

	pub async fn audit_anchor(&self) -> KmsResult<AuditAnchor> {
		Ok(self.audit.anchor().await?)
	}

	pub async fn audit_public_keys(&self) -> KmsResult<Vec<AuditSigningKey>> {
		Ok(self.audit.public_keys().await?)
	}

	/// Replace the audit signing key. Earlier entries stay verifiable.
	#[instrument(skip(self, credentials))]
	pub async fn rotate_audit_key(&self, credentials: &Credentials) -> KmsResult<AuditEntry> {
		let outcome = self
			.master
			.with_unlock(credentials, |_ctx| Box::pin(async { Ok::<_, KmsError>(()) }))
			.await?;
		Ok(self.audit.rotate_signing_key(outcome.authority()).await?)
	}

	// =========================================================================
	// Dispatch
	// =========================================================================

	/// Run one tagged request.
	pub async fn handle(&self, request: KmsRequest) -> KmsResult<KmsResponse> {
		let name = request.name();
		let result = self.dispatch(request).await;
		if let Err(e) = &result {
			if e.is_internal() {
				error!(request = name, error = %e, "request failed");
			} else {
				info!(request = name, code = e.code(), "request rejected");
			}
		}
		result
	}

	async fn dispatch(&self, request: KmsRequest) -> KmsResult<KmsResponse> {
		Ok(match request {
			KmsRequest::Status => KmsResponse::Status(self.status().await?),
			KmsRequest::Setup { credentials } => KmsResponse::Enrollment(self.setup(&credentials).await?),
			KmsRequest::Enroll {
				credentials,
				new_credentials,
			} => KmsResponse::Enrollment(self.enroll(&credentials, &new_credentials).await?),
			KmsRequest::RemoveEnrollment { credentials, target } => {
				KmsResponse::Enrollments(self.remove_enrollment(&credentials, target).await?)
			}
			KmsRequest::EnrollmentInfo { target } => KmsResponse::EnrollmentInfo(self.enrollment_info(target).await?),
			KmsRequest::Unlock { credentials } => KmsResponse::Unlocked(self.unlock(&credentials).await?),
			KmsRequest::GenerateApplicationKey { credentials, purpose } => {
				KmsResponse::PublicKey(self.generate_application_key(&credentials, purpose.as_deref()).await?)
			}
			KmsRequest::PublicKey { kid } => KmsResponse::PublicKey(self.public_key(&kid).await?),
			KmsRequest::Sign {
				credentials,
				kid,
				payload,
			} => KmsResponse::Signature(self.sign(&credentials, kid.as_deref(), &payload).await?),
			KmsRequest::CreateLease { credentials, lease } => {
				KmsResponse::Lease(self.create_lease(&credentials, lease).await?)
			}
			KmsRequest::Issue { lease_id, endpoint } => KmsResponse::Token(self.issue(lease_id, &endpoint).await?),
			KmsRequest::IssueBatch {
				lease_id,
				endpoint,
				count,
			} => KmsResponse::Tokens(self.issue_batch(lease_id, &endpoint, count).await?),
			KmsRequest::VerifyLease { lease_id } => KmsResponse::LeaseVerification(self.verify_lease(lease_id).await?),
			KmsRequest::ExtendLease { lease_id, credentials } => {
				KmsResponse::Lease(self.extend_lease(lease_id, credentials.as_ref()).await?)
			}
			KmsRequest::RevokeLease { lease_id } => KmsResponse::Lease(self.revoke_lease(lease_id).await?),
			KmsRequest::ListLeases { user_id } => KmsResponse::Leases(self.list_leases(user_id.as_deref()).await?),
			KmsRequest::VerifyToken { token } => KmsResponse::TokenClaims(self.verify_token(&token).await?),
			KmsRequest::GetAuditLog { offset, limit } => {
				KmsResponse::AuditEntries(self.get_audit_log(offset, limit).await?)
			}
			KmsRequest::VerifyAuditChain { anchor } => KmsResponse::ChainVerification(match anchor {
				Some(anchor) => self.verify_audit_chain_against(&anchor).await?,
				None => self.verify_audit_chain().await?,
			}),
			KmsRequest::AuditPublicKeys => KmsResponse::AuditKeys(self.audit_public_keys().await?),
			KmsRequest::RotateAuditKey { credentials } => {
				KmsResponse::AuditEntry(self.rotate_audit_key(&credentials).await?)
			}
		})
	}
}

impl std::fmt::Debug for Kms {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Kms").finish_non_exhaustive()
	}
}

// =============================================================================
// Wire types
// =============================================================================

fn default_audit_page() -> u64 {
	DEFAULT_AUDIT_PAGE
}

/// A request as carried by a transport, tagged by `method`.
#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum KmsRequest {
	Status,
	Setup {
		credentials: Credentials,
	},
	Enroll {
		credentials: Credentials,
		new_credentials: Credentials,
	},
	RemoveEnrollment {
		credentials: Credentials,
		target: EnrollmentMethod,
	},
	EnrollmentInfo {
		target: EnrollmentMethod,
	},
	Unlock {
		credentials: Credentials,
	},
	GenerateApplicationKey {
		credentials: Credentials,
		#[serde(default)]
		purpose: Option<String>,
	},
	PublicKey {
		kid: String,
	},
	Sign {
		credentials: Credentials,
		#[serde(default)]
		kid: Option<String>,
		#[serde(with = "b64")]
		payload: Vec<u8>,
	},
	CreateLease {
		credentials: Credentials,
		lease: LeaseRequest,
	},
	Issue {
		lease_id: LeaseId,
		endpoint: String,
	},
	IssueBatch {
		lease_id: LeaseId,
		endpoint: String,
		count: u32,
	},
	VerifyLease {
		lease_id: LeaseId,
	},
	ExtendLease {
		lease_id: LeaseId,
		#[serde(default)]
		credentials: Option<Credentials>,
	},
	RevokeLease {
		lease_id: LeaseId,
	},
	ListLeases {
		#[serde(default)]
		user_id: Option<String>,
	},
	VerifyToken {
		token: String,
	},
	GetAuditLog {
		#[serde(default)]
		offset: u64,
		#[serde(default = "default_audit_page")]
		limit: u64,
	},
	VerifyAuditChain {
		#[serde(default)]
		anchor: Option<AuditAnchor>,
	},
	AuditPublicKeys,
	RotateAuditKey {
		credentials: Credentials,
	},
}

impl KmsRequest {
	pub fn name(&self) -> &'static str {
		match self {
			KmsRequest::Status => "status",
			KmsRequest::Setup { .. } => "setup",
			KmsRequest::Enroll { .. } => "enroll",
			KmsRequest::RemoveEnrollment { .. } => "removeEnrollment",
			KmsRequest::EnrollmentInfo { .. } => "enrollmentInfo",
			KmsRequest::Unlock { .. } => "unlock",
			KmsRequest::GenerateApplicationKey { .. } => "generateApplicationKey",
			KmsRequest::PublicKey { .. } => "publicKey",
			KmsRequest::Sign { .. } => "sign",
			KmsRequest::CreateLease { .. } => "createLease",
			KmsRequest::Issue { .. } => "issue",
			KmsRequest::IssueBatch { .. } => "issueBatch",
			KmsRequest::VerifyLease { .. } => "verifyLease",
			KmsRequest::ExtendLease { .. } => "extendLease",
			KmsRequest::RevokeLease { .. } => "revokeLease",
			KmsRequest::ListLeases { .. } => "listLeases",
			KmsRequest::VerifyToken { .. } => "verifyToken",
			KmsRequest::GetAuditLog { .. } => "getAuditLog",
			KmsRequest::VerifyAuditChain { .. } => "verifyAuditChain",
			KmsRequest::AuditPublicKeys => "auditPublicKeys",
			KmsRequest::RotateAuditKey { .. } => "rotateAuditKey",
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum KmsResponse {
	Status(KmsStatus),
	Enrollment(EnrollmentSummary),
	Enrollments(Vec<EnrollmentMethod>),
	EnrollmentInfo(Option<EnrollmentInfo>),
	Unlocked(UnlockReport),
	PublicKey(PublicKeyInfo),
	Signature(SignatureResult),
	Lease(LeaseInfo),
	Leases(Vec<LeaseInfo>),
	LeaseVerification(LeaseVerification),
	Token(SignedToken),
	Tokens(Vec<SignedToken>),
	TokenClaims(TokenClaims),
	AuditEntries(Vec<AuditEntry>),
	AuditEntry(AuditEntry),
	AuditKeys(Vec<AuditSigningKey>),
	ChainVerification(ChainVerification),
}

/// Error body for a transport. Internal errors are not described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
	pub code: String,
	pub message: String,
}

impl From<&KmsError> for ErrorResponse {
	fn from(err: &KmsError) -> Self {
		let message = if err.is_internal() {
			"internal error".to_string()
		} else {
			err.to_string()
		};
		Self {
			code: err.code().to_string(),
			message,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use custody_store::MemoryStore;
	use serde_json::json;

	async fn kms() -> Kms {
		Kms::builder(Arc::new(MemoryStore::new()))
			.config(CustodyConfig::for_tests())
			.build()
			.await
			.unwrap()
	}

	#[test]
	fn requests_parse_from_tagged_json() {
		let request: KmsRequest = serde_json::from_value(json!({
			"method": "issueBatch",
			"leaseId": "7c1e5f0a-3c2b-4f8e-9d3a-2b1c0d9e8f7a",
			"endpoint": "https://api.example.com",
			"count": 3
		}))
		.unwrap();
		assert!(matches!(request, KmsRequest::IssueBatch { count: 3, .. }));

		let request: KmsRequest = serde_json::from_value(json!({
			"method": "setup",
			"credentials": { "method": "passphrase", "passphrase": "correct horse battery staple" }
		}))
		.unwrap();
		assert_eq!(request.name(), "setup");

		let request: KmsRequest = serde_json::from_value(json!({ "method": "getAuditLog" })).unwrap();
		assert!(matches!(request, KmsRequest::GetAuditLog { offset: 0, limit: 100 }));
	}

	#[test]
	fn unknown_methods_are_rejected() {
		assert!(serde_json::from_value::<KmsRequest>(json!({ "method": "exportMasterSecret" })).is_err());
	}

	#[test]
	fn internal_errors_are_not_described() {
		let body = ErrorResponse::from(&KmsError::Internal("disk path /var/x".into()));
		assert_eq!(body.code, "internal");
		assert_eq!(body.message, "internal error");

		let body = ErrorResponse::from(&KmsError::LeaseExpired);
		assert_eq!(body.code, "lease_expired");
	}

	#[tokio::test]
	async fn handle_dispatches_and_tags_responses() {
		let kms = kms().await;
		let response = kms.handle(KmsRequest::Status).await.unwrap();
		let json = serde_json::to_value(&response).unwrap();
		assert_eq!(json["type"], "status");
		assert_eq!(json["data"]["state"], "uninitialized");
	}

	#[tokio::test]
	async fn sign_records_only_payload_digest() {
		let kms = kms().await;
		let creds = Credentials::passphrase("correct horse battery staple");
		kms.setup(&creds).await.unwrap();
		let key = kms.generate_application_key(&creds, None).await.unwrap();

		let payload = b"release artifact v1.2.3";
		let result = kms.sign(&creds, None, payload).await.unwrap();
		assert_eq!(result.kid, key.kid);

		let entries = kms.get_audit_log(0, 100).await.unwrap();
		let sign = entries.iter().find(|e| e.op == AuditOperation::Sign).unwrap();
		assert_eq!(sign.details["payloadSha256"], hex::encode(sha256(payload)));
		assert!(!serde_json::to_string(sign).unwrap().contains("release artifact"));
		assert!(sign.unlock_time.is_some() && sign.lock_time.is_some());
	}

	#[tokio::test]
	async fn ensure_audit_chain_passes_on_untouched_log() {
		let kms = kms().await;
		kms.setup(&Credentials::passphrase("correct horse battery staple")).await.unwrap();
		assert!(kms.ensure_audit_chain().await.unwrap().valid);
	}
}
