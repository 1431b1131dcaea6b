// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master secret enrollment and scoped unlock.
//!
//! There is no unlocked session. Every privileged call runs inside
//! [`MasterSecretManager::with_unlock`], which derives the master secret and
//! MKEK, hands the operation an [`UnlockContext`] borrowed for the duration of
//! one future, and drops both when that future finishes, fails, panics or is
//! cancelled. [`MasterSecret`] and [`Mkek`] zero their bytes in `Drop`, so
//! cleanup is structural rather than a convention callers must follow.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use custody_audit::AuditAuthority;
use custody_config::KdfConfig;
use custody_crypto::aead::{open, random_bytes, random_secret, seal};
use custody_crypto::kcv::{compute_kcv, verify_kcv, KCV_SIZE};
use custody_crypto::kdf::{calibrate, hkdf_sha256};
use custody_crypto::{Argon2Params, CalibrationPolicy, KEY_SIZE};
use custody_store::RecordStore;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroize;

use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::enrollment::{
	derive_wrapping_key, enrollment_aad, enrollment_key, EnrollmentIndex, EnrollmentInfo, EnrollmentRecord,
	EnrollmentSummary, KdfCalibration, KdfDescriptor, CALIBRATION_KEY, ENROLLMENT_INDEX_KEY,
};
use crate::error::{KmsError, KmsResult};
use crate::types::{EnrollmentMethod, KmsStatus, KMS_VERSION};

const MKEK_SALT: &[u8] = b"custody/mkek/salt/v1";
const MKEK_INFO: &[u8] = b"custody/mkek/v1";

// =============================================================================
// Secret holders
// =============================================================================

/// The root secret. Not `Clone`, never serialised, zeroed on drop.
pub struct MasterSecret {
	bytes: [u8; KEY_SIZE],
}

impl MasterSecret {
	fn generate() -> Self {
		let random = random_secret::<KEY_SIZE>();
		Self { bytes: *random }
	}

	fn from_plaintext(plaintext: &[u8]) -> Option<Self> {
		let bytes: [u8; KEY_SIZE] = plaintext.try_into().ok()?;
		Some(Self { bytes })
	}

	/// Raw bytes of the secret. Every call site is a place the root secret is read.
	pub fn expose_secret(&self) -> &[u8; KEY_SIZE] {
		&self.bytes
	}

	fn derive_mkek(&self) -> KmsResult<Mkek> {
		let derived = hkdf_sha256(&self.bytes, MKEK_SALT, MKEK_INFO)?;
		Ok(Mkek { bytes: *derived })
	}
}

impl Drop for MasterSecret {
	fn drop(&mut self) {
		self.bytes.zeroize();
		#[cfg(test)]
		wipe_witness::record("master_secret", &self.bytes);
	}
}

impl fmt::Debug for MasterSecret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("MasterSecret([REDACTED])")
	}
}

/// Master key-encryption key. Only constructed inside an unlock scope.
pub struct Mkek {
	bytes: [u8; KEY_SIZE],
}

impl Mkek {
	pub(crate) fn expose(&self) -> &[u8; KEY_SIZE] {
		&self.bytes
	}
}

impl Drop for Mkek {
	fn drop(&mut self) {
		self.bytes.zeroize();
		#[cfg(test)]
		wipe_witness::record("mkek", &self.bytes);
	}
}

impl fmt::Debug for Mkek {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Mkek([REDACTED])")
	}
}


// =============================================================================
// Unlock scope
// =============================================================================

/// What an operation sees while the master secret is unlocked.
pub struct UnlockContext {
	master: MasterSecret,
	mkek: Mkek,
	method: EnrollmentMethod,
	unlock_time: DateTime<Utc>,
}

impl UnlockContext {
	pub fn mkek(&self) -> &Mkek {
		&self.mkek
	}

	pub fn master_secret(&self) -> &MasterSecret {
		&self.master
	}

	pub fn method(&self) -> EnrollmentMethod {
		self.method
	}

	pub fn unlock_time(&self) -> DateTime<Utc> {
		self.unlock_time
	}
}

impl fmt::Debug for UnlockContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UnlockContext")
			.field("method", &self.method)
			.field("unlock_time", &self.unlock_time)
			.finish_non_exhaustive()
	}
}

/// Result of an operation run under [`MasterSecretManager::with_unlock`], with its timing.
#[derive(Debug)]
pub struct UnlockOutcome<T> {
	pub result: T,
	pub method: EnrollmentMethod,
	pub unlock_time: DateTime<Utc>,
	pub lock_time: DateTime<Utc>,
	pub duration_ms: i64,
}

impl<T> UnlockOutcome<T> {
	pub fn authority(&self) -> AuditAuthority {
		AuditAuthority::owner(self.method.as_str())
	}
}

// =============================================================================
// Manager
// =============================================================================

pub struct MasterSecretManager {
	records: RecordStore,
	kdf: KdfConfig,
	clock: Arc<dyn Clock>,
	enroll_lock: Mutex<()>,
}

impl MasterSecretManager {
	pub fn new(records: RecordStore, kdf: KdfConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			records,
			kdf,
			clock,
			enroll_lock: Mutex::new(()),
		}
	}

	pub async fn status(&self) -> KmsResult<KmsStatus> {
		let index = self.index().await?;
		if index.methods.is_empty() {
			Ok(KmsStatus::Uninitialized)
		} else {
			Ok(KmsStatus::Enrolled {
				methods: index.methods,
			})
		}
	}

	/// First enrollment: generates the master secret.
	pub async fn setup(&self, credentials: &Credentials) -> KmsResult<EnrollmentSummary> {
		self.enroll(credentials, None).await
	}

	/// Store `credentials` as an enrollment of `existing`, or of a fresh master
	/// secret when `existing` is `None` and nothing is enrolled yet.
	///
	/// Enrolling a method that already exists replaces it.
	#[instrument(skip(self, credentials, existing), fields(method = %credentials.method()))]
	pub async fn enroll(
		&self,
		credentials: &Credentials,
		existing: Option<&MasterSecret>,
	) -> KmsResult<EnrollmentSummary> {
		credentials.validate()?;
		let _guard = self.enroll_lock.lock().await;

		let mut index = self.index().await?;
		let generated;
		let master = match existing {
			Some(master) => master,
			None => {
				if !index.methods.is_empty() {
					return Err(KmsError::AlreadyInitialized);
				}
				generated = MasterSecret::generate();
				&generated
			}
		};

		let method = credentials.method();
		let params = self.argon2_params_for(method).await?;
		let kdf = KdfDescriptor::fresh(credentials, params);
		let wrapping_key = derive_wrapping_key(credentials, &kdf).await?;
		let kcv = compute_kcv(&wrapping_key)?;
		let aad = enrollment_aad(method, credentials.credential_id());
		let wrapped_secret = seal(&wrapping_key, master.expose_secret(), &aad)?;

		let now = self.clock.now();
		let key = enrollment_key(method);
		let created_at = match self.records.get::<EnrollmentRecord>(&key).await? {
			Some(previous) => previous.created_at,
			None => now,
		};
		let record = EnrollmentRecord {
			kms_version: KMS_VERSION,
			method,
			credential_id: credentials.credential_id().map(str::to_string),
			kdf,
			kcv: kcv.to_vec(),
			wrapped_secret,
			aad,
			created_at,
			updated_at: now,
		};

		// Record before index: the index never names a missing enrollment.
		self.records.put(&key, &record).await?;
		index.insert(method);
		self.records.put(ENROLLMENT_INDEX_KEY, &index).await?;

		info!(method = %method, fresh = existing.is_none(), "enrollment stored");
		Ok(EnrollmentSummary {
			method,
			credential_id: record.credential_id.clone(),
			kdf_iterations: record.kdf.iterations(),
			created_at,
		})
	}

	/// Unlock with `existing` and enroll the same master secret under `new`.
	pub async fn add_enrollment(&self, existing: &Credentials, new: &Credentials) -> KmsResult<EnrollmentSummary> {
		new.validate()?;
		let master = self.recover(existing).await?;
		self.enroll(new, Some(&master)).await
	}

	/// Recover the master secret. Diagnostic; privileged work belongs in [`Self::with_unlock`].
	pub async fn unlock(&self, credentials: &Credentials) -> KmsResult<MasterSecret> {
		self.recover(credentials).await
	}

	/// Run `operation` with the master secret unlocked.
	///
	/// The secret and MKEK are dropped, and so wiped, before this returns,
	/// whatever the operation's outcome.
	#[instrument(skip(self, credentials, operation), fields(method = %credentials.method()))]
	pub async fn with_unlock<T, F>(&self, credentials: &Credentials, operation: F) -> KmsResult<UnlockOutcome<T>>
	where
		F: for<'a> FnOnce(&'a UnlockContext) -> BoxFuture<'a, KmsResult<T>>,
	{
		let unlock_time = self.clock.now();
		let master = self.recover(credentials).await?;
		let mkek = master.derive_mkek()?;
		let context = UnlockContext {
			master,
			mkek,
			method: credentials.method(),
			unlock_time,
		};

		let result = operation(&context).await;
		let lock_time = self.clock.now();
		drop(context);

		let duration_ms = (lock_time - unlock_time).num_milliseconds();
		debug!(duration_ms, ok = result.is_ok(), "locked");
		Ok(UnlockOutcome {
			result: result?,
			method: credentials.method(),
			unlock_time,
			lock_time,
			duration_ms,
		})
	}

	/// Remove the enrollment for `method`, authenticating with `credentials`.
	///
	/// Returns the methods that remain.
	#[instrument(skip(self, credentials), fields(auth_method = %credentials.method()))]
	pub async fn remove_enrollment(
		&self,
		credentials: &Credentials,
		method: EnrollmentMethod,
	) -> KmsResult<Vec<EnrollmentMethod>> {
		let _master = self.recover(credentials).await?;
		let _guard = self.enroll_lock.lock().await;

		let mut index = self.index().await?;
		if !index.methods.contains(&method) {
			return Err(KmsError::InvalidRequest(format!("{method} is not enrolled")));
		}
		if index.methods.len() == 1 {
			return Err(KmsError::LastEnrollment);
		}

		index.remove(method);
		self.records.put(ENROLLMENT_INDEX_KEY, &index).await?;
		self.records.delete(&enrollment_key(method)).await?;

		info!(method = %method, remaining = index.methods.len(), "enrollment removed");
		Ok(index.methods)
	}

	pub async fn enrollment_info(&self, method: EnrollmentMethod) -> KmsResult<Option<EnrollmentInfo>> {
		let record = self.records.get::<EnrollmentRecord>(&enrollment_key(method)).await?;
		match record {
			Some(record) => {
				record.check_version()?;
				Ok(Some(record.info()))
			}
			None => Ok(None),
		}
	}

	/// Argon2id parameters for new passphrase enrollments.
	///
	/// Pinned by `kdf.fixed_iterations`, otherwise calibrated once and persisted.
	pub async fn kdf_params(&self) -> KmsResult<Argon2Params> {
		if let Some(params) = self.settled_kdf_params().await? {
			return Ok(params);
		}

		let policy = CalibrationPolicy {
			target_min_ms: self.kdf.target_min_ms,
			target_max_ms: self.kdf.target_max_ms,
			probe_iterations: self.kdf.probe_iterations,
			min_iterations: self.kdf.min_iterations,
			max_iterations: self.kdf.max_iterations,
			memory_kib: self.kdf.memory_kib,
			parallelism: self.kdf.parallelism,
		};
		let calibration = tokio::task::spawn_blocking(move || calibrate(&policy)).await??;
		let record = KdfCalibration {
			iterations: calibration.params.iterations,
			memory_kib: calibration.params.memory_kib,
			parallelism: calibration.params.parallelism,
			measured_ms: calibration.projected_ms,
			calibrated_at: self.clock.now(),
		};
		self.records.put(CALIBRATION_KEY, &record).await?;

		info!(
			iterations = record.iterations,
			memory_kib = record.memory_kib,
			projected_ms = record.measured_ms,
			"calibrated passphrase KDF"
		);
		Ok(record.params())
	}

	// =========================================================================
	// Internals
	// =========================================================================

	/// Pinned or previously calibrated parameters. Never calibrates.
	async fn settled_kdf_params(&self) -> KmsResult<Option<Argon2Params>> {
		if let Some(iterations) = self.kdf.fixed_iterations {
			return Ok(Some(Argon2Params {
				memory_kib: self.kdf.memory_kib,
				iterations,
				parallelism: self.kdf.parallelism,
			}));
		}
		Ok(self
			.records
			.get::<KdfCalibration>(CALIBRATION_KEY)
			.await?
			.map(|calibration| calibration.params()))
	}

	async fn index(&self) -> KmsResult<EnrollmentIndex> {
		Ok(self
			.records
			.get::<EnrollmentIndex>(ENROLLMENT_INDEX_KEY)
			.await?
			.unwrap_or_default())
	}

	async fn argon2_params_for(&self, method: EnrollmentMethod) -> KmsResult<Argon2Params> {
		match method {
			EnrollmentMethod::Passphrase => self.kdf_params().await,
			_ => self.decoy_argon2_params(method).await,
		}
	}

	/// Parameters for a decoy descriptor. Read-only: a failed unlock must not
	/// calibrate or write anything.
	async fn decoy_argon2_params(&self, method: EnrollmentMethod) -> KmsResult<Argon2Params> {
		let settled = match method {
			EnrollmentMethod::Passphrase => self.settled_kdf_params().await?,
			// Unused by HKDF descriptors.
			_ => None,
		};
		Ok(settled.unwrap_or(Argon2Params {
			memory_kib: self.kdf.memory_kib,
			iterations: self.kdf.min_iterations,
			parallelism: self.kdf.parallelism,
		}))
	}

	/// Derive, check and decrypt. Every credential-dependent failure is `InvalidCredentials`.
	///
	/// A method with no enrollment runs the same derivation against a decoy
	/// descriptor and a random KCV, so it fails at the same point as a wrong credential.
	async fn recover(&self, credentials: &Credentials) -> KmsResult<MasterSecret> {
		credentials.validate()?;
		let index = self.index().await?;
		if index.methods.is_empty() {
			return Err(KmsError::NotConfigured);
		}

		let method = credentials.method();
		let record = self.records.get::<EnrollmentRecord>(&enrollment_key(method)).await?;
		if let Some(record) = &record {
			record.check_version()?;
		}

		let kdf = match &record {
			Some(record) => record.kdf.clone(),
			None => KdfDescriptor::fresh(credentials, self.decoy_argon2_params(method).await?),
		};
		let wrapping_key = derive_wrapping_key(credentials, &kdf).await?;

		let decoy_kcv = random_bytes::<KCV_SIZE>();
		let (expected_kcv, expected_id) = match &record {
			Some(record) => (record.kcv.as_slice(), record.credential_id.as_deref()),
			None => (decoy_kcv.as_slice(), credentials.credential_id()),
		};
		let kcv_ok = verify_kcv(&wrapping_key, expected_kcv);
		let id_ok = expected_id == credentials.credential_id();

		let record = match record {
			Some(record) if kcv_ok && id_ok => record,
			_ => {
				warn!(method = %method, "unlock rejected");
				return Err(KmsError::InvalidCredentials);
			}
		};

		let aad = enrollment_aad(record.method, record.credential_id.as_deref());
		if record.aad != aad {
			warn!(method = %method, "enrollment AAD mismatch");
			return Err(KmsError::InvalidCredentials);
		}
		let plaintext =
			open(&wrapping_key, &record.wrapped_secret, &aad).map_err(|_| KmsError::InvalidCredentials)?;
		MasterSecret::from_plaintext(&plaintext).ok_or(KmsError::InvalidCredentials)
	}
}

impl fmt::Debug for MasterSecretManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MasterSecretManager")
			.field("kdf", &self.kdf)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::SystemClock;
	use custody_store::MemoryStore;
	use futures::FutureExt;
	use std::panic::AssertUnwindSafe;

	const PASSPHRASE: &str = "correct horse battery staple";

	fn manager() -> MasterSecretManager {
		MasterSecretManager::new(
			RecordStore::new(Arc::new(MemoryStore::new())),
			KdfConfig::insecure_for_tests(),
			Arc::new(SystemClock),
		)
	}

	async fn enrolled() -> MasterSecretManager {
		let manager = manager();
		manager.setup(&Credentials::passphrase(PASSPHRASE)).await.unwrap();
		wipe_witness::take();
		manager
	}

	fn assert_wiped(wipes: &[(&'static str, [u8; KEY_SIZE])]) {
		assert!(wipes.iter().any(|(kind, _)| *kind == "master_secret"), "{wipes:?}");
		assert!(wipes.iter().any(|(kind, _)| *kind == "mkek"), "{wipes:?}");
		for (kind, bytes) in wipes {
			assert_eq!(bytes, &[0u8; KEY_SIZE], "{kind} was not zeroed");
		}
	}

	fn exploding_operation() -> KmsResult<()> {
		panic!("operation panicked")
	}

	#[tokio::test]
	async fn unlock_recovers_enrolled_secret() {
		let manager = manager();
		let master = MasterSecret::generate();
		manager.enroll(&Credentials::passphrase(PASSPHRASE), Some(&master)).await.unwrap();

		let recovered = manager.unlock(&Credentials::passphrase(PASSPHRASE)).await.unwrap();
		assert_eq!(recovered.expose_secret(), master.expose_secret());
	}

	#[tokio::test]
	async fn status_tracks_enrollments() {
		let manager = manager();
		assert_eq!(manager.status().await.unwrap(), KmsStatus::Uninitialized);
		manager.setup(&Credentials::passphrase(PASSPHRASE)).await.unwrap();
		assert_eq!(
			manager.status().await.unwrap(),
			KmsStatus::Enrolled {
				methods: vec![EnrollmentMethod::Passphrase]
			}
		);
	}

	#[tokio::test]
	async fn second_setup_is_rejected() {
		let manager = enrolled().await;
		let err = manager.setup(&Credentials::passphrase("another passphrase")).await.unwrap_err();
		assert!(matches!(err, KmsError::AlreadyInitialized));
	}

	#[tokio::test]
	async fn unlock_without_enrollment_is_not_configured() {
		let err = manager().unlock(&Credentials::passphrase(PASSPHRASE)).await.unwrap_err();
		assert!(matches!(err, KmsError::NotConfigured));
	}

	#[tokio::test]
	async fn wrong_passphrase_is_invalid_credentials() {
		let manager = enrolled().await;
		let err = manager.unlock(&Credentials::passphrase("incorrect horse")).await.unwrap_err();
		assert!(matches!(err, KmsError::InvalidCredentials));
	}

	#[tokio::test]
	async fn unenrolled_method_fails_like_a_wrong_credential() {
		let manager = enrolled().await;
		let err = manager
			.unlock(&Credentials::passkey_prf("cred-1", vec![4u8; 32]))
			.await
			.unwrap_err();
		assert!(matches!(err, KmsError::InvalidCredentials));
	}

	#[tokio::test]
	async fn gate_credential_id_must_match() {
		let manager = enrolled().await;
		let pepper = vec![8u8; 32];
		manager
			.add_enrollment(
				&Credentials::passphrase(PASSPHRASE),
				&Credentials::passkey_gate("cred-a", pepper.clone()),
			)
			.await
			.unwrap();

		assert!(manager.unlock(&Credentials::passkey_gate("cred-a", pepper.clone())).await.is_ok());
		let err = manager.unlock(&Credentials::passkey_gate("cred-b", pepper)).await.unwrap_err();
		assert!(matches!(err, KmsError::InvalidCredentials));
	}

	#[tokio::test]
	async fn with_unlock_wipes_secrets_on_success() {
		let manager = enrolled().await;
		let outcome = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), |ctx| {
				Box::pin(async move { Ok(ctx.method()) })
			})
			.await
			.unwrap();

		assert_eq!(outcome.result, EnrollmentMethod::Passphrase);
		assert!(outcome.lock_time >= outcome.unlock_time);
		assert_eq!(outcome.duration_ms, (outcome.lock_time - outcome.unlock_time).num_milliseconds());
		assert_wiped(&wipe_witness::take());
	}

	#[tokio::test]
	async fn with_unlock_wipes_secrets_on_error() {
		let manager = enrolled().await;
		let err = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), |_ctx| {
				Box::pin(async move { Err::<(), _>(KmsError::KeyNotFound("kid".into())) })
			})
			.await
			.unwrap_err();

		assert!(matches!(err, KmsError::KeyNotFound(_)));
		assert_wiped(&wipe_witness::take());
	}

	#[tokio::test]
	async fn with_unlock_wipes_secrets_on_panic() {
		let manager = enrolled().await;
		let credentials = Credentials::passphrase(PASSPHRASE);
		let result = AssertUnwindSafe(
			manager.with_unlock(&credentials, |_ctx| Box::pin(async move { exploding_operation() })),
		)
		.catch_unwind()
		.await;

		assert!(result.is_err());
		assert_wiped(&wipe_witness::take());
	}

	#[tokio::test]
	async fn with_unlock_wipes_secrets_on_cancellation() {
		let manager = enrolled().await;
		let credentials = Credentials::passphrase(PASSPHRASE);
		let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

		{
			let unlock = manager.with_unlock(&credentials, move |_ctx| {
				Box::pin(async move {
					let _ = started_tx.send(());
					futures::future::pending::<()>().await;
					Ok(())
				})
			});
			tokio::pin!(unlock);
			tokio::select! {
				_ = &mut unlock => panic!("operation should never complete"),
				_ = started_rx => {}
			}
		}

		assert_wiped(&wipe_witness::take());
	}

	#[tokio::test]
	async fn failed_unlock_never_reaches_operation() {
		let manager = enrolled().await;
		let err = manager
			.with_unlock(&Credentials::passphrase("wrong passphrase"), |_ctx| {
				Box::pin(async move { exploding_operation() })
			})
			.await
			.unwrap_err();
		assert!(matches!(err, KmsError::InvalidCredentials));
	}

	#[tokio::test]
	async fn mkek_is_stable_across_unlocks() {
		let manager = enrolled().await;
		let mut seen = Vec::new();
		for _ in 0..2 {
			let outcome = manager
				.with_unlock(&Credentials::passphrase(PASSPHRASE), |ctx| {
					Box::pin(async move { Ok(*ctx.mkek().expose()) })
				})
				.await
				.unwrap();
			seen.push(outcome.result);
		}
		assert_eq!(seen[0], seen[1]);
	}

	#[tokio::test]
	async fn last_enrollment_cannot_be_removed() {
		let manager = enrolled().await;
		let err = manager
			.remove_enrollment(&Credentials::passphrase(PASSPHRASE), EnrollmentMethod::Passphrase)
			.await
			.unwrap_err();
		assert!(matches!(err, KmsError::LastEnrollment));
	}

	#[tokio::test]
	async fn removed_method_no_longer_unlocks() {
		let manager = enrolled().await;
		let prf = vec![6u8; 32];
		manager
			.add_enrollment(
				&Credentials::passphrase(PASSPHRASE),
				&Credentials::passkey_prf("cred-1", prf.clone()),
			)
			.await
			.unwrap();

		let remaining = manager
			.remove_enrollment(&Credentials::passkey_prf("cred-1", prf), EnrollmentMethod::Passphrase)
			.await
			.unwrap();
		assert_eq!(remaining, vec![EnrollmentMethod::PasskeyPrf]);
		assert!(matches!(
			manager.unlock(&Credentials::passphrase(PASSPHRASE)).await,
			Err(KmsError::InvalidCredentials)
		));
	}

	#[tokio::test]
	async fn calibration_runs_once_and_persists() {
		let kdf = KdfConfig {
			fixed_iterations: None,
			memory_kib: 1024,
			probe_iterations: 1,
			min_iterations: 1,
			max_iterations: 3,
			..KdfConfig::default()
		};
		let records = RecordStore::new(Arc::new(MemoryStore::new()));
		let manager = MasterSecretManager::new(records.clone(), kdf, Arc::new(SystemClock));

		let first = manager.kdf_params().await.unwrap();
		let stored = records.get::<KdfCalibration>(CALIBRATION_KEY).await.unwrap().unwrap();
		assert_eq!(stored.params(), first);
		assert!((1..=3).contains(&first.iterations));
		assert_eq!(manager.kdf_params().await.unwrap(), first);
	}

	#[tokio::test]
	async fn failed_unlock_of_unenrolled_method_writes_nothing() {
		let kdf = KdfConfig {
			fixed_iterations: None,
			memory_kib: 1024,
			probe_iterations: 1,
			min_iterations: 1,
			max_iterations: 3,
			..KdfConfig::default()
		};
		let store = Arc::new(MemoryStore::new());
		let records = RecordStore::new(store.clone());
		let manager = MasterSecretManager::new(records.clone(), kdf, Arc::new(SystemClock));
		manager
			.setup(&Credentials::passkey_prf("cred-1", vec![5u8; 32]))
			.await
			.unwrap();
		let before = store.snapshot().await;

		assert!(matches!(
			manager.unlock(&Credentials::passphrase("some guess here")).await,
			Err(KmsError::InvalidCredentials)
		));
		assert!(records.get::<KdfCalibration>(CALIBRATION_KEY).await.unwrap().is_none());
		assert_eq!(store.snapshot().await, before);
	}

	#[tokio::test]
	async fn enrollment_info_exposes_public_fields_only() {
		let manager = enrolled().await;
		manager
			.add_enrollment(
				&Credentials::passphrase(PASSPHRASE),
				&Credentials::passkey_prf("cred-1", vec![6u8; 32]).with_prf_eval_salt(vec![2u8; 32]),
			)
			.await
			.unwrap();

		let info = manager.enrollment_info(EnrollmentMethod::PasskeyPrf).await.unwrap().unwrap();
		assert_eq!(info.credential_id.as_deref(), Some("cred-1"));
		assert_eq!(info.prf_eval_salt, Some(vec![2u8; 32]));
		assert!(manager.enrollment_info(EnrollmentMethod::PasskeyGate).await.unwrap().is_none());
	}
}
