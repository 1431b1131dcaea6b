// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application signing keys, wrapped at rest under the MKEK.
//!
//! An [`ApplicationKey`] is an opaque handle: its private half leaves this
//! module only as AES-GCM ciphertext or as a signature. Every ciphertext is
//! bound by AAD to the metadata of the record it lives in, so moving a
//! ciphertext between records, or editing the metadata beside it, fails
//! decryption.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use custody_crypto::aead::{open, seal};
use custody_crypto::encoding::{b64, b64url_encode};
use custody_crypto::signing::{
	generate_signing_key, jwk_thumbprint, sign, sign_jwt, signing_key_from_seed, signing_key_seed, ALG_EDDSA,
};
use custody_crypto::{CanonicalEncoder, CryptoError, Sealed, KEY_SIZE};
use custody_store::RecordStore;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::{KmsError, KmsResult};
use crate::master::Mkek;
use crate::types::{ALG_VERSION, KMS_VERSION};

const WRAPPED_KEY_AAD_DOMAIN: &str = "custody/wrapped-key";

fn key_record_key(kid: &str) -> String {
	format!("kms:key:{kid}")
}

fn current_key_pointer(purpose: &str) -> String {
	format!("kms:current-key:{purpose}")
}

// =============================================================================
// ApplicationKey
// =============================================================================

/// An unwrapped application key. Not `Clone`, not `Serialize`; `Debug` shows only the kid.
pub struct ApplicationKey {
	kid: String,
	key: SigningKey,
}

impl ApplicationKey {
	pub(crate) fn generate() -> Self {
		let key = generate_signing_key();
		let kid = jwk_thumbprint(&key.verifying_key());
		Self { kid, key }
	}

	/// Rebuild from a decrypted seed, checking it matches the kid it was stored under.
	fn from_seed(seed: &[u8], expected_kid: &str) -> KmsResult<Self> {
		let key = signing_key_from_seed(seed)?;
		let kid = jwk_thumbprint(&key.verifying_key());
		if kid != expected_kid {
			return Err(KmsError::Crypto(CryptoError::Decryption));
		}
		Ok(Self { kid, key })
	}

	pub fn kid(&self) -> &str {
		&self.kid
	}

	pub fn verifying_key(&self) -> VerifyingKey {
		self.key.verifying_key()
	}

	pub fn sign(&self, message: &[u8]) -> [u8; 64] {
		sign(&self.key, message)
	}

	pub(crate) fn sign_jwt<C: Serialize>(&self, claims: &C) -> KmsResult<String> {
		Ok(sign_jwt(&self.key, &self.kid, claims)?)
	}

	/// Seal the private half under an arbitrary key, for lease session wrapping.
	pub(crate) fn seal_under(&self, key: &[u8; KEY_SIZE], aad: &[u8]) -> KmsResult<Sealed> {
		let seed = signing_key_seed(&self.key);
		Ok(seal(key, seed.as_slice(), aad)?)
	}

	pub(crate) fn open_under(key: &[u8; KEY_SIZE], sealed: &Sealed, aad: &[u8], expected_kid: &str) -> KmsResult<Self> {
		let seed = open(key, sealed, aad)?;
		Self::from_seed(&seed, expected_kid)
	}
}

impl fmt::Debug for ApplicationKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApplicationKey")
			.field("kid", &self.kid)
			.field("key", &"[REDACTED]")
			.finish()
	}
}

// =============================================================================
// Records
// =============================================================================

/// Metadata bound into a wrapped key's AAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
	pub kid: String,
	pub algorithm: String,
	pub purpose: String,
	pub created_at: DateTime<Utc>,
}

impl KeyMetadata {
	pub fn aad(&self) -> Vec<u8> {
		CanonicalEncoder::new(WRAPPED_KEY_AAD_DOMAIN)
			.u64("kmsVersion", u64::from(KMS_VERSION))
			.u64("algVersion", u64::from(ALG_VERSION))
			.str("kid", &self.kid)
			.str("algorithm", &self.algorithm)
			.str("purpose", &self.purpose)
			.i64("createdAt", self.created_at.timestamp_millis())
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
	pub kms_version: u32,
	pub alg_version: u32,
	pub kid: String,
	pub algorithm: String,
	pub purpose: String,
	pub created_at: DateTime<Utc>,
	#[serde(with = "b64")]
	pub wrapped_private_key: Vec<u8>,
	#[serde(with = "custody_crypto::encoding::b64_array")]
	pub iv: [u8; custody_crypto::IV_SIZE],
	#[serde(with = "b64")]
	pub aad: Vec<u8>,
	#[serde(with = "b64")]
	pub public_key: Vec<u8>,
}

impl WrappedKey {
	fn check_version(&self) -> KmsResult<()> {
		if self.kms_version != KMS_VERSION {
			return Err(KmsError::UnsupportedVersion {
				record: "wrapped key",
				version: self.kms_version,
			});
		}
		if self.alg_version != ALG_VERSION {
			return Err(KmsError::UnsupportedVersion {
				record: "wrapped key algorithm",
				version: self.alg_version,
			});
		}
		Ok(())
	}

	pub fn metadata(&self) -> KeyMetadata {
		KeyMetadata {
			kid: self.kid.clone(),
			algorithm: self.algorithm.clone(),
			purpose: self.purpose.clone(),
			created_at: self.created_at,
		}
	}

	pub fn public_info(&self) -> PublicKeyInfo {
		PublicKeyInfo {
			kid: self.kid.clone(),
			algorithm: self.algorithm.clone(),
			purpose: self.purpose.clone(),
			public_key: b64url_encode(&self.public_key),
			created_at: self.created_at,
		}
	}
}

/// The exportable half of an application key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyInfo {
	pub kid: String,
	pub algorithm: String,
	pub purpose: String,
	/// Base64url raw Ed25519 public key.
	pub public_key: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentKeyPointer {
	kid: String,
	updated_at: DateTime<Utc>,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct WrappingService {
	records: RecordStore,
	clock: Arc<dyn Clock>,
}

impl WrappingService {
	pub fn new(records: RecordStore, clock: Arc<dyn Clock>) -> Self {
		Self { records, clock }
	}

	/// Seal `key` under the MKEK with AAD built from its metadata and persist it.
	#[instrument(skip(self, key, mkek), fields(kid = %key.kid()))]
	pub async fn wrap(&self, key: &ApplicationKey, mkek: &Mkek, purpose: &str) -> KmsResult<WrappedKey> {
		if purpose.trim().is_empty() {
			return Err(KmsError::InvalidRequest("purpose must not be empty".into()));
		}
		let metadata = KeyMetadata {
			kid: key.kid.clone(),
			algorithm: ALG_EDDSA.to_string(),
			purpose: purpose.to_string(),
			created_at: self.clock.now(),
		};
		let aad = metadata.aad();
		let sealed = key.seal_under(mkek.expose(), &aad)?;

		let record = WrappedKey {
			kms_version: KMS_VERSION,
			alg_version: ALG_VERSION,
			kid: metadata.kid,
			algorithm: metadata.algorithm,
			purpose: metadata.purpose,
			created_at: metadata.created_at,
			wrapped_private_key: sealed.ciphertext,
			iv: sealed.iv,
			aad,
			public_key: key.verifying_key().to_bytes().to_vec(),
		};
		self.records.put(&key_record_key(&record.kid), &record).await?;
		Ok(record)
	}

	/// Load and decrypt a wrapped key. The AAD is rebuilt from the stored metadata.
	#[instrument(skip(self, mkek))]
	pub async fn unwrap(&self, kid: &str, mkek: &Mkek) -> KmsResult<ApplicationKey> {
		let record = self.wrapped_key(kid).await?;
		let aad = record.metadata().aad();
		if record.aad != aad {
			return Err(KmsError::Crypto(CryptoError::Decryption));
		}
		let sealed = Sealed {
			ciphertext: record.wrapped_private_key.clone(),
			iv: record.iv,
		};
		ApplicationKey::open_under(mkek.expose(), &sealed, &aad, &record.kid)
	}

	/// Generate a key for `purpose`, wrap it, and make it the purpose's current key.
	///
	/// Leases bound to the previous key become stale.
	#[instrument(skip(self, mkek))]
	pub async fn generate(&self, purpose: &str, mkek: &Mkek) -> KmsResult<WrappedKey> {
		let key = ApplicationKey::generate();
		let record = self.wrap(&key, mkek, purpose).await?;
		let previous = self.current_kid(purpose).await?;
		self.records
			.put(
				&current_key_pointer(purpose),
				&CurrentKeyPointer {
					kid: record.kid.clone(),
					updated_at: self.clock.now(),
				},
			)
			.await?;
		info!(kid = %record.kid, previous = ?previous, purpose, "generated application key");
		Ok(record)
	}

	pub async fn wrapped_key(&self, kid: &str) -> KmsResult<WrappedKey> {
		let record = self
			.records
			.get::<WrappedKey>(&key_record_key(kid))
			.await?
			.ok_or_else(|| KmsError::KeyNotFound(kid.to_string()))?;
		record.check_version()?;
		Ok(record)
	}

	pub async fn public_key(&self, kid: &str) -> KmsResult<PublicKeyInfo> {
		Ok(self.wrapped_key(kid).await?.public_info())
	}

	pub async fn current_kid(&self, purpose: &str) -> KmsResult<Option<String>> {
		Ok(self
			.records
			.get::<CurrentKeyPointer>(&current_key_pointer(purpose))
			.await?
			.map(|pointer| pointer.kid))
	}

	/// The current kid for `purpose`, or `KeyNotFound`.
	pub async fn require_current_kid(&self, purpose: &str) -> KmsResult<String> {
		self.current_kid(purpose)
			.await?
			.ok_or_else(|| KmsError::KeyNotFound(format!("no current key for purpose {purpose}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::{ManualClock, SystemClock};
	use crate::credentials::Credentials;
	use crate::master::MasterSecretManager;
	use custody_config::KdfConfig;
	use custody_crypto::signing::verify;
	use custody_store::MemoryStore;
	use std::sync::Arc;

	const PASSPHRASE: &str = "correct horse battery staple";

	async fn setup() -> (MasterSecretManager, WrappingService, RecordStore) {
		let records = RecordStore::new(Arc::new(MemoryStore::new()));
		let manager = MasterSecretManager::new(records.clone(), KdfConfig::insecure_for_tests(), Arc::new(SystemClock));
		manager.setup(&Credentials::passphrase(PASSPHRASE)).await.unwrap();
		(manager, WrappingService::new(records.clone(), Arc::new(SystemClock)), records)
	}

	#[tokio::test]
	async fn wrap_unwrap_preserves_signing_ability() {
		let (manager, wrapping, _) = setup().await;
		let service = wrapping.clone();
		let outcome = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move {
					let key = ApplicationKey::generate();
					let wrapped = service.wrap(&key, ctx.mkek(), "signing").await?;
					let unwrapped = service.unwrap(&wrapped.kid, ctx.mkek()).await?;
					Ok((wrapped, unwrapped.sign(b"artifact"), key.verifying_key()))
				})
			})
			.await
			.unwrap();

		let (wrapped, signature, original) = outcome.result;
		assert!(verify(&original, b"artifact", &signature).is_ok());
		assert_eq!(wrapped.public_key, original.to_bytes().to_vec());
		assert_eq!(wrapping.public_key(&wrapped.kid).await.unwrap().kid, wrapped.kid);
	}

	#[tokio::test]
	async fn swapped_aad_fails_to_unwrap() {
		let (manager, wrapping, records) = setup().await;
		let service = wrapping.clone();
		let (a, b) = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move {
					let a = service.generate("signing", ctx.mkek()).await?;
					let b = service.generate("encryption", ctx.mkek()).await?;
					Ok((a, b))
				})
			})
			.await
			.unwrap()
			.result;

		let mut swapped_a = a.clone();
		let mut swapped_b = b.clone();
		std::mem::swap(&mut swapped_a.aad, &mut swapped_b.aad);
		records.put(&key_record_key(&a.kid), &swapped_a).await.unwrap();
		records.put(&key_record_key(&b.kid), &swapped_b).await.unwrap();

		for kid in [a.kid.clone(), b.kid.clone()] {
			let service = wrapping.clone();
			let err = manager
				.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
					Box::pin(async move { service.unwrap(&kid, ctx.mkek()).await.map(|_| ()) })
				})
				.await
				.unwrap_err();
			assert!(matches!(err, KmsError::Crypto(CryptoError::Decryption)));
		}
	}

	#[tokio::test]
	async fn swapped_ciphertext_fails_to_unwrap() {
		let (manager, wrapping, records) = setup().await;
		let service = wrapping.clone();
		let (a, b) = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move {
					let a = service.generate("signing", ctx.mkek()).await?;
					let b = service.generate("signing", ctx.mkek()).await?;
					Ok((a, b))
				})
			})
			.await
			.unwrap()
			.result;

		let mut moved = a.clone();
		moved.wrapped_private_key = b.wrapped_private_key.clone();
		moved.iv = b.iv;
		records.put(&key_record_key(&a.kid), &moved).await.unwrap();

		let service = wrapping.clone();
		let kid = a.kid.clone();
		let err = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move { service.unwrap(&kid, ctx.mkek()).await.map(|_| ()) })
			})
			.await
			.unwrap_err();
		assert!(matches!(err, KmsError::Crypto(CryptoError::Decryption)));
	}

	#[tokio::test]
	async fn generate_moves_current_pointer() {
		let (manager, wrapping, _) = setup().await;
		let service = wrapping.clone();
		let (first, second) = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move {
					let first = service.generate("signing", ctx.mkek()).await?;
					let second = service.generate("signing", ctx.mkek()).await?;
					Ok((first, second))
				})
			})
			.await
			.unwrap()
			.result;

		assert_ne!(first.kid, second.kid);
		assert_eq!(wrapping.current_kid("signing").await.unwrap(), Some(second.kid));
		assert!(wrapping.current_kid("encryption").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn key_timestamps_come_from_the_clock() {
		let (manager, _, records) = setup().await;
		let at = DateTime::parse_from_rfc3339("2030-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
		let wrapping = WrappingService::new(records.clone(), Arc::new(ManualClock::new(at)));
		let service = wrapping.clone();
		let record = manager
			.with_unlock(&Credentials::passphrase(PASSPHRASE), move |ctx| {
				Box::pin(async move { service.generate("signing", ctx.mkek()).await })
			})
			.await
			.unwrap()
			.result;

		assert_eq!(record.created_at, at);
		assert_eq!(wrapping.wrapped_key(&record.kid).await.unwrap().created_at, at);
		let pointer = records
			.get::<CurrentKeyPointer>(&current_key_pointer("signing"))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(pointer.updated_at, at);
	}

	#[tokio::test]
	async fn missing_key_is_key_not_found() {
		let (_, wrapping, _) = setup().await;
		assert!(matches!(
			wrapping.public_key("nope").await,
			Err(KmsError::KeyNotFound(_))
		));
	}

	#[test]
	fn debug_hides_private_key() {
		let key = ApplicationKey::generate();
		let debug = format!("{key:?}");
		assert!(debug.contains(key.kid()));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn metadata_aad_binds_purpose() {
		let now = Utc::now();
		let a = KeyMetadata {
			kid: "kid".into(),
			algorithm: ALG_EDDSA.into(),
			purpose: "signing".into(),
			created_at: now,
		};
		let b = KeyMetadata {
			purpose: "encryption".into(),
			..a.clone()
		};
		assert_ne!(a.aad(), b.aad());
	}
}
