// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enrollment records and per-method wrapping key derivation.
//!
//! | Method | Derivation | Input |
//! |---|---|---|
//! | `passphrase` | Argon2id, calibrated | passphrase |
//! | `passkey-prf` | HKDF-SHA256 | PRF output |
//! | `passkey-gate` | HKDF-SHA256 | pepper ‖ credential id |

use chrono::{DateTime, Utc};
use custody_crypto::aead::random_bytes;
use custody_crypto::encoding::{b64, b64_opt};
use custody_crypto::kdf::{derive_passphrase_key, hkdf_sha256, SALT_SIZE};
use custody_crypto::{Argon2Params, CanonicalEncoder, Sealed, KEY_SIZE};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::credentials::Credentials;
use crate::error::{KmsError, KmsResult};
use crate::types::{EnrollmentMethod, KMS_VERSION};

pub(crate) const ENROLLMENT_INDEX_KEY: &str = "kms:enrollments";
pub(crate) const CALIBRATION_KEY: &str = "kms:kdf-calibration";

const ENROLLMENT_AAD_DOMAIN: &str = "custody/enrollment";
const PRF_INFO: &[u8] = b"custody/enrollment/passkey-prf/v1";
const GATE_INFO: &[u8] = b"custody/enrollment/passkey-gate/v1";
const HKDF_SALT_SIZE: usize = 32;

pub(crate) fn enrollment_key(method: EnrollmentMethod) -> String {
	format!("kms:enrollment:{method}")
}

/// How the wrapping key of one enrollment is derived. Salts and costs are public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KdfDescriptor {
	#[serde(rename = "argon2id", rename_all = "camelCase")]
	Argon2id {
		#[serde(with = "b64")]
		salt: Vec<u8>,
		memory_kib: u32,
		iterations: u32,
		parallelism: u32,
	},

	#[serde(rename = "hkdf-prf", rename_all = "camelCase")]
	HkdfPrf {
		#[serde(with = "b64")]
		hkdf_salt: Vec<u8>,
		#[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
		prf_eval_salt: Option<Vec<u8>>,
	},

	#[serde(rename = "hkdf-gate", rename_all = "camelCase")]
	HkdfGate {
		#[serde(with = "b64")]
		hkdf_salt: Vec<u8>,
	},
}

impl KdfDescriptor {
	/// Fresh random salts for a new enrollment.
	pub(crate) fn fresh(credentials: &Credentials, params: Argon2Params) -> Self {
		match credentials {
			Credentials::Passphrase { .. } => KdfDescriptor::Argon2id {
				salt: random_bytes::<SALT_SIZE>().to_vec(),
				memory_kib: params.memory_kib,
				iterations: params.iterations,
				parallelism: params.parallelism,
			},
			Credentials::PasskeyPrf { prf_eval_salt, .. } => {
				let mut hkdf_salt = random_bytes::<HKDF_SALT_SIZE>().to_vec();
				while prf_eval_salt.as_deref() == Some(hkdf_salt.as_slice()) {
					hkdf_salt = random_bytes::<HKDF_SALT_SIZE>().to_vec();
				}
				KdfDescriptor::HkdfPrf {
					hkdf_salt,
					prf_eval_salt: prf_eval_salt.clone(),
				}
			}
			Credentials::PasskeyGate { .. } => KdfDescriptor::HkdfGate {
				hkdf_salt: random_bytes::<HKDF_SALT_SIZE>().to_vec(),
			},
		}
	}

	pub fn iterations(&self) -> Option<u32> {
		match self {
			KdfDescriptor::Argon2id { iterations, .. } => Some(*iterations),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
	pub kms_version: u32,
	pub method: EnrollmentMethod,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential_id: Option<String>,
	pub kdf: KdfDescriptor,
	#[serde(with = "b64")]
	pub kcv: Vec<u8>,
	pub wrapped_secret: Sealed,
	#[serde(with = "b64")]
	pub aad: Vec<u8>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl EnrollmentRecord {
	pub(crate) fn check_version(&self) -> KmsResult<()> {
		if self.kms_version != KMS_VERSION {
			return Err(KmsError::UnsupportedVersion {
				record: "enrollment",
				version: self.kms_version,
			});
		}
		Ok(())
	}

	pub fn info(&self) -> EnrollmentInfo {
		EnrollmentInfo {
			method: self.method,
			credential_id: self.credential_id.clone(),
			prf_eval_salt: match &self.kdf {
				KdfDescriptor::HkdfPrf { prf_eval_salt, .. } => prf_eval_salt.clone(),
				_ => None,
			},
			created_at: self.created_at,
			updated_at: self.updated_at,
		}
	}
}

/// The configured methods, in a single record so status needs one read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentIndex {
	pub methods: Vec<EnrollmentMethod>,
}

impl EnrollmentIndex {
	pub(crate) fn insert(&mut self, method: EnrollmentMethod) {
		if !self.methods.contains(&method) {
			self.methods.push(method);
			self.methods.sort();
		}
	}

	pub(crate) fn remove(&mut self, method: EnrollmentMethod) {
		self.methods.retain(|m| *m != method);
	}
}

/// Public parts of an enrollment, for a ceremony layer to prepare an unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentInfo {
	pub method: EnrollmentMethod,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential_id: Option<String>,
	#[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
	pub prf_eval_salt: Option<Vec<u8>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSummary {
	pub method: EnrollmentMethod,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kdf_iterations: Option<u32>,
	pub created_at: DateTime<Utc>,
}

/// Persisted once per installation; existing enrollments keep their own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfCalibration {
	pub iterations: u32,
	pub memory_kib: u32,
	pub parallelism: u32,
	pub measured_ms: u64,
	pub calibrated_at: DateTime<Utc>,
}

impl KdfCalibration {
	pub fn params(&self) -> Argon2Params {
		Argon2Params {
			memory_kib: self.memory_kib,
			iterations: self.iterations,
			parallelism: self.parallelism,
		}
	}
}

pub(crate) fn enrollment_aad(method: EnrollmentMethod, credential_id: Option<&str>) -> Vec<u8> {
	CanonicalEncoder::new(ENROLLMENT_AAD_DOMAIN)
		.u64("kmsVersion", u64::from(KMS_VERSION))
		.str("method", method.as_str())
		.opt_str("credentialId", credential_id)
		.finish()
}

/// Derive the wrapping key for `credentials` under `kdf`.
///
/// Argon2id runs on the blocking pool. A descriptor that does not belong to
/// the credential's method is a corrupted record.
pub(crate) async fn derive_wrapping_key(
	credentials: &Credentials,
	kdf: &KdfDescriptor,
) -> KmsResult<Zeroizing<[u8; KEY_SIZE]>> {
	match (credentials, kdf) {
		(
			Credentials::Passphrase { passphrase },
			KdfDescriptor::Argon2id {
				salt,
				memory_kib,
				iterations,
				parallelism,
			},
		) => {
			let passphrase = Zeroizing::new(passphrase.expose().as_bytes().to_vec());
			let salt = salt.clone();
			let params = Argon2Params {
				memory_kib: *memory_kib,
				iterations: *iterations,
				parallelism: *parallelism,
			};
			let key = tokio::task::spawn_blocking(move || derive_passphrase_key(&passphrase, &salt, &params)).await??;
			Ok(key)
		}
		(Credentials::PasskeyPrf { prf_output, .. }, KdfDescriptor::HkdfPrf { hkdf_salt, .. }) => {
			Ok(hkdf_sha256(prf_output.expose(), hkdf_salt, PRF_INFO)?)
		}
		(
			Credentials::PasskeyGate {
				credential_id,
				pepper,
			},
			KdfDescriptor::HkdfGate { hkdf_salt },
		) => {
			let mut ikm = Zeroizing::new(Vec::with_capacity(pepper.len() + credential_id.len()));
			ikm.extend_from_slice(pepper.expose());
			ikm.extend_from_slice(credential_id.as_bytes());
			Ok(hkdf_sha256(&ikm, hkdf_salt, GATE_INFO)?)
		}
		_ => Err(KmsError::Internal(format!(
			"enrollment descriptor does not match method {}",
			credentials.method()
		))),
	}
}
