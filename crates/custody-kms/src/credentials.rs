// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential material as delivered by the ceremony layer.
//!
//! The core never sees how the bytes were produced. It only checks that they
//! have the shape the declared method requires before deriving anything.

use custody_common_secret::{SecretBytes, SecretString};
use custody_crypto::aead::random_bytes;
use custody_crypto::encoding::b64_opt;
use serde::{Deserialize, Serialize};

use crate::error::{KmsError, KmsResult};
use crate::types::EnrollmentMethod;

pub const MIN_PASSPHRASE_CHARS: usize = 8;
pub const PRF_OUTPUT_SIZE: usize = 32;
pub const MIN_PEPPER_SIZE: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Credentials {
	#[serde(rename = "passphrase")]
	Passphrase { passphrase: SecretString },

	#[serde(rename = "passkey-prf", rename_all = "camelCase")]
	PasskeyPrf {
		credential_id: String,
		#[serde(with = "secret_b64")]
		prf_output: SecretBytes,
		/// Salt the authenticator evaluated the PRF with. Public.
		#[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
		prf_eval_salt: Option<Vec<u8>>,
	},

	#[serde(rename = "passkey-gate", rename_all = "camelCase")]
	PasskeyGate {
		credential_id: String,
		#[serde(with = "secret_b64")]
		pepper: SecretBytes,
	},
}

impl Credentials {
	pub fn passphrase(passphrase: impl Into<String>) -> Self {
		Credentials::Passphrase {
			passphrase: SecretString::new(passphrase.into()),
		}
	}

	pub fn passkey_prf(credential_id: impl Into<String>, prf_output: Vec<u8>) -> Self {
		Credentials::PasskeyPrf {
			credential_id: credential_id.into(),
			prf_output: SecretBytes::new(prf_output),
			prf_eval_salt: None,
		}
	}

	pub fn passkey_gate(credential_id: impl Into<String>, pepper: Vec<u8>) -> Self {
		Credentials::PasskeyGate {
			credential_id: credential_id.into(),
			pepper: SecretBytes::new(pepper),
		}
	}

	/// Attach the PRF evaluation salt. Ignored for other methods.
	pub fn with_prf_eval_salt(mut self, salt: Vec<u8>) -> Self {
		if let Credentials::PasskeyPrf { prf_eval_salt, .. } = &mut self {
			*prf_eval_salt = Some(salt);
		}
		self
	}

	pub fn method(&self) -> EnrollmentMethod {
		match self {
			Credentials::Passphrase { .. } => EnrollmentMethod::Passphrase,
			Credentials::PasskeyPrf { .. } => EnrollmentMethod::PasskeyPrf,
			Credentials::PasskeyGate { .. } => EnrollmentMethod::PasskeyGate,
		}
	}

	pub fn credential_id(&self) -> Option<&str> {
		match self {
			Credentials::Passphrase { .. } => None,
			Credentials::PasskeyPrf { credential_id, .. } | Credentials::PasskeyGate { credential_id, .. } => {
				Some(credential_id)
			}
		}
	}

	/// Check the material has the entropy shape its method requires.
	pub fn validate(&self) -> KmsResult<()> {
		match self {
			Credentials::Passphrase { passphrase } => {
				if passphrase.expose().chars().count() < MIN_PASSPHRASE_CHARS {
					return Err(KmsError::InvalidRequest(format!(
						"passphrase must be at least {MIN_PASSPHRASE_CHARS} characters"
					)));
				}
			}
			Credentials::PasskeyPrf {
				credential_id,
				prf_output,
				..
			} => {
				require_credential_id(credential_id)?;
				if prf_output.len() != PRF_OUTPUT_SIZE {
					return Err(KmsError::InvalidRequest(format!(
						"PRF output must be exactly {PRF_OUTPUT_SIZE} bytes, got {}",
						prf_output.len()
					)));
				}
			}
			Credentials::PasskeyGate { credential_id, pepper } => {
				require_credential_id(credential_id)?;
				if pepper.len() < MIN_PEPPER_SIZE {
					return Err(KmsError::InvalidRequest(format!(
						"gate pepper must be at least {MIN_PEPPER_SIZE} bytes, got {}",
						pepper.len()
					)));
				}
			}
		}
		Ok(())
	}
}

fn require_credential_id(credential_id: &str) -> KmsResult<()> {
	if credential_id.trim().is_empty() {
		return Err(KmsError::InvalidRequest("credentialId must not be empty".into()));
	}
	Ok(())
}

/// A fresh random pepper for a gate enrollment.
///
/// The ceremony layer stores it behind its authentication gate and presents
/// it back as [`Credentials::PasskeyGate`].
pub fn gate_pepper() -> SecretBytes {
	SecretBytes::new(random_bytes::<MIN_PEPPER_SIZE>().to_vec())
}

/// Base64url transport for binary credential material. Serialises redacted.
mod secret_b64 {
	use custody_common_secret::{SecretBytes, REDACTED};
	use custody_crypto::encoding::b64url_decode;
	use serde::{Deserialize, Deserializer, Serializer};
	use zeroize::Zeroizing;

	pub fn serialize<S>(_: &SecretBytes, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<SecretBytes, D::Error>
	where
		D: Deserializer<'de>,
	{
		let encoded = Zeroizing::new(String::deserialize(deserializer)?);
		let bytes = b64url_decode(&encoded).map_err(serde::de::Error::custom)?;
		Ok(SecretBytes::new(bytes))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use custody_crypto::encoding::b64url_encode;

	#[test]
	fn short_passphrase_is_rejected() {
		assert!(matches!(
			Credentials::passphrase("short").validate(),
			Err(KmsError::InvalidRequest(_))
		));
		assert!(Credentials::passphrase("correct horse battery staple").validate().is_ok());
	}

	#[test]
	fn passphrase_length_counts_characters() {
		// 8 characters, 16 bytes
		assert!(Credentials::passphrase("ééééèèèè").validate().is_ok());
	}

	#[test]
	fn prf_output_must_be_32_bytes() {
		assert!(Credentials::passkey_prf("cred", vec![1u8; 31]).validate().is_err());
		assert!(Credentials::passkey_prf("cred", vec![1u8; 33]).validate().is_err());
		assert!(Credentials::passkey_prf("cred", vec![1u8; 32]).validate().is_ok());
		assert!(Credentials::passkey_prf("", vec![1u8; 32]).validate().is_err());
	}

	#[test]
	fn pepper_must_be_at_least_32_bytes() {
		assert!(Credentials::passkey_gate("cred", vec![1u8; 16]).validate().is_err());
		assert!(Credentials::passkey_gate("cred", vec![1u8; 64]).validate().is_ok());
		assert_eq!(gate_pepper().len(), MIN_PEPPER_SIZE);
	}

	#[test]
	fn deserializes_tagged_json() {
		let json = serde_json::json!({
			"method": "passkey-prf",
			"credentialId": "cred-1",
			"prfOutput": b64url_encode([9u8; 32]),
			"prfEvalSalt": b64url_encode([1u8; 32]),
		});
		let credentials: Credentials = serde_json::from_value(json).unwrap();
		assert_eq!(credentials.method(), EnrollmentMethod::PasskeyPrf);
		assert_eq!(credentials.credential_id(), Some("cred-1"));
		assert!(credentials.validate().is_ok());
	}

	#[test]
	fn material_never_serializes() {
		let credentials = Credentials::passkey_gate("cred", vec![0xAB; 32]);
		let json = serde_json::to_string(&credentials).unwrap();
		assert!(json.contains("[REDACTED]"));
		assert!(!json.contains(&b64url_encode([0xAB; 32])));
		assert!(!format!("{credentials:?}").contains("171"));
	}
}
