// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM sealing with additional authenticated data.
//!
//! Every ciphertext in the custody core is bound to the context it belongs to
//! through AAD. There is intentionally no AAD-less variant.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng, Payload},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM IV in bytes.
pub const IV_SIZE: usize = 12;

/// Ciphertext with the IV it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sealed {
	#[serde(with = "encoding::b64")]
	pub ciphertext: Vec<u8>,
	#[serde(with = "encoding::b64_array")]
	pub iv: [u8; IV_SIZE],
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	random_secret::<KEY_SIZE>()
}

/// Fill a zeroizing buffer with `N` random bytes.
pub fn random_secret<const N: usize>() -> Zeroizing<[u8; N]> {
	let mut bytes = Zeroizing::new([0u8; N]);
	OsRng.fill_bytes(bytes.as_mut());
	bytes
}

/// `N` random public bytes, for salts and identifiers.
pub fn random_bytes<const N: usize>() -> [u8; N] {
	let mut bytes = [0u8; N];
	OsRng.fill_bytes(&mut bytes);
	bytes
}

/// Generate a random IV.
///
/// 96-bit random IVs from OsRng. Keys in the custody core seal at most a
/// handful of values each, far below the birthday bound for random IVs.
pub fn generate_iv() -> [u8; IV_SIZE] {
	random_bytes::<IV_SIZE>()
}

/// Seal `plaintext` under `key`, binding `aad`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Sealed> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let iv = generate_iv();
	let ciphertext = cipher
		.encrypt(
			Nonce::from_slice(&iv),
			Payload {
				msg: plaintext,
				aad,
			},
		)
		.map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

	Ok(Sealed { ciphertext, iv })
}

/// Open a sealed value. Any key, IV, AAD or tag mismatch yields [`CryptoError::Decryption`].
pub fn open(key: &[u8; KEY_SIZE], sealed: &Sealed, aad: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let plaintext = cipher
		.decrypt(
			Nonce::from_slice(&sealed.iv),
			Payload {
				msg: sealed.ciphertext.as_slice(),
				aad,
			},
		)
		.map_err(|_| CryptoError::Decryption)?;

	Ok(Zeroizing::new(plaintext))
}

/// Open a sealed 32-byte key.
pub fn open_key(
	key: &[u8; KEY_SIZE],
	sealed: &Sealed,
	aad: &[u8],
) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
	let plaintext = open(key, sealed, aad)?;
	if plaintext.len() != KEY_SIZE {
		return Err(CryptoError::InvalidKeySize {
			expected: KEY_SIZE,
			actual: plaintext.len(),
		});
	}

	let mut out = Zeroizing::new([0u8; KEY_SIZE]);
	out.copy_from_slice(&plaintext);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn key_generation_produces_unique_keys() {
		let key1 = generate_key();
		let key2 = generate_key();
		assert_ne!(key1.as_slice(), key2.as_slice());
	}

	#[test]
	fn seal_open_roundtrip() {
		let key = generate_key();
		let sealed = seal(&key, b"master secret", b"context").unwrap();
		let opened = open(&key, &sealed, b"context").unwrap();
		assert_eq!(opened.as_slice(), b"master secret");
	}

	#[test]
	fn wrong_aad_fails() {
		let key = generate_key();
		let sealed = seal(&key, b"master secret", b"context-a").unwrap();
		let result = open(&key, &sealed, b"context-b");
		assert!(matches!(result, Err(CryptoError::Decryption)));
	}

	#[test]
	fn wrong_key_fails() {
		let sealed = seal(&generate_key(), b"value", b"aad").unwrap();
		let result = open(&generate_key(), &sealed, b"aad");
		assert!(matches!(result, Err(CryptoError::Decryption)));
	}

	#[test]
	fn tampered_iv_fails() {
		let key = generate_key();
		let mut sealed = seal(&key, b"value", b"aad").unwrap();
		sealed.iv[0] ^= 0x01;
		assert!(open(&key, &sealed, b"aad").is_err());
	}

	#[test]
	fn open_key_rejects_wrong_length() {
		let key = generate_key();
		let sealed = seal(&key, &[1u8; 16], b"aad").unwrap();
		let result = open_key(&key, &sealed, b"aad");
		assert!(matches!(
			result,
			Err(CryptoError::InvalidKeySize {
				expected: 32,
				actual: 16
			})
		));
	}

	#[test]
	fn sealed_serializes_as_base64url() {
		let key = generate_key();
		let sealed = seal(&key, b"value", b"aad").unwrap();
		let json = serde_json::to_value(&sealed).unwrap();
		assert!(json["ciphertext"].is_string());
		assert!(json["iv"].is_string());

		let back: Sealed = serde_json::from_value(json).unwrap();
		assert_eq!(back, sealed);
	}

	proptest! {
		#[test]
		fn prop_tampered_ciphertext_fails(
			plaintext in proptest::collection::vec(any::<u8>(), 1..512),
			tamper_idx in 0usize..1024usize,
		) {
			let key = generate_key();
			let mut sealed = seal(&key, &plaintext, b"aad").unwrap();
			let idx = tamper_idx % sealed.ciphertext.len();
			sealed.ciphertext[idx] ^= 0xFF;

			prop_assert!(open(&key, &sealed, b"aad").is_err());
		}

		#[test]
		fn prop_aad_is_bound(
			aad_a in proptest::collection::vec(any::<u8>(), 0..64),
			aad_b in proptest::collection::vec(any::<u8>(), 0..64),
		) {
			prop_assume!(aad_a != aad_b);
			let key = generate_key();
			let sealed = seal(&key, b"payload", &aad_a).unwrap();
			prop_assert!(open(&key, &sealed, &aad_b).is_err());
		}
	}
}
