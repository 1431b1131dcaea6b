// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key check values.
//!
//! A KCV is `HMAC-SHA256(wrapping_key, KCV_LABEL)`. It lets an unlock reject a
//! wrong credential before any decryption is attempted, and it reveals nothing
//! about the wrapping key beyond equality.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::aead::KEY_SIZE;
use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Fixed, versioned KCV label.
pub const KCV_LABEL: &[u8] = b"custody/kcv/v1";

pub const KCV_SIZE: usize = 32;

fn kcv_mac(wrapping_key: &[u8; KEY_SIZE]) -> CryptoResult<HmacSha256> {
	let mut mac = HmacSha256::new_from_slice(wrapping_key)
		.map_err(|e| CryptoError::KeyDerivation(format!("HMAC key rejected: {e}")))?;
	mac.update(KCV_LABEL);
	Ok(mac)
}

pub fn compute_kcv(wrapping_key: &[u8; KEY_SIZE]) -> CryptoResult<[u8; KCV_SIZE]> {
	Ok(kcv_mac(wrapping_key)?.finalize().into_bytes().into())
}

/// Constant-time KCV check.
pub fn verify_kcv(wrapping_key: &[u8; KEY_SIZE], expected: &[u8]) -> bool {
	match kcv_mac(wrapping_key) {
		Ok(mac) => mac.verify_slice(expected).is_ok(),
		Err(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::aead::generate_key;

	#[test]
	fn kcv_verifies_for_same_key() {
		let key = generate_key();
		let kcv = compute_kcv(&key).unwrap();
		assert!(verify_kcv(&key, &kcv));
	}

	#[test]
	fn kcv_rejects_other_key() {
		let kcv = compute_kcv(&generate_key()).unwrap();
		assert!(!verify_kcv(&generate_key(), &kcv));
	}

	#[test]
	fn kcv_rejects_truncated_value() {
		let key = generate_key();
		let kcv = compute_kcv(&key).unwrap();
		assert!(!verify_kcv(&key, &kcv[..16]));
	}

	#[test]
	fn kcv_is_deterministic() {
		let key = [9u8; KEY_SIZE];
		assert_eq!(compute_kcv(&key).unwrap(), compute_kcv(&key).unwrap());
	}
}
