// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sha2::{Digest, Sha256};

pub const HASH_SIZE: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
	Sha256::digest(data).into()
}

/// `SHA-256(canonical || prev_hash)`, the link between consecutive audit entries.
pub fn chain_hash(canonical: &[u8], prev_hash: &[u8; HASH_SIZE]) -> [u8; HASH_SIZE] {
	let mut hasher = Sha256::new();
	hasher.update(canonical);
	hasher.update(prev_hash);
	hasher.finalize().into()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sha256_known_vector() {
		assert_eq!(
			hex::encode(sha256(b"abc")),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);
	}

	#[test]
	fn chain_hash_depends_on_previous() {
		let a = chain_hash(b"entry", &[0u8; 32]);
		let b = chain_hash(b"entry", &[1u8; 32]);
		assert_ne!(a, b);
	}

	#[test]
	fn chain_hash_is_concatenation() {
		let mut joined = b"entry".to_vec();
		joined.extend_from_slice(&[7u8; 32]);
		assert_eq!(chain_hash(b"entry", &[7u8; 32]), sha256(&joined));
	}
}
