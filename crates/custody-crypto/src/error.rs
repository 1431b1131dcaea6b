// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for cryptographic primitives.

use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("encryption failed: {0}")]
	Encryption(String),

	/// Tag, AAD and key mismatches are indistinguishable on purpose.
	#[error("decryption failed")]
	Decryption,

	#[error("invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("key derivation failed: {0}")]
	KeyDerivation(String),

	#[error("invalid signature")]
	InvalidSignature,

	#[error("invalid public key: {0}")]
	InvalidPublicKey(String),

	#[error("encoding error: {0}")]
	Encoding(String),
}
