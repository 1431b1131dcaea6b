// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ed25519 signing, content-derived key ids and compact EdDSA JWTs.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha256;

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const PRIVATE_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// JOSE algorithm name for Ed25519.
pub const ALG_EDDSA: &str = "EdDSA";

pub fn generate_signing_key() -> SigningKey {
	SigningKey::generate(&mut OsRng)
}

/// Rebuild a signing key from its 32-byte seed.
pub fn signing_key_from_seed(seed: &[u8]) -> CryptoResult<SigningKey> {
	if seed.len() != PRIVATE_KEY_SIZE {
		return Err(CryptoError::InvalidKeySize {
			expected: PRIVATE_KEY_SIZE,
			actual: seed.len(),
		});
	}
	let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
	bytes.copy_from_slice(seed);
	Ok(SigningKey::from_bytes(&bytes))
}

/// The signing key seed in a zeroizing buffer, for sealing at rest.
pub fn signing_key_seed(key: &SigningKey) -> Zeroizing<[u8; PRIVATE_KEY_SIZE]> {
	Zeroizing::new(key.to_bytes())
}

pub fn verifying_key_from_bytes(bytes: &[u8]) -> CryptoResult<VerifyingKey> {
	let bytes: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
		CryptoError::InvalidPublicKey(format!(
			"expected {PUBLIC_KEY_SIZE} bytes, got {}",
			bytes.len()
		))
	})?;
	VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// RFC 7638 JWK thumbprint of an Ed25519 public key, base64url encoded.
///
/// Used as the key id, so ids are derived from key content.
pub fn jwk_thumbprint(key: &VerifyingKey) -> String {
	// Members in lexicographic order with no whitespace, as RFC 7638 requires.
	let canonical_jwk = format!(
		r#"{{"crv":"Ed25519","kty":"OKP","x":"{}"}}"#,
		b64url_encode(key.to_bytes())
	);
	b64url_encode(sha256(canonical_jwk.as_bytes()))
}

pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
	key.sign(message).to_bytes()
}

pub fn verify(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
	let signature = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
	key.verify(message, &signature)
		.map_err(|_| CryptoError::InvalidSignature)
}

// =============================================================================
// Compact JWT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
	pub alg: String,
	pub typ: String,
	pub kid: String,
}

/// Encode and sign `claims` as `header.claims.signature`.
pub fn sign_jwt<C: Serialize>(key: &SigningKey, kid: &str, claims: &C) -> CryptoResult<String> {
	let header = JwtHeader {
		alg: ALG_EDDSA.to_string(),
		typ: "JWT".to_string(),
		kid: kid.to_string(),
	};

	let header_json = serde_json::to_vec(&header)
		.map_err(|e| CryptoError::Encoding(format!("header encoding failed: {e}")))?;
	let claims_json = serde_json::to_vec(claims)
		.map_err(|e| CryptoError::Encoding(format!("claims encoding failed: {e}")))?;

	let signing_input = format!("{}.{}", b64url_encode(header_json), b64url_encode(claims_json));
	let signature = sign(key, signing_input.as_bytes());

	Ok(format!("{}.{}", signing_input, b64url_encode(signature)))
}

/// Read the header without verifying, to pick the verification key.
pub fn peek_jwt_header(token: &str) -> CryptoResult<JwtHeader> {
	let (header_b64, _, _) = split_jwt(token)?;
	let header_json = b64url_decode(header_b64)?;
	serde_json::from_slice(&header_json)
		.map_err(|e| CryptoError::Encoding(format!("invalid header JSON: {e}")))
}

/// Verify the signature and algorithm of a compact JWT and decode its claims.
///
/// Temporal claims are left to the caller.
pub fn verify_jwt<C: DeserializeOwned>(token: &str, key: &VerifyingKey) -> CryptoResult<(JwtHeader, C)> {
	let (header_b64, claims_b64, sig_b64) = split_jwt(token)?;

	let header = peek_jwt_header(token)?;
	if header.alg != ALG_EDDSA {
		return Err(CryptoError::Encoding(format!(
			"unsupported algorithm: expected {ALG_EDDSA}, got {}",
			header.alg
		)));
	}
	if header.typ != "JWT" {
		return Err(CryptoError::Encoding(format!(
			"unexpected typ: expected JWT, got {}",
			header.typ
		)));
	}

	let signing_input = format!("{header_b64}.{claims_b64}");
	verify(key, signing_input.as_bytes(), &b64url_decode(sig_b64)?)?;

	let claims_json = b64url_decode(claims_b64)?;
	let claims = serde_json::from_slice(&claims_json)
		.map_err(|e| CryptoError::Encoding(format!("invalid claims JSON: {e}")))?;

	Ok((header, claims))
}

fn split_jwt(token: &str) -> CryptoResult<(&str, &str, &str)> {
	let mut parts = token.split('.');
	match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(header), Some(claims), Some(signature), None) => Ok((header, claims, signature)),
		_ => Err(CryptoError::Encoding("invalid JWT structure".into())),
	}
}
