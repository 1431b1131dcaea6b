// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed tokens issued under a lease: compact EdDSA JWTs.

use chrono::{DateTime, TimeZone, Utc};
use custody_crypto::encoding::b64url_decode;
use custody_crypto::signing::{peek_jwt_header, verify_jwt, verifying_key_from_bytes};
use serde::{Deserialize, Serialize};

use crate::error::{KmsError, KmsResult};
use crate::types::{LeaseId, TokenId};

/// Clock skew tolerated when checking `nbf` and `exp`.
pub const CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// The endpoint the token is scoped to.
	pub aud: String,
	/// The lease owner's user id.
	pub sub: String,
	pub iat: i64,
	pub nbf: i64,
	pub exp: i64,
	pub jti: TokenId,
	/// Lease the token was issued under.
	pub lid: LeaseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedToken {
	pub token: String,
	pub jti: TokenId,
	pub kid: String,
	pub not_before: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

pub(crate) fn timestamp(secs: i64) -> KmsResult<DateTime<Utc>> {
	Utc.timestamp_opt(secs, 0)
		.single()
		.ok_or_else(|| KmsError::Internal(format!("timestamp out of range: {secs}")))
}

/// Verify a token's signature against `public_key` (base64url) and its validity window at `now`.
pub fn verify_token(token: &str, public_key: &str, now: DateTime<Utc>) -> KmsResult<TokenClaims> {
	let key_bytes = b64url_decode(public_key)?;
	let key = verifying_key_from_bytes(&key_bytes)?;
	let (_, claims): (_, TokenClaims) =
		verify_jwt(token, &key).map_err(|e| KmsError::InvalidToken(e.to_string()))?;

	let now = now.timestamp();
	if now + CLOCK_SKEW_SECS < claims.nbf {
		return Err(KmsError::InvalidToken("token is not yet valid".into()));
	}
	if now - CLOCK_SKEW_SECS >= claims.exp {
		return Err(KmsError::InvalidToken("token has expired".into()));
	}
	Ok(claims)
}

/// The kid a token claims to be signed by. Unverified.
pub fn token_kid(token: &str) -> KmsResult<String> {
	peek_jwt_header(token)
		.map(|header| header.kid)
		.map_err(|e| KmsError::InvalidToken(e.to_string()))
}
