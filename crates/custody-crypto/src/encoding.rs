// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Base64url (no padding) helpers for persisted binary fields.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};

use crate::error::{CryptoError, CryptoResult};

pub fn b64url_encode(bytes: impl AsRef<[u8]>) -> String {
	BASE64URL.encode(bytes)
}

pub fn b64url_decode(value: &str) -> CryptoResult<Vec<u8>> {
	BASE64URL
		.decode(value)
		.map_err(|e| CryptoError::Encoding(format!("invalid base64url: {e}")))
}

/// Decode into a fixed-size array, rejecting any other length.
pub fn b64url_decode_array<const N: usize>(value: &str) -> CryptoResult<[u8; N]> {
	let bytes = b64url_decode(value)?;
	let actual = bytes.len();
	bytes
		.try_into()
		.map_err(|_| CryptoError::Encoding(format!("expected {N} bytes, got {actual}")))
}

/// `#[serde(with = "b64")]` for `Vec<u8>` fields.
pub mod b64 {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&super::b64url_encode(bytes))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		super::b64url_decode(&value).map_err(serde::de::Error::custom)
	}
}

/// `#[serde(with = "b64_array")]` for `[u8; N]` fields.
pub mod b64_array {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&super::b64url_encode(bytes))
	}

	pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		super::b64url_decode_array::<N>(&value).map_err(serde::de::Error::custom)
	}
}

/// `#[serde(with = "b64_opt")]` for `Option<Vec<u8>>` fields.
pub mod b64_opt {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match bytes {
			Some(bytes) => serializer.serialize_some(&super::b64url_encode(bytes)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Option::<String>::deserialize(deserializer)?
			.map(|value| super::b64url_decode(&value).map_err(serde::de::Error::custom))
			.transpose()
	}
}
