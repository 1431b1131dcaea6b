// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper type for credential material handed to the custody core.
//!
//! Passphrases, PRF outputs and gate peppers arrive as opaque bytes from a
//! ceremony layer the core never sees. [`Secret<T>`] keeps that material:
//!
//! - out of logs (redacted `Debug`/`Display`)
//! - out of serialized output (redacted `Serialize`)
//! - out of memory once dropped (zeroized)
//! - behind an explicit `.expose()` call
//!
//! Unlike a general-purpose config secret, `Secret` is deliberately not
//! `Clone`: a credential is consumed by one unlock attempt and then dropped.
//!
//! ```
//! use custody_common_secret::{Secret, SecretBytes};
//!
//! let prf_output = SecretBytes::new(vec![7u8; 32]);
//! assert_eq!(format!("{prf_output:?}"), "Secret(\"[REDACTED]\")");
//! assert_eq!(prf_output.expose().len(), 32);
//!
//! let passphrase = Secret::new("correct horse battery staple".to_string());
//! assert_eq!(format!("{passphrase}"), "[REDACTED]");
//! ```

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper for credential material that prevents accidental exposure.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Passphrases and other textual credentials.
pub type SecretString = Secret<String>;

/// PRF outputs, peppers and other binary credentials.
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Explicitly access the inner value.
	///
	/// Every call site is a place where credential material is read; keep them few.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T> Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	/// Byte length of the wrapped material, safe to log.
	pub fn len(&self) -> usize {
		self.inner.as_ref().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.as_ref().is_empty()
	}

	/// Constant-time comparison of the wrapped bytes.
	pub fn ct_eq(&self, other: &[u8]) -> bool {
		self.inner.as_ref().ct_eq(other).into()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Secret::new(value.to_string())
	}
}

impl From<Vec<u8>> for SecretBytes {
	fn from(value: Vec<u8>) -> Self {
		Secret::new(value)
	}
}

impl From<&[u8]> for SecretBytes {
	fn from(value: &[u8]) -> Self {
		Secret::new(value.to_vec())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

// =============================================================================
// Serde Integration
// =============================================================================

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			let inner = T::deserialize(deserializer)?;
			Ok(Secret::new(inner))
		}
	}
}
