// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifiers, enrollment methods and record versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::KmsError;

/// Version stamped on every persisted record.
pub const KMS_VERSION: u32 = 2;

/// Version of the algorithms protecting key material.
pub const ALG_VERSION: u32 = 1;

/// Purpose used when a caller does not name one.
pub const DEFAULT_PURPOSE: &str = "signing";

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = KmsError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s)
					.map(Self)
					.map_err(|_| KmsError::InvalidRequest(format!("invalid {}: {s}", stringify!($name))))
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(LeaseId, "Unique identifier for a lease.");
define_id_type!(TokenId, "Unique identifier (`jti`) of an issued token.");

// =============================================================================
// Enrollment methods
// =============================================================================

/// How an enrollment's wrapping key is derived from credential material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnrollmentMethod {
	#[serde(rename = "passphrase")]
	Passphrase,
	#[serde(rename = "passkey-prf")]
	PasskeyPrf,
	/// Pepper released by an authentication gate. Weaker than PRF: the
	/// pepper is stored by the ceremony layer, not derived by the authenticator.
	#[serde(rename = "passkey-gate")]
	PasskeyGate,
}

impl EnrollmentMethod {
	pub fn all() -> &'static [EnrollmentMethod] {
		&[
			EnrollmentMethod::Passphrase,
			EnrollmentMethod::PasskeyPrf,
			EnrollmentMethod::PasskeyGate,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			EnrollmentMethod::Passphrase => "passphrase",
			EnrollmentMethod::PasskeyPrf => "passkey-prf",
			EnrollmentMethod::PasskeyGate => "passkey-gate",
		}
	}
}

impl fmt::Display for EnrollmentMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EnrollmentMethod {
	type Err = KmsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		EnrollmentMethod::all()
			.iter()
			.copied()
			.find(|m| m.as_str() == s)
			.ok_or_else(|| KmsError::InvalidRequest(format!("unknown enrollment method: {s}")))
	}
}

/// Whether the core holds a master secret yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KmsStatus {
	Uninitialized,
	Enrolled { methods: Vec<EnrollmentMethod> },
}

impl KmsStatus {
	pub fn is_initialized(&self) -> bool {
		matches!(self, KmsStatus::Enrolled { .. })
	}
}
