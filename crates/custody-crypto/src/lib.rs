// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cryptographic primitives for the custody core.
//!
//! Everything above this crate treats keys as opaque byte arrays held in
//! [`zeroize::Zeroizing`] buffers. This crate provides:
//!
//! - [`aead`]: AES-256-GCM sealing with mandatory additional authenticated data
//! - [`kdf`]: Argon2id passphrase derivation, iteration calibration and HKDF-SHA256
//! - [`kcv`]: key check values for fast credential rejection
//! - [`canonical`]: deterministic byte encoding for AAD and signed payloads
//! - [`signing`]: Ed25519 key generation, thumbprint key ids and signatures
//! - [`hash`]: SHA-256 helpers, including audit chain hashing
//! - [`encoding`]: base64url helpers and serde adapters

pub mod aead;
pub mod canonical;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod kcv;
pub mod kdf;
pub mod signing;

pub use aead::{Sealed, IV_SIZE, KEY_SIZE};
pub use canonical::CanonicalEncoder;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{Argon2Params, Calibration, CalibrationPolicy};
