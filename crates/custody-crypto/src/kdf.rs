// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key derivation: Argon2id for passphrases, HKDF-SHA256 for high-entropy input.
//!
//! # Calibration
//!
//! Passphrase derivation is tuned once per installation so that a single
//! derivation lands inside a target window (150-300 ms by default):
//!
//! 1. probe Argon2id at a fixed iteration count and time it
//! 2. scale the iteration count linearly toward the middle of the window
//! 3. clamp to `[min_iterations, max_iterations]`
//!
//! The caller persists the resulting [`Calibration`]; it is never recomputed
//! for an existing enrollment, whose parameters travel with its record.

use std::time::{Duration, Instant};

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::aead::{random_bytes, KEY_SIZE};
use crate::error::{CryptoError, CryptoResult};

/// Minimum salt length accepted by Argon2.
pub const SALT_SIZE: usize = 16;

/// Argon2id cost parameters, persisted alongside each passphrase enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Params {
	pub memory_kib: u32,
	pub iterations: u32,
	pub parallelism: u32,
}

impl Argon2Params {
	fn argon2(&self) -> CryptoResult<Argon2<'static>> {
		let params = Params::new(
			self.memory_kib,
			self.iterations,
			self.parallelism,
			Some(KEY_SIZE),
		)
		.map_err(|e| CryptoError::KeyDerivation(format!("invalid Argon2 parameters: {e}")))?;
		Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
	}
}

/// Derive a 256-bit wrapping key from a passphrase.
///
/// Blocking; callers on an async runtime should use `spawn_blocking`.
pub fn derive_passphrase_key(
	passphrase: &[u8],
	salt: &[u8],
	params: &Argon2Params,
) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	params
		.argon2()?
		.hash_password_into(passphrase, salt, key.as_mut())
		.map_err(|e| CryptoError::KeyDerivation(format!("Argon2id failed: {e}")))?;
	Ok(key)
}

/// HKDF-SHA256 extract-and-expand to a 256-bit key.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8]) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
	let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
	let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
	hk.expand(info, okm.as_mut())
		.map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
	Ok(okm)
}

pub fn generate_salt() -> [u8; SALT_SIZE] {
	random_bytes::<SALT_SIZE>()
}

// =============================================================================
// Calibration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationPolicy {
	pub target_min_ms: u64,
	pub target_max_ms: u64,
	pub probe_iterations: u32,
	pub min_iterations: u32,
	pub max_iterations: u32,
	pub memory_kib: u32,
	pub parallelism: u32,
}

impl Default for CalibrationPolicy {
	fn default() -> Self {
		Self {
			target_min_ms: 150,
			target_max_ms: 300,
			probe_iterations: 2,
			min_iterations: 2,
			max_iterations: 64,
			memory_kib: 19456,
			parallelism: 1,
		}
	}
}

impl CalibrationPolicy {
	fn validate(&self) -> CryptoResult<()> {
		if self.probe_iterations == 0 || self.min_iterations == 0 {
			return Err(CryptoError::KeyDerivation(
				"iteration counts must be positive".into(),
			));
		}
		if self.min_iterations > self.max_iterations {
			return Err(CryptoError::KeyDerivation(format!(
				"min_iterations {} exceeds max_iterations {}",
				self.min_iterations, self.max_iterations
			)));
		}
		if self.target_min_ms > self.target_max_ms {
			return Err(CryptoError::KeyDerivation(format!(
				"target window {}..{} ms is empty",
				self.target_min_ms, self.target_max_ms
			)));
		}
		Ok(())
	}

	fn params_with(&self, iterations: u32) -> Argon2Params {
		Argon2Params {
			memory_kib: self.memory_kib,
			iterations,
			parallelism: self.parallelism,
		}
	}
}

/// Result of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
	pub params: Argon2Params,
	/// Wall time of the probe derivation.
	pub probe_ms: u64,
	/// Expected time of one derivation at the chosen iteration count.
	pub projected_ms: u64,
}

/// Calibrate against the real Argon2id implementation on this machine.
pub fn calibrate(policy: &CalibrationPolicy) -> CryptoResult<Calibration> {
	calibrate_with(policy, |params| {
		let salt = generate_salt();
		let started = Instant::now();
		derive_passphrase_key(b"custody-calibration-probe", &salt, params)?;
		Ok(started.elapsed())
	})
}

/// Calibrate using a caller-supplied timing function.
pub fn calibrate_with<F>(policy: &CalibrationPolicy, mut measure: F) -> CryptoResult<Calibration>
where
	F: FnMut(&Argon2Params) -> CryptoResult<Duration>,
{
	policy.validate()?;

	let probe = measure(&policy.params_with(policy.probe_iterations))?;
	let probe_ms = probe.as_millis() as u64;
	let per_iteration_ms = probe.as_nanos() as f64 / 1_000_000.0 / f64::from(policy.probe_iterations);
	let target_ms = (policy.target_min_ms + policy.target_max_ms) as f64 / 2.0;

	let scaled = if per_iteration_ms > 0.0 {
		(target_ms / per_iteration_ms).round()
	} else {
		f64::from(policy.max_iterations)
	};
	let iterations = (scaled.min(f64::from(u32::MAX)) as u32)
		.clamp(policy.min_iterations, policy.max_iterations);
	let projected_ms = (per_iteration_ms * f64::from(iterations)).round() as u64;

	debug!(
		probe_iterations = policy.probe_iterations,
		probe_ms,
		iterations,
		projected_ms,
		"calibrated passphrase KDF"
	);

	Ok(Calibration {
		params: policy.params_with(iterations),
		probe_ms,
		projected_ms,
	})
}
