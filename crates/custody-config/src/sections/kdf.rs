// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Passphrase KDF calibration section.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_TARGET_MIN_MS: u64 = 150;
const DEFAULT_TARGET_MAX_MS: u64 = 300;
const DEFAULT_PROBE_ITERATIONS: u32 = 2;
const DEFAULT_MIN_ITERATIONS: u32 = 2;
const DEFAULT_MAX_ITERATIONS: u32 = 64;
const DEFAULT_MEMORY_KIB: u32 = 19456;
const DEFAULT_PARALLELISM: u32 = 1;

/// Argon2 refuses less than 8 KiB per lane.
const MIN_MEMORY_KIB_PER_LANE: u32 = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KdfConfigLayer {
	pub target_min_ms: Option<u64>,
	pub target_max_ms: Option<u64>,
	pub probe_iterations: Option<u32>,
	pub min_iterations: Option<u32>,
	pub max_iterations: Option<u32>,
	pub memory_kib: Option<u32>,
	pub parallelism: Option<u32>,
	pub fixed_iterations: Option<u32>,
}

impl KdfConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.target_min_ms.is_some() {
			self.target_min_ms = other.target_min_ms;
		}
		if other.target_max_ms.is_some() {
			self.target_max_ms = other.target_max_ms;
		}
		if other.probe_iterations.is_some() {
			self.probe_iterations = other.probe_iterations;
		}
		if other.min_iterations.is_some() {
			self.min_iterations = other.min_iterations;
		}
		if other.max_iterations.is_some() {
			self.max_iterations = other.max_iterations;
		}
		if other.memory_kib.is_some() {
			self.memory_kib = other.memory_kib;
		}
		if other.parallelism.is_some() {
			self.parallelism = other.parallelism;
		}
		if other.fixed_iterations.is_some() {
			self.fixed_iterations = other.fixed_iterations;
		}
	}

	pub fn finalize(self) -> KdfConfig {
		KdfConfig {
			target_min_ms: self.target_min_ms.unwrap_or(DEFAULT_TARGET_MIN_MS),
			target_max_ms: self.target_max_ms.unwrap_or(DEFAULT_TARGET_MAX_MS),
			probe_iterations: self.probe_iterations.unwrap_or(DEFAULT_PROBE_ITERATIONS),
			min_iterations: self.min_iterations.unwrap_or(DEFAULT_MIN_ITERATIONS),
			max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
			memory_kib: self.memory_kib.unwrap_or(DEFAULT_MEMORY_KIB),
			parallelism: self.parallelism.unwrap_or(DEFAULT_PARALLELISM),
			fixed_iterations: self.fixed_iterations,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfConfig {
	pub target_min_ms: u64,
	pub target_max_ms: u64,
	pub probe_iterations: u32,
	pub min_iterations: u32,
	pub max_iterations: u32,
	pub memory_kib: u32,
	pub parallelism: u32,
	/// Skip calibration and use this iteration count.
	pub fixed_iterations: Option<u32>,
}

impl Default for KdfConfig {
	fn default() -> Self {
		KdfConfigLayer::default().finalize()
	}
}

impl KdfConfig {
	/// Cheap parameters for tests. Never use outside tests.
	pub fn insecure_for_tests() -> Self {
		Self {
			memory_kib: 1024,
			parallelism: 1,
			fixed_iterations: Some(1),
			min_iterations: 1,
			..Self::default()
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.target_min_ms > self.target_max_ms {
			return Err(ConfigError::Validation(format!(
				"kdf.target_min_ms ({}) exceeds kdf.target_max_ms ({})",
				self.target_min_ms, self.target_max_ms
			)));
		}
		if self.min_iterations == 0 || self.probe_iterations == 0 {
			return Err(ConfigError::Validation(
				"kdf iteration counts must be at least 1".to_string(),
			));
		}
		if self.min_iterations > self.max_iterations {
			return Err(ConfigError::Validation(format!(
				"kdf.min_iterations ({}) exceeds kdf.max_iterations ({})",
				self.min_iterations, self.max_iterations
			)));
		}
		if self.fixed_iterations == Some(0) {
			return Err(ConfigError::Validation(
				"kdf.fixed_iterations must be at least 1".to_string(),
			));
		}
		if self.parallelism == 0 {
			return Err(ConfigError::Validation(
				"kdf.parallelism must be at least 1".to_string(),
			));
		}
		if self.memory_kib < MIN_MEMORY_KIB_PER_LANE * self.parallelism {
			return Err(ConfigError::Validation(format!(
				"kdf.memory_kib must be at least {} for parallelism {}",
				MIN_MEMORY_KIB_PER_LANE * self.parallelism,
				self.parallelism
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_target_150_to_300_ms() {
		let config = KdfConfig::default();
		assert_eq!(config.target_min_ms, 150);
		assert_eq!(config.target_max_ms, 300);
		assert_eq!(config.fixed_iterations, None);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn insecure_params_validate() {
		assert!(KdfConfig::insecure_for_tests().validate().is_ok());
	}

	#[test]
	fn merge_overrides_only_set_fields() {
		let mut base = KdfConfigLayer {
			memory_kib: Some(4096),
			parallelism: Some(2),
			..Default::default()
		};
		base.merge(KdfConfigLayer {
			memory_kib: Some(8192),
			..Default::default()
		});
		assert_eq!(base.memory_kib, Some(8192));
		assert_eq!(base.parallelism, Some(2));
	}

	#[test]
	fn inverted_window_is_rejected() {
		let config = KdfConfig {
			target_min_ms: 500,
			target_max_ms: 100,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn memory_below_argon2_minimum_is_rejected() {
		let config = KdfConfig {
			memory_kib: 8,
			parallelism: 4,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
