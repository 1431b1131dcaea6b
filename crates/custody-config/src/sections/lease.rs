// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lease and quota policy section.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_TOKEN_TTL_SECS: u64 = 15 * 60;
const DEFAULT_STAGGER_FRACTION: f64 = 0.6;
const DEFAULT_MAX_BATCH: u32 = 10;

const DEFAULT_TOKENS_PER_HOUR: u32 = 100;
const DEFAULT_SENDS_PER_MINUTE: u32 = 10;
const DEFAULT_BURST_SENDS: u32 = 20;
const DEFAULT_ENDPOINT_SENDS_PER_MINUTE: u32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuotaConfigLayer {
	pub tokens_per_hour: Option<u32>,
	pub sends_per_minute: Option<u32>,
	pub burst_sends: Option<u32>,
	pub endpoint_sends_per_minute: Option<u32>,
}

impl QuotaConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.tokens_per_hour.is_some() {
			self.tokens_per_hour = other.tokens_per_hour;
		}
		if other.sends_per_minute.is_some() {
			self.sends_per_minute = other.sends_per_minute;
		}
		if other.burst_sends.is_some() {
			self.burst_sends = other.burst_sends;
		}
		if other.endpoint_sends_per_minute.is_some() {
			self.endpoint_sends_per_minute = other.endpoint_sends_per_minute;
		}
	}

	pub fn finalize(self) -> QuotaConfig {
		QuotaConfig {
			tokens_per_hour: self.tokens_per_hour.unwrap_or(DEFAULT_TOKENS_PER_HOUR),
			sends_per_minute: self.sends_per_minute.unwrap_or(DEFAULT_SENDS_PER_MINUTE),
			burst_sends: self.burst_sends.unwrap_or(DEFAULT_BURST_SENDS),
			endpoint_sends_per_minute: self
				.endpoint_sends_per_minute
				.unwrap_or(DEFAULT_ENDPOINT_SENDS_PER_MINUTE),
		}
	}
}

/// Per-lease issuance limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaConfig {
	/// Tokens a lease may issue in any rolling hour.
	pub tokens_per_hour: u32,
	/// Sustained send rate (token bucket refill).
	pub sends_per_minute: u32,
	/// Token bucket capacity.
	pub burst_sends: u32,
	/// Ceiling for any single endpoint in a rolling minute.
	pub endpoint_sends_per_minute: u32,
}

impl Default for QuotaConfig {
	fn default() -> Self {
		QuotaConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeaseConfigLayer {
	pub default_ttl_secs: Option<u64>,
	pub max_ttl_secs: Option<u64>,
	pub token_ttl_secs: Option<u64>,
	pub stagger_fraction: Option<f64>,
	pub max_batch: Option<u32>,
	pub auto_extend: Option<bool>,
	pub quota: Option<QuotaConfigLayer>,
}

impl LeaseConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.default_ttl_secs.is_some() {
			self.default_ttl_secs = other.default_ttl_secs;
		}
		if other.max_ttl_secs.is_some() {
			self.max_ttl_secs = other.max_ttl_secs;
		}
		if other.token_ttl_secs.is_some() {
			self.token_ttl_secs = other.token_ttl_secs;
		}
		if other.stagger_fraction.is_some() {
			self.stagger_fraction = other.stagger_fraction;
		}
		if other.max_batch.is_some() {
			self.max_batch = other.max_batch;
		}
		if other.auto_extend.is_some() {
			self.auto_extend = other.auto_extend;
		}
		if let Some(incoming) = other.quota {
			self
				.quota
				.get_or_insert_with(QuotaConfigLayer::default)
				.merge(incoming);
		}
	}

	pub fn finalize(self) -> LeaseConfig {
		LeaseConfig {
			default_ttl_secs: self.default_ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
			max_ttl_secs: self.max_ttl_secs.unwrap_or(DEFAULT_MAX_TTL_SECS),
			token_ttl_secs: self.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
			stagger_fraction: self.stagger_fraction.unwrap_or(DEFAULT_STAGGER_FRACTION),
			max_batch: self.max_batch.unwrap_or(DEFAULT_MAX_BATCH),
			auto_extend: self.auto_extend.unwrap_or(false),
			quota: self.quota.unwrap_or_default().finalize(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaseConfig {
	pub default_ttl_secs: u64,
	pub max_ttl_secs: u64,
	/// Lifetime of each issued token.
	pub token_ttl_secs: u64,
	/// Fraction of a token's lifetime after which the next batched token starts.
	pub stagger_fraction: f64,
	pub max_batch: u32,
	/// Default for leases created without an explicit choice.
	pub auto_extend: bool,
	pub quota: QuotaConfig,
}

impl Default for LeaseConfig {
	fn default() -> Self {
		LeaseConfigLayer::default().finalize()
	}
}

impl LeaseConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.default_ttl_secs == 0 || self.token_ttl_secs == 0 {
			return Err(ConfigError::Validation(
				"lease TTLs must be positive".to_string(),
			));
		}
		if self.default_ttl_secs > self.max_ttl_secs {
			return Err(ConfigError::Validation(format!(
				"lease.default_ttl_secs ({}) exceeds lease.max_ttl_secs ({})",
				self.default_ttl_secs, self.max_ttl_secs
			)));
		}
		if !(self.stagger_fraction > 0.0 && self.stagger_fraction < 1.0) {
			return Err(ConfigError::Validation(format!(
				"lease.stagger_fraction must be in (0, 1), got {}",
				self.stagger_fraction
			)));
		}
		if self.max_batch == 0 {
			return Err(ConfigError::Validation(
				"lease.max_batch must be at least 1".to_string(),
			));
		}
		let quota = &self.quota;
		if quota.tokens_per_hour == 0
			|| quota.sends_per_minute == 0
			|| quota.burst_sends == 0
			|| quota.endpoint_sends_per_minute == 0
		{
			return Err(ConfigError::Validation(
				"lease.quota limits must be positive".to_string(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn defaults() {
		let config = LeaseConfig::default();
		assert_eq!(config.token_ttl_secs, 900);
		assert_eq!(config.stagger_fraction, 0.6);
		assert_eq!(config.quota.tokens_per_hour, 100);
		assert_eq!(config.quota.endpoint_sends_per_minute, 5);
		assert!(!config.auto_extend);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn quota_merges_field_by_field() {
		let mut base = LeaseConfigLayer {
			quota: Some(QuotaConfigLayer {
				tokens_per_hour: Some(50),
				burst_sends: Some(5),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(LeaseConfigLayer {
			quota: Some(QuotaConfigLayer {
				tokens_per_hour: Some(3),
				..Default::default()
			}),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.quota.tokens_per_hour, 3);
		assert_eq!(config.quota.burst_sends, 5);
		assert_eq!(config.quota.sends_per_minute, 10);
	}

	#[test]
	fn stagger_fraction_bounds() {
		for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
			let config = LeaseConfig {
				stagger_fraction: bad,
				..Default::default()
			};
			assert!(config.validate().is_err(), "accepted {bad}");
		}
	}

	#[test]
	fn zero_quota_is_rejected() {
		let mut config = LeaseConfig::default();
		config.quota.tokens_per_hour = 0;
		assert!(config.validate().is_err());
	}

	proptest! {
		#[test]
		fn prop_default_ttl_above_max_is_rejected(max in 1u64..1_000_000, extra in 1u64..1000) {
			let config = LeaseConfig {
				default_ttl_secs: max + extra,
				max_ttl_secs: max,
				..Default::default()
			};
			prop_assert!(config.validate().is_err());
		}
	}
}
