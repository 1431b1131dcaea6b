// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-lease issuance quotas.
//!
//! Three limits apply to every reservation:
//!
//! - tokens per rolling hour (timestamp log)
//! - sends per minute with a burst allowance (token bucket)
//! - sends per rolling minute to any single endpoint (timestamp log per endpoint)
//!
//! [`QuotaState::try_reserve`] is pure: it takes `now` and either commits all
//! of a reservation or none of it. The lease manager serialises callers.

use std::collections::BTreeMap;

use custody_config::QuotaConfig;
use serde::{Deserialize, Serialize};

use crate::error::QuotaKind;
use crate::types::LeaseId;

const HOUR_MS: i64 = 60 * 60 * 1000;
const MINUTE_MS: i64 = 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBucket {
	pub tokens: f64,
	/// Unix ms of the last refill.
	pub refilled_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
	pub lease_id: LeaseId,
	/// Unix ms of each issuance in the last hour.
	pub token_issuances: Vec<i64>,
	pub send_bucket: SendBucket,
	/// Unix ms of each send in the last minute, per endpoint.
	pub endpoint_sends: BTreeMap<String, Vec<i64>>,
}

/// Remaining allowance, for callers deciding whether to batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
	pub tokens_remaining_this_hour: u32,
	pub sends_available: u32,
}

impl QuotaState {
	/// A fresh state with a full send bucket.
	pub fn new(lease_id: LeaseId, policy: &QuotaConfig, now_ms: i64) -> Self {
		Self {
			lease_id,
			token_issuances: Vec::new(),
			send_bucket: SendBucket {
				tokens: f64::from(policy.burst_sends),
				refilled_at: now_ms,
			},
			endpoint_sends: BTreeMap::new(),
		}
	}

	/// Reserve `count` issuances to `endpoint` at `now_ms`, or report which limit refused.
	pub fn try_reserve(
		&mut self,
		policy: &QuotaConfig,
		endpoint: &str,
		count: u32,
		now_ms: i64,
	) -> Result<(), QuotaKind> {
		self.prune(now_ms);
		self.refill(policy, now_ms);

		let wanted = count as usize;
		if self.token_issuances.len() + wanted > policy.tokens_per_hour as usize {
			return Err(QuotaKind::TokensPerHour);
		}
		if self.send_bucket.tokens < f64::from(count) {
			return Err(QuotaKind::SendsPerMinute);
		}
		let endpoint_sends = self.endpoint_sends.get(endpoint).map(Vec::len).unwrap_or(0);
		if endpoint_sends + wanted > policy.endpoint_sends_per_minute as usize {
			return Err(QuotaKind::EndpointSendsPerMinute);
		}

		self.token_issuances.extend(std::iter::repeat(now_ms).take(wanted));
		self.send_bucket.tokens -= f64::from(count);
		self.endpoint_sends
			.entry(endpoint.to_string())
			.or_default()
			.extend(std::iter::repeat(now_ms).take(wanted));
		Ok(())
	}

	pub fn snapshot(&mut self, policy: &QuotaConfig, now_ms: i64) -> QuotaSnapshot {
		self.prune(now_ms);
		self.refill(policy, now_ms);
		QuotaSnapshot {
			tokens_remaining_this_hour: policy
				.tokens_per_hour
				.saturating_sub(self.token_issuances.len() as u32),
			sends_available: self.send_bucket.tokens.floor() as u32,
		}
	}

	fn prune(&mut self, now_ms: i64) {
		self.token_issuances.retain(|t| now_ms - t < HOUR_MS);
		for sends in self.endpoint_sends.values_mut() {
			sends.retain(|t| now_ms - t < MINUTE_MS);
		}
		self.endpoint_sends.retain(|_, sends| !sends.is_empty());
	}

	fn refill(&mut self, policy: &QuotaConfig, now_ms: i64) {
		let elapsed = (now_ms - self.send_bucket.refilled_at).max(0);
		let refill = elapsed as f64 * f64::from(policy.sends_per_minute) / MINUTE_MS as f64;
		self.send_bucket.tokens = (self.send_bucket.tokens + refill).min(f64::from(policy.burst_sends));
		self.send_bucket.refilled_at = self.send_bucket.refilled_at.max(now_ms);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn policy(tokens_per_hour: u32, sends_per_minute: u32, burst: u32, endpoint: u32) -> QuotaConfig {
		QuotaConfig {
			tokens_per_hour,
			sends_per_minute,
			burst_sends: burst,
			endpoint_sends_per_minute: endpoint,
		}
	}

	#[test]
	fn hourly_limit_rolls_over() {
		let policy = policy(3, 1000, 1000, 1000);
		let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);

		for i in 0..3 {
			state.try_reserve(&policy, "a", 1, i * 1000).unwrap();
		}
		assert_eq!(state.try_reserve(&policy, "a", 1, 10_000), Err(QuotaKind::TokensPerHour));
		// First issuance was at t=0; it leaves the window at exactly one hour.
		assert!(state.try_reserve(&policy, "a", 1, HOUR_MS).is_ok());
	}

	#[test]
	fn burst_then_refill() {
		let policy = policy(1000, 6, 3, 1000);
		let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);

		state.try_reserve(&policy, "a", 3, 0).unwrap();
		assert_eq!(state.try_reserve(&policy, "b", 1, 0), Err(QuotaKind::SendsPerMinute));
		// 6 per minute refills one token every 10 seconds.
		assert!(state.try_reserve(&policy, "b", 1, 10_000).is_ok());
		assert_eq!(state.try_reserve(&policy, "b", 1, 10_000), Err(QuotaKind::SendsPerMinute));
	}

	#[test]
	fn endpoint_ceiling_is_per_endpoint() {
		let policy = policy(1000, 1000, 1000, 2);
		let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);

		state.try_reserve(&policy, "a", 2, 0).unwrap();
		assert_eq!(
			state.try_reserve(&policy, "a", 1, 1000),
			Err(QuotaKind::EndpointSendsPerMinute)
		);
		assert!(state.try_reserve(&policy, "b", 2, 1000).is_ok());
		assert!(state.try_reserve(&policy, "a", 1, MINUTE_MS).is_ok());
	}

	#[test]
	fn refused_reservation_commits_nothing() {
		let policy = policy(5, 1000, 1000, 2);
		let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);
		let before = state.clone();

		assert_eq!(
			state.try_reserve(&policy, "a", 3, 0),
			Err(QuotaKind::EndpointSendsPerMinute)
		);
		assert_eq!(state.token_issuances, before.token_issuances);
		assert_eq!(state.send_bucket.tokens, before.send_bucket.tokens);
		assert!(state.endpoint_sends.is_empty());
	}

	#[test]
	fn snapshot_reports_remaining() {
		let policy = policy(10, 10, 20, 5);
		let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);
		state.try_reserve(&policy, "a", 4, 0).unwrap();
		let snapshot = state.snapshot(&policy, 0);
		assert_eq!(snapshot.tokens_remaining_this_hour, 6);
		assert_eq!(snapshot.sends_available, 16);
	}

	proptest! {
		#[test]
		fn prop_hourly_window_never_exceeded(
			steps in proptest::collection::vec((0i64..120_000, 1u32..4), 1..200)
		) {
			let policy = policy(7, 1000, 1000, 1000);
			let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);
			let mut now = 0i64;
			let mut granted: Vec<i64> = Vec::new();

			for (advance, count) in steps {
				now += advance;
				if state.try_reserve(&policy, "endpoint", count, now).is_ok() {
					granted.extend(std::iter::repeat(now).take(count as usize));
				}
				let in_window = granted.iter().filter(|t| now - **t < HOUR_MS).count();
				prop_assert!(in_window <= 7);
			}
		}

		#[test]
		fn prop_bucket_stays_within_capacity(
			steps in proptest::collection::vec((0i64..30_000, 1u32..5), 1..100)
		) {
			let policy = policy(100_000, 10, 20, 100_000);
			let mut state = QuotaState::new(LeaseId::generate(), &policy, 0);
			let mut now = 0i64;
			for (advance, count) in steps {
				now += advance;
				let _ = state.try_reserve(&policy, "endpoint", count, now);
				prop_assert!(state.send_bucket.tokens >= 0.0);
				prop_assert!(state.send_bucket.tokens <= 20.0);
			}
		}
	}
}
