// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit log section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub mirror_to_tracing: Option<bool>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.mirror_to_tracing.is_some() {
			self.mirror_to_tracing = other.mirror_to_tracing;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			mirror_to_tracing: self.mirror_to_tracing.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
	/// Emit every appended entry as a `custody::audit` tracing event.
	pub mirror_to_tracing: bool,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}
