// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backing store section.

use serde::{Deserialize, Serialize};

fn default_url() -> String {
	"sqlite:./custody.db".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreConfigLayer {
	pub url: Option<String>,
}

impl StoreConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> StoreConfig {
		StoreConfig {
			url: self.url.unwrap_or_else(default_url),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
	/// SQLite URL, or `memory` for an ephemeral store.
	pub url: String,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self { url: default_url() }
	}
}
