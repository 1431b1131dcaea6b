// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the custody core.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`CUSTODY_*`)
//!
//! # Usage
//!
//! ```ignore
//! use custody_config::load_config;
//!
//! let config = load_config()?;
//! println!("token lifetime: {}s", config.lease.token_ttl_secs);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::CustodyConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved custody configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustodyConfig {
	pub kdf: KdfConfig,
	pub lease: LeaseConfig,
	pub audit: AuditConfig,
	pub store: StoreConfig,
	pub logging: LoggingConfig,
}

impl CustodyConfig {
	/// In-memory store with cheap KDF parameters. Never use outside tests.
	pub fn for_tests() -> Self {
		Self {
			kdf: KdfConfig::insecure_for_tests(),
			store: StoreConfig {
				url: "memory".to_string(),
			},
			..Default::default()
		}
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CUSTODY_*`)
/// 2. Config file (`/etc/custody/custody.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<CustodyConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<CustodyConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<CustodyConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = CustodyConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: CustodyConfigLayer) -> Result<CustodyConfig, ConfigError> {
	let kdf = layer.kdf.unwrap_or_default().finalize();
	let lease = layer.lease.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();
	let store = layer.store.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	kdf.validate()?;
	lease.validate()?;

	info!(
		store = %store.url,
		kdf_fixed_iterations = ?kdf.fixed_iterations,
		token_ttl_secs = lease.token_ttl_secs,
		tokens_per_hour = lease.quota.tokens_per_hour,
		log_format = %logging.format,
		"custody configuration loaded"
	);

	Ok(CustodyConfig {
		kdf,
		lease,
		audit,
		store,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_layer_finalizes_to_defaults() {
		let config = finalize(CustodyConfigLayer::default()).unwrap();
		assert_eq!(config, CustodyConfig::default());
	}

	#[test]
	fn later_layer_wins() {
		let mut merged = CustodyConfigLayer {
			store: Some(StoreConfigLayer {
				url: Some("sqlite:/var/lib/custody.db".to_string()),
			}),
			..Default::default()
		};
		merged.merge(CustodyConfigLayer {
			store: Some(StoreConfigLayer {
				url: Some("memory".to_string()),
			}),
			..Default::default()
		});
		let config = finalize(merged).unwrap();
		assert_eq!(config.store.url, "memory");
	}

	#[test]
	fn invalid_section_fails_finalize() {
		let layer = CustodyConfigLayer {
			lease: Some(LeaseConfigLayer {
				stagger_fraction: Some(2.0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_config_is_valid() {
		let config = CustodyConfig::for_tests();
		assert!(config.kdf.validate().is_ok());
		assert_eq!(config.store.url, "memory");
	}

	#[test]
	fn load_with_file_applies_file_values() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("custody.toml");
		std::fs::write(&path, "[lease]\nmax_batch = 4\n").unwrap();
		let config = load_config_with_file(&path).unwrap();
		assert_eq!(config.lease.max_batch, 4);
	}
}
