// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::CustodyConfigLayer;
use crate::sections::{
	AuditConfigLayer, KdfConfigLayer, LeaseConfigLayer, LogFormat, LoggingConfigLayer,
	QuotaConfigLayer, StoreConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CustodyConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CustodyConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CustodyConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/custody/custody.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CustodyConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CustodyConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CustodyConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CUSTODY_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CustodyConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CustodyConfigLayer {
			kdf: Some(load_kdf_from_env()?),
			lease: Some(load_lease_from_env()?),
			audit: Some(load_audit_from_env()),
			store: Some(load_store_from_env()),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_kdf_from_env() -> Result<KdfConfigLayer, ConfigError> {
	Ok(KdfConfigLayer {
		target_min_ms: env_parse("CUSTODY_KDF_TARGET_MIN_MS", "u64")?,
		target_max_ms: env_parse("CUSTODY_KDF_TARGET_MAX_MS", "u64")?,
		probe_iterations: env_parse("CUSTODY_KDF_PROBE_ITERATIONS", "u32")?,
		min_iterations: env_parse("CUSTODY_KDF_MIN_ITERATIONS", "u32")?,
		max_iterations: env_parse("CUSTODY_KDF_MAX_ITERATIONS", "u32")?,
		memory_kib: env_parse("CUSTODY_KDF_MEMORY_KIB", "u32")?,
		parallelism: env_parse("CUSTODY_KDF_PARALLELISM", "u32")?,
		fixed_iterations: env_parse("CUSTODY_KDF_FIXED_ITERATIONS", "u32")?,
	})
}

fn load_lease_from_env() -> Result<LeaseConfigLayer, ConfigError> {
	Ok(LeaseConfigLayer {
		default_ttl_secs: env_parse("CUSTODY_LEASE_DEFAULT_TTL_SECS", "u64")?,
		max_ttl_secs: env_parse("CUSTODY_LEASE_MAX_TTL_SECS", "u64")?,
		token_ttl_secs: env_parse("CUSTODY_LEASE_TOKEN_TTL_SECS", "u64")?,
		stagger_fraction: env_parse("CUSTODY_LEASE_STAGGER_FRACTION", "f64")?,
		max_batch: env_parse("CUSTODY_LEASE_MAX_BATCH", "u32")?,
		auto_extend: env_bool("CUSTODY_LEASE_AUTO_EXTEND"),
		quota: Some(QuotaConfigLayer {
			tokens_per_hour: env_parse("CUSTODY_LEASE_QUOTA_TOKENS_PER_HOUR", "u32")?,
			sends_per_minute: env_parse("CUSTODY_LEASE_QUOTA_SENDS_PER_MINUTE", "u32")?,
			burst_sends: env_parse("CUSTODY_LEASE_QUOTA_BURST_SENDS", "u32")?,
			endpoint_sends_per_minute: env_parse(
				"CUSTODY_LEASE_QUOTA_ENDPOINT_SENDS_PER_MINUTE",
				"u32",
			)?,
		}),
	})
}

fn load_audit_from_env() -> AuditConfigLayer {
	AuditConfigLayer {
		mirror_to_tracing: env_bool("CUSTODY_AUDIT_MIRROR_TO_TRACING"),
	}
}

fn load_store_from_env() -> StoreConfigLayer {
	StoreConfigLayer {
		url: env_var("CUSTODY_STORE_URL"),
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("CUSTODY_LOGGING_FORMAT") {
		Some(v) => Some(
			v.parse::<LogFormat>()
				.map_err(|message| ConfigError::InvalidValue {
					key: "CUSTODY_LOGGING_FORMAT".to_string(),
					message,
				})?,
		),
		None => None,
	};
	Ok(LoggingConfigLayer {
		level: env_var("CUSTODY_LOGGING_LEVEL"),
		format,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn precedence_orders_sources() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/custody.toml").load().unwrap();
		assert!(layer.kdf.is_none());
		assert!(layer.lease.is_none());
	}

	#[test]
	fn toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[kdf]
memory_kib = 4096
fixed_iterations = 3

[lease]
token_ttl_secs = 600

[lease.quota]
tokens_per_hour = 7

[store]
url = "memory"

[logging]
format = "json"
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let kdf = layer.kdf.unwrap();
		assert_eq!(kdf.memory_kib, Some(4096));
		assert_eq!(kdf.fixed_iterations, Some(3));
		let lease = layer.lease.unwrap();
		assert_eq!(lease.token_ttl_secs, Some(600));
		assert_eq!(lease.quota.unwrap().tokens_per_hour, Some(7));
		assert_eq!(layer.store.unwrap().url.as_deref(), Some("memory"));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn malformed_toml_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[kdf\nmemory_kib = ").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}
}
