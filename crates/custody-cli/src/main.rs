// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `custody`: operator CLI for a local custody store.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use custody_audit::AuditAnchor;
use custody_config::{load_config, load_config_with_file, LogFormat, LoggingConfig};
use custody_kms::{Credentials, EnrollmentMethod, ErrorResponse, Kms, KmsRequest, LeaseId, LeaseRequest};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "custody", about = "Software key custody", version)]
struct Cli {
	/// Config file (defaults to /etc/custody/custody.toml)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Args)]
struct CredentialArgs {
	/// Passphrase credential
	#[arg(long, env = "CUSTODY_PASSPHRASE", hide_env_values = true, conflicts_with = "credentials_file")]
	passphrase: Option<String>,

	/// JSON credentials file, for passkey-prf or passkey-gate
	#[arg(long)]
	credentials_file: Option<PathBuf>,
}

impl CredentialArgs {
	/// Consumes the args; the passphrase moves into the returned credential.
	async fn load(self) -> Result<Credentials> {
		match (self.passphrase, self.credentials_file) {
			(Some(passphrase), _) => Ok(Credentials::passphrase(passphrase)),
			(None, Some(path)) => read_credentials(&path).await,
			(None, None) => bail!("provide --passphrase, CUSTODY_PASSPHRASE or --credentials-file"),
		}
	}
}

#[derive(Subcommand)]
enum Command {
	/// Show whether the store is initialised and which methods are enrolled
	Status,
	/// Create the master secret under a first enrollment
	Setup {
		#[command(flatten)]
		credentials: CredentialArgs,
	},
	/// Add another enrollment, authenticating with an existing one
	Enroll {
		#[command(flatten)]
		credentials: CredentialArgs,
		/// JSON credentials to enroll
		#[arg(long)]
		new_credentials_file: PathBuf,
	},
	/// Remove an enrollment
	RemoveEnrollment {
		#[command(flatten)]
		credentials: CredentialArgs,
		/// passphrase, passkey-prf or passkey-gate
		method: EnrollmentMethod,
	},
	/// Generate an application signing key and make it current
	GenerateKey {
		#[command(flatten)]
		credentials: CredentialArgs,
		#[arg(long)]
		purpose: Option<String>,
	},
	/// Print an application key's public half
	PublicKey { kid: String },
	/// Sign a file with an application key
	Sign {
		#[command(flatten)]
		credentials: CredentialArgs,
		#[arg(long)]
		kid: Option<String>,
		file: PathBuf,
	},
	/// Create a lease for delegated token issuance
	CreateLease {
		#[command(flatten)]
		credentials: CredentialArgs,
		#[arg(long)]
		user: String,
		/// Endpoint the lease may issue for; repeat for several
		#[arg(long = "endpoint", required = true)]
		endpoints: Vec<String>,
		#[arg(long)]
		ttl_secs: Option<u64>,
		#[arg(long)]
		auto_extend: bool,
		#[arg(long)]
		kid: Option<String>,
	},
	/// Issue tokens under a lease
	Issue {
		lease_id: LeaseId,
		endpoint: String,
		#[arg(long, default_value_t = 1)]
		count: u32,
	},
	VerifyLease { lease_id: LeaseId },
	RevokeLease { lease_id: LeaseId },
	ListLeases {
		#[arg(long)]
		user: Option<String>,
	},
	VerifyToken { token: String },
	/// Audit log inspection and maintenance
	#[command(subcommand)]
	Audit(AuditCommand),
	/// Read one JSON request from stdin and write the response to stdout
	Request,
}

#[derive(Subcommand)]
enum AuditCommand {
	/// Print entries in sequence order
	Log {
		#[arg(long, default_value_t = 0)]
		offset: u64,
		#[arg(long, default_value_t = 100)]
		limit: u64,
	},
	/// Verify the whole chain; exits non-zero if anything is wrong
	Verify {
		/// Anchor JSON saved from `audit anchor`
		#[arg(long)]
		anchor_file: Option<PathBuf>,
	},
	/// Print the current head, to keep somewhere the store cannot rewrite
	Anchor,
	/// Print audit verification keys
	Keys,
	/// Replace the audit signing key
	RotateKey {
		#[command(flatten)]
		credentials: CredentialArgs,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	init_tracing(&config.logging);
	tracing::debug!(store = %config.store.url, "opening custody store");

	let kms = Kms::open(&config).await.context("failed to open custody store")?;
	run(&kms, cli.command).await
}

async fn run(kms: &Kms, command: Command) -> Result<()> {
	match command {
		Command::Status => print_json(&kms.status().await?),
		Command::Setup { credentials } => print_json(&kms.setup(&credentials.load().await?).await?),
		Command::Enroll {
			credentials,
			new_credentials_file,
		} => {
			let new = read_credentials(&new_credentials_file).await?;
			print_json(&kms.enroll(&credentials.load().await?, &new).await?)
		}
		Command::RemoveEnrollment { credentials, method } => {
			print_json(&kms.remove_enrollment(&credentials.load().await?, method).await?)
		}
		Command::GenerateKey { credentials, purpose } => print_json(
			&kms.generate_application_key(&credentials.load().await?, purpose.as_deref())
				.await?,
		),
		Command::PublicKey { kid } => print_json(&kms.public_key(&kid).await?),
		Command::Sign { credentials, kid, file } => {
			let payload = tokio::fs::read(&file)
				.await
				.with_context(|| format!("failed to read {}", file.display()))?;
			print_json(&kms.sign(&credentials.load().await?, kid.as_deref(), &payload).await?)
		}
		Command::CreateLease {
			credentials,
			user,
			endpoints,
			ttl_secs,
			auto_extend,
			kid,
		} => {
			let mut request = LeaseRequest::new(user, endpoints).auto_extend(auto_extend);
			if let Some(ttl_secs) = ttl_secs {
				request = request.ttl_secs(ttl_secs);
			}
			if let Some(kid) = kid {
				request = request.kid(kid);
			}
			print_json(&kms.create_lease(&credentials.load().await?, request).await?)
		}
		Command::Issue {
			lease_id,
			endpoint,
			count,
		} => {
			if count == 1 {
				print_json(&kms.issue(lease_id, &endpoint).await?)
			} else {
				print_json(&kms.issue_batch(lease_id, &endpoint, count).await?)
			}
		}
		Command::VerifyLease { lease_id } => print_json(&kms.verify_lease(lease_id).await?),
		Command::RevokeLease { lease_id } => print_json(&kms.revoke_lease(lease_id).await?),
		Command::ListLeases { user } => print_json(&kms.list_leases(user.as_deref()).await?),
		Command::VerifyToken { token } => print_json(&kms.verify_token(&token).await?),
		Command::Audit(command) => run_audit(kms, command).await,
		Command::Request => {
			let mut input = String::new();
			tokio::io::stdin().read_to_string(&mut input).await?;
			let request: KmsRequest = serde_json::from_str(&input).context("invalid request")?;
			match kms.handle(request).await {
				Ok(response) => print_json(&response),
				Err(e) => {
					print_json(&ErrorResponse::from(&e))?;
					std::process::exit(1);
				}
			}
		}
	}
}

async fn run_audit(kms: &Kms, command: AuditCommand) -> Result<()> {
	match command {
		AuditCommand::Log { offset, limit } => print_json(&kms.get_audit_log(offset, limit).await?),
		AuditCommand::Verify { anchor_file } => {
			let verification = match anchor_file {
				Some(path) => {
					let anchor: AuditAnchor = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)
						.with_context(|| format!("invalid anchor in {}", path.display()))?;
					kms.verify_audit_chain_against(&anchor).await?
				}
				None => kms.verify_audit_chain().await?,
			};
			print_json(&verification)?;
			if !verification.valid {
				std::process::exit(2);
			}
			Ok(())
		}
		AuditCommand::Anchor => print_json(&kms.audit_anchor().await?),
		AuditCommand::Keys => print_json(&kms.audit_public_keys().await?),
		AuditCommand::RotateKey { credentials } => {
			print_json(&kms.rotate_audit_key(&credentials.load().await?).await?)
		}
	}
}

async fn read_credentials(path: &Path) -> Result<Credentials> {
	let json = tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("failed to read {}", path.display()))?;
	serde_json::from_str(&json).with_context(|| format!("invalid credentials in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let fmt_layer = match logging.format {
		LogFormat::Json => tracing_subscriber::fmt::layer()
			.json()
			.with_writer(std::io::stderr)
			.boxed(),
		LogFormat::Pretty => tracing_subscriber::fmt::layer()
			.pretty()
			.with_writer(std::io::stderr)
			.boxed(),
		LogFormat::Compact => tracing_subscriber::fmt::layer()
			.compact()
			.with_writer(std::io::stderr)
			.boxed(),
	};

	tracing_subscriber::registry().with(fmt_layer).with(filter).init();
}
