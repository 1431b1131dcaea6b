// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hash-chained, signed audit log for the custody core.
//!
//! Each [`AuditEntry`] carries the SHA-256 of its canonical encoding chained
//! onto the previous entry's hash, plus an Ed25519 signature over that hash.
//! Altering, removing or reordering entries is detected by
//! [`AuditLog::verify`], which reports every problem rather than stopping at
//! the first. Truncation that also rewrites the head needs an externally held
//! [`AuditAnchor`] and [`AuditLog::verify_against`].
//!
//! # Example
//!
//! ```ignore
//! use custody_audit::{AuditAuthority, AuditEvent, AuditLog, AuditOperation};
//!
//! let log = AuditLog::new(records);
//! log.append(
//!     AuditEvent::builder(AuditOperation::LeaseCreated, AuditAuthority::owner("passphrase"))
//!         .lease(lease_id)
//!         .detail("ttlSeconds", 3600)
//!         .build(),
//! )
//! .await?;
//! assert!(log.verify().await?.valid);
//! ```

pub mod entry;
pub mod error;
pub mod event;
pub mod keys;
pub mod log;

pub use entry::{entry_key, AuditEntry, AUDIT_ENTRY_VERSION, GENESIS_HASH};
pub use error::{AuditError, AuditResult};
pub use event::{AuditAuthority, AuditEvent, AuditEventBuilder, AuditOperation};
pub use keys::AuditSigningKey;
pub use log::{AuditAnchor, AuditLog, ChainError, ChainErrorKind, ChainVerification};
