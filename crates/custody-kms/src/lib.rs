// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Software key custody.
//!
//! This crate provides the custody core:
//!
//! - **Master secret**: one root secret, enrolled under passphrase, passkey PRF
//!   or gate-pepper credentials, unlocked per operation and wiped on every exit
//! - **Key wrapping**: Ed25519 application keys sealed under the MKEK with
//!   AAD bound to their metadata
//! - **Leases**: a single unlock converted into quota-limited token issuance
//!   that needs no further credentials
//! - **Audit**: every privileged operation appended to the hash-chained log
//!
//! # Security Design
//!
//! - The master secret and MKEK exist only inside [`MasterSecretManager::with_unlock`]
//! - Credential material is held in [`custody_common_secret::Secret`] and never logged
//! - Authentication failures are reported as [`KmsError::InvalidCredentials`], whatever failed
//! - Every persisted record is versioned; unknown versions are rejected

pub mod credentials;
pub mod enrollment;
pub mod error;
pub mod lease;
pub mod master;
pub mod quota;
pub mod service;
pub mod token;
pub mod types;
pub mod wrapping;

pub use custody_store::clock;
pub use custody_store::clock::{Clock, ManualClock, SystemClock};
pub use credentials::{gate_pepper, Credentials};
pub use enrollment::{EnrollmentInfo, EnrollmentSummary, KdfCalibration, KdfDescriptor};
pub use error::{KmsError, KmsResult, QuotaKind};
pub use lease::{LeaseInfo, LeaseInvalidReason, LeaseManager, LeaseRequest, LeaseVerification};
pub use master::{MasterSecret, MasterSecretManager, Mkek, UnlockContext, UnlockOutcome};
pub use quota::{QuotaSnapshot, QuotaState};
pub use service::{ErrorResponse, Kms, KmsBuilder, KmsRequest, KmsResponse, SignatureResult, UnlockReport};
pub use token::{verify_token, SignedToken, TokenClaims, CLOCK_SKEW_SECS};
pub use types::{EnrollmentMethod, KmsStatus, LeaseId, TokenId, DEFAULT_PURPOSE, KMS_VERSION};
pub use wrapping::{ApplicationKey, KeyMetadata, PublicKeyInfo, WrappedKey, WrappingService};
