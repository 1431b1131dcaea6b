// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod audit;
mod kdf;
mod lease;
mod logging;
mod store;

pub use audit::{AuditConfig, AuditConfigLayer};
pub use kdf::{KdfConfig, KdfConfigLayer};
pub use lease::{LeaseConfig, LeaseConfigLayer, QuotaConfig, QuotaConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use store::{StoreConfig, StoreConfigLayer};
