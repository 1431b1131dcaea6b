// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::Arc;

use custody_config::CustodyConfig;
use custody_kms::{Credentials, Kms, ManualClock};
use custody_store::MemoryStore;

pub const PASSPHRASE: &str = "correct horse battery staple";
pub const ENDPOINT: &str = "https://api.example.com/notify";

pub fn passphrase() -> Credentials {
	Credentials::passphrase(PASSPHRASE)
}

/// A service over a fresh in-memory store with a manual clock.
pub async fn kms_with(config: CustodyConfig) -> (Kms, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::default());
	let kms = Kms::builder(Arc::new(MemoryStore::new()))
		.config(config)
		.clock(clock.clone())
		.build()
		.await
		.unwrap();
	(kms, clock)
}

pub async fn kms() -> (Kms, Arc<ManualClock>) {
	kms_with(CustodyConfig::for_tests()).await
}

/// Set up with the passphrase and generate a signing key.
pub async fn provisioned() -> (Kms, Arc<ManualClock>, String) {
	let (kms, clock) = kms().await;
	kms.setup(&passphrase()).await.unwrap();
	let key = kms.generate_application_key(&passphrase(), None).await.unwrap();
	(kms, clock, key.kid)
}
