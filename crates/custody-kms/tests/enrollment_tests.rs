// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enrollment and unlock through the [`Kms`] facade.
//!
//! Tests cover:
//! - Passphrase, passkey PRF and gate enrollments unlocking one master secret
//! - Generic failures for wrong or unenrolled credentials
//! - Removal, including refusal to remove the last enrollment
//! - Audit key rotation and anchors

mod common;

use common::{kms, passphrase, provisioned, ENDPOINT};
use custody_audit::{AuditOperation, ChainErrorKind};
use custody_kms::{Credentials, EnrollmentMethod, KmsError, KmsStatus, LeaseRequest};

fn prf() -> Credentials {
	Credentials::passkey_prf("cred-prf", vec![7u8; 32]).with_prf_eval_salt(vec![1u8; 32])
}

fn gate_credentials(kms: &custody_kms::Kms) -> Credentials {
	Credentials::passkey_gate("cred-gate", kms.gate_pepper().expose().clone())
}

#[tokio::test]
async fn uninitialized_service_reports_not_configured() {
	let (kms, _clock) = kms().await;
	assert_eq!(kms.status().await.unwrap(), KmsStatus::Uninitialized);
	assert!(matches!(kms.unlock(&passphrase()).await, Err(KmsError::NotConfigured)));
	assert!(matches!(
		kms.generate_application_key(&passphrase(), None).await,
		Err(KmsError::NotConfigured)
	));
}

#[tokio::test]
async fn every_enrollment_unlocks_the_same_keys() {
	let (kms, _clock, kid) = provisioned().await;
	let gate = gate_credentials(&kms);

	kms.enroll(&passphrase(), &prf()).await.unwrap();
	kms.enroll(&prf(), &gate).await.unwrap();

	assert_eq!(
		kms.status().await.unwrap(),
		KmsStatus::Enrolled {
			methods: vec![
				EnrollmentMethod::Passphrase,
				EnrollmentMethod::PasskeyPrf,
				EnrollmentMethod::PasskeyGate,
			]
		}
	);

	for credentials in [passphrase(), prf(), gate] {
		let signature = kms.sign(&credentials, Some(&kid), b"payload").await.unwrap();
		assert_eq!(signature.kid, kid);
	}

	let info = kms.enrollment_info(EnrollmentMethod::PasskeyPrf).await.unwrap().unwrap();
	assert_eq!(info.credential_id.as_deref(), Some("cred-prf"));
	assert_eq!(info.prf_eval_salt, Some(vec![1u8; 32]));
}

#[tokio::test]
async fn failures_do_not_say_what_was_wrong() {
	let (kms, _clock, _kid) = provisioned().await;
	kms.enroll(&passphrase(), &prf()).await.unwrap();

	let attempts = [
		Credentials::passphrase("wrong passphrase entirely"),
		Credentials::passkey_prf("cred-prf", vec![8u8; 32]),
		Credentials::passkey_prf("other-credential", vec![7u8; 32]),
		Credentials::passkey_gate("cred-gate", vec![9u8; 32]),
	];
	for credentials in attempts {
		let err = kms.unlock(&credentials).await.unwrap_err();
		assert!(matches!(err, KmsError::InvalidCredentials), "{err:?}");
		assert_eq!(err.to_string(), "invalid credentials");
	}
}

#[tokio::test]
async fn malformed_material_is_an_invalid_request() {
	let (kms, _clock, _kid) = provisioned().await;
	let short_prf = Credentials::passkey_prf("cred", vec![1u8; 16]);
	assert!(matches!(
		kms.enroll(&passphrase(), &short_prf).await,
		Err(KmsError::InvalidRequest(_))
	));
	assert!(matches!(
		kms.enroll(&passphrase(), &Credentials::passphrase("short")).await,
		Err(KmsError::InvalidRequest(_))
	));
}

#[tokio::test]
async fn second_setup_is_rejected() {
	let (kms, _clock, _kid) = provisioned().await;
	assert!(matches!(
		kms.setup(&Credentials::passphrase("another long passphrase")).await,
		Err(KmsError::AlreadyInitialized)
	));
}

#[tokio::test]
async fn last_enrollment_cannot_be_removed() {
	let (kms, _clock, _kid) = provisioned().await;
	kms.enroll(&passphrase(), &prf()).await.unwrap();

	let remaining = kms
		.remove_enrollment(&prf(), EnrollmentMethod::Passphrase)
		.await
		.unwrap();
	assert_eq!(remaining, vec![EnrollmentMethod::PasskeyPrf]);
	assert!(matches!(kms.unlock(&passphrase()).await, Err(KmsError::InvalidCredentials)));

	assert!(matches!(
		kms.remove_enrollment(&prf(), EnrollmentMethod::PasskeyPrf).await,
		Err(KmsError::LastEnrollment)
	));
	assert!(kms.unlock(&prf()).await.is_ok());

	let ops: Vec<_> = kms.get_audit_log(0, 100).await.unwrap().into_iter().map(|e| e.op).collect();
	assert!(ops.contains(&AuditOperation::EnrollmentAdded));
	assert!(ops.contains(&AuditOperation::EnrollmentRemoved));
}

#[tokio::test]
async fn audit_rotation_keeps_chain_verifiable() {
	let (kms, _clock, _kid) = provisioned().await;
	let before = kms.audit_public_keys().await.unwrap();
	assert_eq!(before.len(), 1);

	let rotation = kms.rotate_audit_key(&passphrase()).await.unwrap();
	assert_eq!(rotation.op, AuditOperation::AuditKeyRotated);
	kms.create_lease(&passphrase(), LeaseRequest::new("user-1", vec![ENDPOINT.to_string()]))
		.await
		.unwrap();

	let keys = kms.audit_public_keys().await.unwrap();
	assert_eq!(keys.len(), 2);
	assert!(kms.ensure_audit_chain().await.unwrap().valid);
}

#[tokio::test]
async fn anchor_taken_earlier_still_verifies() {
	let (kms, _clock, _kid) = provisioned().await;
	let anchor = kms.audit_anchor().await.unwrap();
	kms.unlock(&passphrase()).await.unwrap();

	let verification = kms.verify_audit_chain_against(&anchor).await.unwrap();
	assert!(verification.valid);
	assert!(!verification.has(ChainErrorKind::Truncated));
}

#[tokio::test]
async fn rotation_requires_credentials() {
	let (kms, _clock, _kid) = provisioned().await;
	assert!(matches!(
		kms.rotate_audit_key(&Credentials::passphrase("not the passphrase")).await,
		Err(KmsError::InvalidCredentials)
	));
	assert_eq!(kms.audit_public_keys().await.unwrap().len(), 1);
}
