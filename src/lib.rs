// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transit KMS: a typed client for remote keys held by a Vault transit
//! engine.
//!
//! The crate provides a uniform key management interface
//! ([`kms::KeyManagementService`]) and a Vault transit backend
//! ([`kms::vault::VaultKms`]) that resolves each key's capabilities,
//! tracks its versions across rotations and translates between the
//! transit wire format and typed results.

pub mod kms;
pub mod logging;
pub mod net;

pub use kms::vault::{HttpTransport, KeyInfo, LocalTransit, Transport, VaultConfig, VaultKms};
pub use kms::{
    AuditedKms, Decryptor, Encryptor, ExportedKey, KeyExporter, KeyManagementService,
    KeyRotator, KeyType, KmsError, PublicKey, PublicKeyExporter, Signer, Verifier,
};
