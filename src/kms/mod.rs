// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key management abstraction.
//!
//! A KMS exposes one remote key through a set of capability traits:
//! [`Encryptor`], [`Decryptor`], [`Signer`], [`Verifier`], [`KeyRotator`],
//! [`PublicKeyExporter`] and [`KeyExporter`], gathered in
//! [`KeyManagementService`]. What a key can actually do depends on its
//! type and backend policy; unsupported operations fail locally without
//! contacting the backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │           KeyManagementService (traits)              │
//! ├──────────────────────────────────────────────────────┤
//! │  AuditedKms<K>  ──wraps──▶  VaultKms                 │
//! │                             │  KeyState (RwLock)     │
//! │                             ▼                        │
//! │                        Transport                     │
//! │               ┌─────────────┴─────────────┐          │
//! │         HttpTransport               LocalTransit     │
//! │      (reqwest + rustls)            (in-memory)       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transit_kms::kms::vault::{LocalTransit, VaultKms};
//! use transit_kms::kms::{Decryptor, Encryptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = LocalTransit::new("transit")?;
//!     engine.create_key("orders", "aes256-gcm96", false)?;
//!
//!     let kms = VaultKms::new(Arc::new(engine), "transit", "orders").await?;
//!     let ciphertext = kms.encrypt(b"card number").await?;
//!     assert_eq!(kms.decrypt(&ciphertext).await?, b"card number");
//!     Ok(())
//! }
//! ```

pub mod audit;
mod error;
mod key_type;
mod public_key;
mod traits;
pub mod vault;

pub use audit::{AuditEvent, AuditLogger, AuditSeverity, AuditedKms};
pub use error::{KeyRef, KmsError, Operation};
pub use key_type::{ExportKind, KeyType, UnsupportedKeyType, SUPPORTED_TAGS};
pub use public_key::{Fingerprint, PublicKey, PublicKeyError};
pub use traits::{
    Decryptor, Encryptor, ExportedKey, KeyExporter, KeyManagementService, KeyRotator,
    PublicKeyExporter, Signer, Verifier,
};
