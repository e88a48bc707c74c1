// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Capability traits shared by every KMS backend.

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::KmsError;
use super::key_type::KeyType;
use super::public_key::PublicKey;

/// Raw key material returned by an export.
///
/// The material is zeroized when this value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExportedKey {
    #[zeroize(skip)]
    key_type: KeyType,
    material: String,
}

impl ExportedKey {
    /// Creates a new exported key.
    pub fn new(key_type: KeyType, material: String) -> Self {
        Self { key_type, material }
    }

    /// Returns the family of the exported key.
    #[inline]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Returns the key material exactly as the backend encoded it.
    ///
    /// # Security
    ///
    /// The returned slice references material that will be zeroized
    /// when this value is dropped. Do not store copies.
    #[inline]
    pub fn material(&self) -> &str {
        &self.material
    }
}

impl std::fmt::Debug for ExportedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedKey")
            .field("key_type", &self.key_type)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts data with the newest key version.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext` and returns the bare ciphertext payload.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError>;
}

/// Decrypts data produced by an [`Encryptor`].
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Decrypts a ciphertext payload.
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError>;
}

/// Produces JWS-marshaled signatures.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `protected` with the newest key version.
    async fn sign(&self, protected: &[u8]) -> Result<Vec<u8>, KmsError>;
}

/// Verifies signatures produced by any live key version.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Returns `Ok(())` if some live key version accepts the signature.
    async fn verify(&self, protected: &[u8], signature: &[u8]) -> Result<(), KmsError>;
}

/// Rotates the key to a new version.
#[async_trait]
pub trait KeyRotator: Send + Sync {
    async fn rotate_key(&self) -> Result<(), KmsError>;
}

/// Exposes public key material of asymmetric keys.
#[async_trait]
pub trait PublicKeyExporter: Send + Sync {
    /// Returns the public key of the newest version.
    async fn public_key(&self) -> Result<PublicKey, KmsError>;

    /// Returns the public keys of every version still valid for verification.
    async fn verification_public_keys(&self) -> Result<Vec<PublicKey>, KmsError>;
}

/// Exports raw key material of exportable keys.
#[async_trait]
pub trait KeyExporter: Send + Sync {
    async fn export_key(&self) -> Result<ExportedKey, KmsError>;
}

/// Key Management Service interface.
///
/// A single remote key exposing every capability. Operations a key does
/// not support fail with [`KmsError::CapabilityDenied`] or
/// [`KmsError::NoPublicKey`] without contacting the backend.
pub trait KeyManagementService:
    Encryptor + Decryptor + Signer + Verifier + KeyRotator + PublicKeyExporter + KeyExporter
{
    /// Returns the name of the key this service operates on.
    fn key_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exported_key_debug_redacts_material() {
        let key = ExportedKey::new(KeyType::Hmac, "c2VjcmV0".into());
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("c2VjcmV0"));
        assert_eq!(key.material(), "c2VjcmV0");
        assert_eq!(key.key_type(), KeyType::Hmac);
    }
}
