// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Decoding of backend-published public keys.
//!
//! RSA and ECDSA keys arrive as PEM-encoded SubjectPublicKeyInfo blocks,
//! Ed25519 keys as standard base64 of the raw 32 key bytes. Symmetric and
//! HMAC keys have no public half and are rejected up front.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pkcs8::der::Decode;
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding, ObjectIdentifier};
use ring::digest::{digest, SHA256};

use super::key_type::KeyType;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

const ED25519_KEY_LEN: usize = 32;

/// Errors raised while decoding a public key blob.
#[derive(Debug, thiserror::Error)]
pub enum PublicKeyError {
    #[error("{0} keys don't have a public key")]
    NotAsymmetric(KeyType),

    #[error("no PEM block found: {0}")]
    NoPemBlock(#[source] pkcs8::der::pem::Error),

    #[error("unexpected PEM label {0:?}")]
    UnexpectedLabel(String),

    #[error("failed to parse PKIX public key: {0}")]
    Pkix(String),

    #[error("expected {expected} public key, found algorithm {found}")]
    Mismatch {
        expected: KeyType,
        found: ObjectIdentifier,
    },

    #[error("unsupported elliptic curve {0}")]
    UnsupportedCurve(ObjectIdentifier),

    #[error("invalid base64 public key: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid Ed25519 public key length: expected {ED25519_KEY_LEN}, got {0}")]
    Ed25519Length(usize),

    #[error("invalid Ed25519 public key: {0}")]
    Ed25519(#[source] ed25519_dalek::SignatureError),

    #[error("failed to encode public key: {0}")]
    Encode(String),
}

/// A decoded public key of one of the asymmetric key families.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    EcdsaP521(p521::PublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Decodes a backend public key blob for a key of the given family.
    pub fn decode(key_type: KeyType, blob: &str) -> Result<Self, PublicKeyError> {
        match key_type {
            KeyType::Rsa | KeyType::Ecdsa => decode_pkix(key_type, blob),
            KeyType::Ed25519 => decode_ed25519(blob),
            other => Err(PublicKeyError::NotAsymmetric(other)),
        }
    }

    /// Returns the key family.
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Rsa(_) => KeyType::Rsa,
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) | PublicKey::EcdsaP521(_) => {
                KeyType::Ecdsa
            }
            PublicKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Encodes the key as DER SubjectPublicKeyInfo.
    pub fn to_public_key_der(&self) -> Result<Vec<u8>, PublicKeyError> {
        let document = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::EcdsaP256(key) => key.to_public_key_der(),
            PublicKey::EcdsaP384(key) => key.to_public_key_der(),
            PublicKey::EcdsaP521(key) => key.to_public_key_der(),
            PublicKey::Ed25519(key) => key.to_public_key_der(),
        }
        .map_err(|e| PublicKeyError::Encode(e.to_string()))?;

        Ok(document.as_bytes().to_vec())
    }

    /// Encodes the key as a PEM `PUBLIC KEY` block.
    pub fn to_public_key_pem(&self) -> Result<String, PublicKeyError> {
        match self {
            PublicKey::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::EcdsaP256(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::EcdsaP384(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::EcdsaP521(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::Ed25519(key) => key.to_public_key_pem(LineEnding::LF),
        }
        .map_err(|e| PublicKeyError::Encode(e.to_string()))
    }

    /// Returns the SHA-256 fingerprint of the DER SubjectPublicKeyInfo.
    pub fn fingerprint(&self) -> Result<Fingerprint, PublicKeyError> {
        let der = self.to_public_key_der()?;
        let mut out = [0u8; 32];
        out.copy_from_slice(digest(&SHA256, &der).as_ref());
        Ok(Fingerprint(out))
    }
}

/// SHA-256 fingerprint of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Returns the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

fn decode_pkix(expected: KeyType, blob: &str) -> Result<PublicKey, PublicKeyError> {
    let (label, der) =
        pkcs8::der::pem::decode_vec(blob.trim().as_bytes()).map_err(PublicKeyError::NoPemBlock)?;
    if label != "PUBLIC KEY" {
        return Err(PublicKeyError::UnexpectedLabel(label.to_string()));
    }

    let spki =
        SubjectPublicKeyInfoRef::from_der(&der).map_err(|e| PublicKeyError::Pkix(e.to_string()))?;
    let algorithm = spki.algorithm.oid;

    match expected {
        KeyType::Rsa if algorithm == RSA_ENCRYPTION => rsa::RsaPublicKey::from_public_key_der(&der)
            .map(PublicKey::Rsa)
            .map_err(|e| PublicKeyError::Pkix(e.to_string())),
        KeyType::Ecdsa if algorithm == EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|e| PublicKeyError::Pkix(e.to_string()))?;
            decode_ecdsa(curve, &der)
        }
        _ => Err(PublicKeyError::Mismatch {
            expected,
            found: algorithm,
        }),
    }
}

fn decode_ecdsa(curve: ObjectIdentifier, der: &[u8]) -> Result<PublicKey, PublicKeyError> {
    let pkix = |e: pkcs8::spki::Error| PublicKeyError::Pkix(e.to_string());
    if curve == SECP256R1 {
        p256::PublicKey::from_public_key_der(der)
            .map(PublicKey::EcdsaP256)
            .map_err(pkix)
    } else if curve == SECP384R1 {
        p384::PublicKey::from_public_key_der(der)
            .map(PublicKey::EcdsaP384)
            .map_err(pkix)
    } else if curve == SECP521R1 {
        p521::PublicKey::from_public_key_der(der)
            .map(PublicKey::EcdsaP521)
            .map_err(pkix)
    } else {
        Err(PublicKeyError::UnsupportedCurve(curve))
    }
}

fn decode_ed25519(blob: &str) -> Result<PublicKey, PublicKeyError> {
    let bytes = STANDARD.decode(blob.trim())?;
    let raw: [u8; ED25519_KEY_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| PublicKeyError::Ed25519Length(bytes.len()))?;

    ed25519_dalek::VerifyingKey::from_bytes(&raw)
        .map(PublicKey::Ed25519)
        .map_err(PublicKeyError::Ed25519)
}
