// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key type classification.

use std::fmt;
use std::str::FromStr;

/// The family of a key held by the backend.
///
/// Every backend key-type tag maps onto exactly one family. `Unknown` is
/// never produced by classification; it only describes a key whose
/// metadata has not been resolved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Unknown,
    Symmetric,
    Rsa,
    Ecdsa,
    Ed25519,
    Hmac,
}

/// Backend key-type tag outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported key type {0:?}")]
pub struct UnsupportedKeyType(pub String);

impl KeyType {
    /// Classifies a backend key-type tag.
    pub fn from_tag(tag: &str) -> Result<Self, UnsupportedKeyType> {
        match tag {
            "aes128-gcm96" | "aes256-gcm96" | "chacha20-poly1305" => Ok(KeyType::Symmetric),
            "hmac" => Ok(KeyType::Hmac),
            "rsa-2048" | "rsa-3072" | "rsa-4096" => Ok(KeyType::Rsa),
            "ecdsa-p256" | "ecdsa-p384" | "ecdsa-p521" => Ok(KeyType::Ecdsa),
            "ed25519" => Ok(KeyType::Ed25519),
            other => Err(UnsupportedKeyType(other.to_string())),
        }
    }

    /// Returns the family name.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Unknown => "unknown",
            KeyType::Symmetric => "symmetric",
            KeyType::Rsa => "rsa",
            KeyType::Ecdsa => "ecdsa",
            KeyType::Ed25519 => "ed25519",
            KeyType::Hmac => "hmac",
        }
    }

    /// Returns true if keys of this family publish public key material.
    pub fn has_public_key(&self) -> bool {
        matches!(self, KeyType::Rsa | KeyType::Ecdsa | KeyType::Ed25519)
    }

    /// Returns the export endpoint kind for this family, if it has one.
    pub fn export_kind(&self) -> Option<ExportKind> {
        match self {
            KeyType::Rsa | KeyType::Ecdsa | KeyType::Ed25519 => Some(ExportKind::SigningKey),
            KeyType::Symmetric => Some(ExportKind::EncryptionKey),
            KeyType::Hmac => Some(ExportKind::HmacKey),
            KeyType::Unknown => None,
        }
    }
}

impl FromStr for KeyType {
    type Err = UnsupportedKeyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flavour of key material requested from the export endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    SigningKey,
    EncryptionKey,
    HmacKey,
}

impl ExportKind {
    /// Returns the path segment used by the export endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::SigningKey => "signing-key",
            ExportKind::EncryptionKey => "encryption-key",
            ExportKind::HmacKey => "hmac-key",
        }
    }

    /// Parses an export endpoint path segment.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "signing-key" => Some(ExportKind::SigningKey),
            "encryption-key" => Some(ExportKind::EncryptionKey),
            "hmac-key" => Some(ExportKind::HmacKey),
            _ => None,
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tag the classifier accepts.
pub const SUPPORTED_TAGS: &[&str] = &[
    "aes128-gcm96",
    "aes256-gcm96",
    "chacha20-poly1305",
    "hmac",
    "rsa-2048",
    "rsa-3072",
    "rsa-4096",
    "ecdsa-p256",
    "ecdsa-p384",
    "ecdsa-p521",
    "ed25519",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_supported_tags() {
        let expected = [
            ("aes128-gcm96", KeyType::Symmetric),
            ("aes256-gcm96", KeyType::Symmetric),
            ("chacha20-poly1305", KeyType::Symmetric),
            ("hmac", KeyType::Hmac),
            ("rsa-2048", KeyType::Rsa),
            ("rsa-3072", KeyType::Rsa),
            ("rsa-4096", KeyType::Rsa),
            ("ecdsa-p256", KeyType::Ecdsa),
            ("ecdsa-p384", KeyType::Ecdsa),
            ("ecdsa-p521", KeyType::Ecdsa),
            ("ed25519", KeyType::Ed25519),
        ];

        assert_eq!(expected.len(), SUPPORTED_TAGS.len());
        for (tag, key_type) in expected {
            assert_eq!(KeyType::from_tag(tag), Ok(key_type), "tag {tag}");
        }
    }

    #[test]
    fn test_classify_rejects_unknown() {
        for tag in ["", "unknown-cipher", "AES256-GCM96", "rsa-1024", "ecdsa-p224", " ed25519"] {
            assert_eq!(
                KeyType::from_tag(tag),
                Err(UnsupportedKeyType(tag.to_string()))
            );
        }
    }

    #[test]
    fn test_from_str() {
        let key_type: KeyType = "ecdsa-p384".parse().unwrap();
        assert_eq!(key_type, KeyType::Ecdsa);
        assert!("xchacha".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_public_key_families() {
        assert!(KeyType::Rsa.has_public_key());
        assert!(KeyType::Ecdsa.has_public_key());
        assert!(KeyType::Ed25519.has_public_key());
        assert!(!KeyType::Symmetric.has_public_key());
        assert!(!KeyType::Hmac.has_public_key());
        assert!(!KeyType::Unknown.has_public_key());
    }

    #[test]
    fn test_export_kinds() {
        assert_eq!(KeyType::Ed25519.export_kind(), Some(ExportKind::SigningKey));
        assert_eq!(KeyType::Symmetric.export_kind(), Some(ExportKind::EncryptionKey));
        assert_eq!(KeyType::Hmac.export_kind(), Some(ExportKind::HmacKey));
        assert_eq!(KeyType::Unknown.export_kind(), None);

        for kind in [ExportKind::SigningKey, ExportKind::EncryptionKey, ExportKind::HmacKey] {
            assert_eq!(ExportKind::from_segment(kind.as_str()), Some(kind));
        }
    }
}
