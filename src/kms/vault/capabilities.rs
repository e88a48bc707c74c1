// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key capability resolution.
//!
//! Turns the backend's key metadata into a [`KeyState`]: key family,
//! version bounds, capability flags and the table of public keys that
//! are still valid for verification.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::kms::error::{KeyRef, KmsError, Operation};
use crate::kms::key_type::KeyType;
use crate::kms::public_key::{Fingerprint, PublicKey};

use super::transport::Transport;
use super::wire::{KeyMetadata, KeyPaths};

/// Resolved state of one backend key.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct KeyState {
    pub key_type: KeyType,
    pub latest_version: u32,
    pub min_decryption_version: u32,
    pub min_encryption_version: u32,
    pub can_encrypt: bool,
    pub can_decrypt: bool,
    pub can_sign: bool,
    pub can_export: bool,
    pub supports_derivation: bool,
    pub auto_rotate_period: Duration,
    pub public_keys: BTreeMap<u32, PublicKey>,
}

/// Public snapshot of a key's resolved capabilities.
///
/// Every field, public keys included, comes from the same resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfo {
    pub name: String,
    pub key_type: KeyType,
    pub latest_version: u32,
    pub min_decryption_version: u32,
    pub min_encryption_version: u32,
    pub supports_encryption: bool,
    pub supports_decryption: bool,
    pub supports_signing: bool,
    pub supports_derivation: bool,
    pub exportable: bool,
    pub auto_rotate_period: Duration,
    pub public_key_versions: Vec<u32>,
    /// Public keys still valid for verification, by version.
    #[serde(skip)]
    pub public_keys: BTreeMap<u32, PublicKey>,
}

impl KeyInfo {
    /// Returns the SHA-256 fingerprint of every public key, by version.
    pub fn fingerprints(&self) -> Result<Vec<(u32, Fingerprint)>, KmsError> {
        self.public_keys
            .iter()
            .map(|(version, key)| {
                key.fingerprint()
                    .map(|fingerprint| (*version, fingerprint))
                    .map_err(|source| KmsError::PublicKeyDecode {
                        key: KeyRef::new(&self.name, Some(*version)),
                        source,
                    })
            })
            .collect()
    }
}

impl KeyState {
    /// Builds the state from decoded key metadata.
    pub fn decode(key_name: &str, metadata: KeyMetadata) -> Result<Self, KmsError> {
        let key_type =
            KeyType::from_tag(&metadata.key_type).map_err(|e| KmsError::UnsupportedKeyType {
                key: key_name.to_string(),
                tag: e.0,
            })?;

        let protocol = |reason: String| KmsError::Protocol {
            operation: Operation::Resolve,
            key: KeyRef::new(key_name, None),
            reason,
        };

        let latest_version = metadata.latest_version;
        // Zero means "no minimum" on the backend side.
        let min_decryption_version = metadata.min_decryption_version.max(1);
        if latest_version < min_decryption_version {
            return Err(protocol(format!(
                "latest version {latest_version} is below minimum decryption version {min_decryption_version}"
            )));
        }

        let public_keys = if key_type.has_public_key() {
            decode_public_keys(key_name, key_type, min_decryption_version, &metadata)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            key_type,
            latest_version,
            min_decryption_version,
            min_encryption_version: metadata.min_encryption_version,
            can_encrypt: metadata.supports_encryption,
            can_decrypt: metadata.supports_decryption,
            can_sign: metadata.supports_signing,
            can_export: metadata.exportable,
            supports_derivation: metadata.supports_derivation,
            auto_rotate_period: metadata.auto_rotate_period,
            public_keys,
        })
    }

    /// Issues the metadata read and decodes the answer.
    pub async fn fetch(
        transport: &dyn Transport,
        paths: &KeyPaths,
        key_name: &str,
    ) -> Result<Self, KmsError> {
        let key = || KeyRef::new(key_name, None);

        let data = transport
            .read(&paths.metadata)
            .await
            .map_err(|source| KmsError::Transport {
                operation: Operation::Resolve,
                key: key(),
                source,
            })?
            .ok_or_else(|| KmsError::Protocol {
                operation: Operation::Resolve,
                key: key(),
                reason: "key not found or empty response".into(),
            })?;

        let metadata: KeyMetadata =
            serde_json::from_value(data).map_err(|e| KmsError::Protocol {
                operation: Operation::Resolve,
                key: key(),
                reason: format!("malformed key metadata: {e}"),
            })?;

        let state = Self::decode(key_name, metadata)?;
        debug!(
            key = %key_name,
            key_type = %state.key_type,
            latest_version = state.latest_version,
            min_decryption_version = state.min_decryption_version,
            public_keys = state.public_keys.len(),
            "Decoded key metadata"
        );
        Ok(state)
    }

    pub fn info(&self, name: &str) -> KeyInfo {
        KeyInfo {
            name: name.to_string(),
            key_type: self.key_type,
            latest_version: self.latest_version,
            min_decryption_version: self.min_decryption_version,
            min_encryption_version: self.min_encryption_version,
            supports_encryption: self.can_encrypt,
            supports_decryption: self.can_decrypt,
            supports_signing: self.can_sign,
            supports_derivation: self.supports_derivation,
            exportable: self.can_export,
            auto_rotate_period: self.auto_rotate_period,
            public_key_versions: self.public_keys.keys().copied().collect(),
            public_keys: self.public_keys.clone(),
        }
    }
}

fn decode_public_keys(
    key_name: &str,
    key_type: KeyType,
    min_version: u32,
    metadata: &KeyMetadata,
) -> Result<BTreeMap<u32, PublicKey>, KmsError> {
    let mut keys = BTreeMap::new();

    for (raw_version, entry) in &metadata.keys {
        let version: u32 = raw_version.parse().map_err(|_| KmsError::Protocol {
            operation: Operation::Resolve,
            key: KeyRef::new(key_name, None),
            reason: format!("invalid key version {raw_version:?}"),
        })?;

        // Retired versions keep no public material.
        if version < min_version {
            continue;
        }

        let blob = entry
            .get("public_key")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| KmsError::Protocol {
                operation: Operation::Resolve,
                key: KeyRef::new(key_name, Some(version)),
                reason: "version has no public key".into(),
            })?;

        let public_key =
            PublicKey::decode(key_type, blob).map_err(|source| KmsError::PublicKeyDecode {
                key: KeyRef::new(key_name, Some(version)),
                source,
            })?;
        keys.insert(version, public_key);
    }

    if keys.is_empty() {
        return Err(KmsError::Protocol {
            operation: Operation::Resolve,
            key: KeyRef::new(key_name, None),
            reason: format!("no public keys at or above version {min_version}"),
        });
    }

    Ok(keys)
}
