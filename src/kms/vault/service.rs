// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Vault transit-backed Key Management Service.
//!
//! The key never leaves the backend: every operation is one request to
//! the transit engine. Capabilities and key versions are resolved at
//! construction and refreshed after each rotation.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::kms::error::{KeyRef, KmsError, Operation};
use crate::kms::public_key::PublicKey;
use crate::kms::traits::{
    Decryptor, Encryptor, ExportedKey, KeyExporter, KeyManagementService, KeyRotator,
    PublicKeyExporter, Signer, Verifier,
};

use super::capabilities::{KeyInfo, KeyState};
use super::config::VaultConfig;
use super::http::HttpTransport;
use super::transport::Transport;
use super::wire::{
    split_envelope, wrap_envelope, DecryptRequest, DecryptResponse, EncryptRequest,
    EncryptResponse, ExportResponse, KeyPaths, SignRequest, SignResponse, VerifyItem,
    VerifyRequest, VerifyResponse, JWS_MARSHALING,
};

/// Client for a single transit key.
///
/// Safe to share across tasks. Operations work on a snapshot of the
/// resolved key state taken under a read lock; resolution replaces the
/// snapshot under the write lock, so an operation sees either the state
/// before a rotation or the state after it, never a mix.
pub struct VaultKms {
    transport: Arc<dyn Transport>,
    key_name: String,
    paths: KeyPaths,
    state: RwLock<Arc<KeyState>>,
    /// Serializes rotations and refreshes.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl VaultKms {
    /// Creates a client for `key_name` under `mount_path` and resolves the
    /// key's capabilities.
    ///
    /// Fails if the parameters are invalid, the backend is unreachable,
    /// the key doesn't exist or its type is unsupported.
    #[instrument(skip(transport), fields(kms = "vault"))]
    pub async fn new(
        transport: Arc<dyn Transport>,
        mount_path: &str,
        key_name: &str,
    ) -> Result<Self, KmsError> {
        let paths = KeyPaths::new(mount_path, key_name)?;
        let key_name = key_name.trim().to_string();

        let state = KeyState::fetch(transport.as_ref(), &paths, &key_name).await?;

        info!(
            key = %key_name,
            mount = %paths.mount,
            key_type = %state.key_type,
            latest_version = state.latest_version,
            "Resolved transit key"
        );

        Ok(Self {
            transport,
            key_name,
            paths,
            state: RwLock::new(Arc::new(state)),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates a client over HTTP from configuration.
    pub async fn from_config(config: &VaultConfig) -> Result<Self, KmsError> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Self::new(Arc::new(transport), &config.mount_path, &config.key_name).await
    }

    /// Returns the normalized mount path.
    pub fn mount_path(&self) -> &str {
        &self.paths.mount
    }

    /// Returns a snapshot of the resolved capabilities.
    pub fn key_info(&self) -> KeyInfo {
        self.snapshot().info(&self.key_name)
    }

    /// Re-reads the key metadata from the backend.
    ///
    /// Needed only when the key is changed out of band; rotations through
    /// this client refresh automatically.
    #[instrument(skip(self), fields(kms = "vault", key = %self.key_name))]
    pub async fn refresh(&self) -> Result<(), KmsError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), KmsError> {
        let state = KeyState::fetch(self.transport.as_ref(), &self.paths, &self.key_name).await?;
        let latest_version = state.latest_version;
        *self.state.write() = Arc::new(state);
        debug!(latest_version, "Refreshed key state");
        Ok(())
    }

    fn snapshot(&self) -> Arc<KeyState> {
        Arc::clone(&self.state.read())
    }

    fn key_ref(&self, version: u32) -> KeyRef {
        KeyRef::new(&self.key_name, Some(version))
    }

    fn require(
        &self,
        operation: Operation,
        allowed: bool,
        reason: &'static str,
    ) -> Result<(), KmsError> {
        if allowed {
            return Ok(());
        }
        warn!(key = %self.key_name, %operation, reason, "Operation denied");
        Err(KmsError::CapabilityDenied {
            operation,
            key: self.key_name.clone(),
            reason,
        })
    }

    fn protocol(&self, operation: Operation, version: u32, reason: impl Into<String>) -> KmsError {
        KmsError::Protocol {
            operation,
            key: self.key_ref(version),
            reason: reason.into(),
        }
    }

    fn decode_data<T: DeserializeOwned>(
        &self,
        operation: Operation,
        version: u32,
        data: Option<serde_json::Value>,
    ) -> Result<T, KmsError> {
        let data = data.ok_or_else(|| self.protocol(operation, version, "empty response"))?;
        serde_json::from_value(data)
            .map_err(|e| self.protocol(operation, version, format!("malformed response: {e}")))
    }

    async fn write<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        operation: Operation,
        version: u32,
        path: &str,
        request: &Req,
    ) -> Result<Resp, KmsError> {
        let body = serde_json::to_value(request)
            .map_err(|e| self.protocol(operation, version, format!("unencodable request: {e}")))?;

        let data = self
            .transport
            .write(path, Some(body))
            .await
            .map_err(|source| KmsError::Transport {
                operation,
                key: self.key_ref(version),
                source,
            })?;

        self.decode_data(operation, version, data)
    }

    async fn read<Resp: DeserializeOwned>(
        &self,
        operation: Operation,
        version: u32,
        path: &str,
    ) -> Result<Resp, KmsError> {
        let data = self
            .transport
            .read(path)
            .await
            .map_err(|source| KmsError::Transport {
                operation,
                key: self.key_ref(version),
                source,
            })?;

        self.decode_data(operation, version, data)
    }

    /// Strips the envelope from a non-empty response field.
    fn unwrap_field(
        &self,
        operation: Operation,
        version: u32,
        field: &'static str,
        value: Option<String>,
    ) -> Result<String, KmsError> {
        let value = value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| self.protocol(operation, version, format!("response has no {field}")))?;

        match split_envelope(&value) {
            Some((_, payload)) if !payload.is_empty() => Ok(payload.to_string()),
            Some(_) => Err(self.protocol(operation, version, format!("{field} payload is empty"))),
            None => Err(self.protocol(
                operation,
                version,
                format!("{field} is missing the version envelope"),
            )),
        }
    }

    fn require_public_key(&self, state: &KeyState) -> Result<(), KmsError> {
        if state.key_type.has_public_key() {
            return Ok(());
        }
        Err(KmsError::NoPublicKey {
            key: self.key_name.clone(),
            key_type: state.key_type,
        })
    }
}

#[async_trait]
impl Encryptor for VaultKms {
    #[instrument(skip(self, plaintext), fields(kms = "vault", key = %self.key_name))]
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let state = self.snapshot();
        self.require(
            Operation::Encrypt,
            state.can_encrypt,
            "key does not support encryption",
        )?;
        let version = state.latest_version;
        self.require(Operation::Encrypt, version >= 1, "key has no versions")?;

        let request = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
            key_version: version,
        };
        let response: EncryptResponse = self
            .write(Operation::Encrypt, version, &self.paths.encrypt, &request)
            .await?;

        let ciphertext =
            self.unwrap_field(Operation::Encrypt, version, "ciphertext", response.ciphertext)?;
        debug!(version, len = ciphertext.len(), "Encrypted");
        Ok(ciphertext.into_bytes())
    }
}

#[async_trait]
impl Decryptor for VaultKms {
    #[instrument(skip(self, ciphertext), fields(kms = "vault", key = %self.key_name))]
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let state = self.snapshot();
        self.require(
            Operation::Decrypt,
            state.can_decrypt,
            "key does not support decryption",
        )?;
        let version = state.latest_version;

        let ciphertext = std::str::from_utf8(ciphertext).map_err(|_| KmsError::InvalidInput {
            operation: Operation::Decrypt,
            reason: "ciphertext is not valid UTF-8",
        })?;
        if ciphertext.is_empty() {
            return Err(KmsError::InvalidInput {
                operation: Operation::Decrypt,
                reason: "ciphertext is empty",
            });
        }

        // Enveloped input already names its version; bare payloads get the newest.
        let enveloped = match split_envelope(ciphertext) {
            Some(_) => ciphertext.to_string(),
            None => wrap_envelope(version, ciphertext),
        };

        let request = DecryptRequest {
            ciphertext: enveloped,
        };
        let response: DecryptResponse = self
            .write(Operation::Decrypt, version, &self.paths.decrypt, &request)
            .await?;

        let plaintext = response
            .plaintext
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                self.protocol(Operation::Decrypt, version, "response has no plaintext")
            })?;

        STANDARD.decode(plaintext).map_err(|e| {
            self.protocol(
                Operation::Decrypt,
                version,
                format!("plaintext is not valid base64: {e}"),
            )
        })
    }
}

#[async_trait]
impl Signer for VaultKms {
    #[instrument(skip(self, protected), fields(kms = "vault", key = %self.key_name))]
    async fn sign(&self, protected: &[u8]) -> Result<Vec<u8>, KmsError> {
        let state = self.snapshot();
        self.require(Operation::Sign, state.can_sign, "key does not support signing")?;
        let version = state.latest_version;

        let request = SignRequest {
            input: STANDARD.encode(protected),
            marshaling_algorithm: JWS_MARSHALING,
            key_version: version,
        };
        let response: SignResponse = self
            .write(Operation::Sign, version, &self.paths.sign, &request)
            .await?;

        let signature =
            self.unwrap_field(Operation::Sign, version, "signature", response.signature)?;
        debug!(version, "Signed");
        Ok(signature.into_bytes())
    }
}

#[async_trait]
impl Verifier for VaultKms {
    #[instrument(skip(self, protected, signature), fields(kms = "vault", key = %self.key_name))]
    async fn verify(&self, protected: &[u8], signature: &[u8]) -> Result<(), KmsError> {
        let state = self.snapshot();
        self.require(Operation::Verify, state.can_sign, "key does not support signing")?;

        let signature = std::str::from_utf8(signature).map_err(|_| KmsError::InvalidInput {
            operation: Operation::Verify,
            reason: "signature is not valid UTF-8",
        })?;
        let bare = split_envelope(signature).map_or(signature, |(_, payload)| payload);
        if bare.is_empty() {
            return Err(KmsError::InvalidInput {
                operation: Operation::Verify,
                reason: "signature is empty",
            });
        }

        let min = state.min_decryption_version;
        let max = state.latest_version;
        let input = STANDARD.encode(protected);
        let batch_input: Vec<VerifyItem> = (min..=max)
            .map(|version| VerifyItem {
                key_version: version,
                marshaling_algorithm: JWS_MARSHALING.to_string(),
                signature: wrap_envelope(version, bare),
                input: input.clone(),
            })
            .collect();

        let response: VerifyResponse = self
            .write(
                Operation::Verify,
                max,
                &self.paths.verify,
                &VerifyRequest { batch_input },
            )
            .await?;

        if response.batch_results.is_empty() {
            return Err(self.protocol(Operation::Verify, max, "response has no batch results"));
        }

        if response.batch_results.iter().any(|r| r.valid) {
            debug!(min, max, "Signature verified");
            return Ok(());
        }

        for result in response.batch_results.iter().filter_map(|r| r.error.as_deref()) {
            debug!(error = result, "Verification candidate rejected");
        }
        Err(KmsError::VerificationFailed {
            key: self.key_name.clone(),
            min,
            max,
        })
    }
}

#[async_trait]
impl KeyRotator for VaultKms {
    #[instrument(skip(self), fields(kms = "vault", key = %self.key_name))]
    async fn rotate_key(&self) -> Result<(), KmsError> {
        let _guard = self.refresh_lock.lock().await;
        let previous = self.snapshot().latest_version;

        let response = self
            .transport
            .write(&self.paths.rotate, None)
            .await
            .map_err(|source| KmsError::Transport {
                operation: Operation::Rotate,
                key: self.key_ref(previous),
                source,
            })?;
        if response.is_none() {
            return Err(self.protocol(Operation::Rotate, previous, "empty response"));
        }

        self.refresh_locked()
            .await
            .map_err(|e| KmsError::RotationRefresh {
                key: self.key_name.clone(),
                source: Box::new(e),
            })?;

        info!(
            previous_version = previous,
            latest_version = self.snapshot().latest_version,
            "Rotated transit key"
        );
        Ok(())
    }
}

#[async_trait]
impl PublicKeyExporter for VaultKms {
    #[instrument(skip(self), fields(kms = "vault", key = %self.key_name))]
    async fn public_key(&self) -> Result<PublicKey, KmsError> {
        let state = self.snapshot();
        self.require_public_key(&state)?;

        state
            .public_keys
            .get(&state.latest_version)
            .cloned()
            .ok_or_else(|| {
                self.protocol(
                    Operation::PublicKey,
                    state.latest_version,
                    "no public key for the latest version",
                )
            })
    }

    #[instrument(skip(self), fields(kms = "vault", key = %self.key_name))]
    async fn verification_public_keys(&self) -> Result<Vec<PublicKey>, KmsError> {
        let state = self.snapshot();
        self.require_public_key(&state)?;

        Ok(state
            .public_keys
            .range(state.min_decryption_version..)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[async_trait]
impl KeyExporter for VaultKms {
    #[instrument(skip(self), fields(kms = "vault", key = %self.key_name))]
    async fn export_key(&self) -> Result<ExportedKey, KmsError> {
        let state = self.snapshot();
        self.require(Operation::Export, state.can_export, "key is not exportable")?;
        let kind = state.key_type.export_kind().ok_or_else(|| KmsError::UnsupportedKeyType {
            key: self.key_name.clone(),
            tag: state.key_type.to_string(),
        })?;
        let version = state.latest_version;

        let response: ExportResponse = self
            .read(Operation::Export, version, &self.paths.export(kind, version))
            .await?;

        if response.name != self.key_name {
            return Err(self.protocol(
                Operation::Export,
                version,
                format!("exported key is named {:?}", response.name),
            ));
        }

        let mut keys = response.keys.into_iter();
        let material = match (keys.next(), keys.next()) {
            (Some((_, material)), None) => material,
            (None, _) => {
                return Err(self.protocol(Operation::Export, version, "no key material returned"))
            }
            (Some(_), Some(_)) => {
                return Err(self.protocol(
                    Operation::Export,
                    version,
                    format!("expected one key version, got {}", 2 + keys.count()),
                ))
            }
        };

        warn!(version, kind = %kind, "Exported key material");
        Ok(ExportedKey::new(state.key_type, material))
    }
}

impl KeyManagementService for VaultKms {
    fn key_id(&self) -> &str {
        &self.key_name
    }
}
