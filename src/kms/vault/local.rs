// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory transit engine.
//!
//! Serves the subset of the transit API used by [`VaultKms`] from keys
//! held in process memory. Suitable for development, tests and
//! benchmarks; key material is zeroized on drop.
//!
//! Supported key types are `aes256-gcm96`, `ed25519` and `hmac`.
//!
//! [`VaultKms`]: super::VaultKms

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use serde_json::{json, Map, Value};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kms::error::KmsError;
use crate::kms::key_type::ExportKind;

use super::transport::{Transport, TransportError};
use super::wire::{normalize_mount_path, split_envelope, wrap_envelope, VerifyItem};

const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;

/// Errors raised when administering a [`LocalTransit`].
#[derive(Debug, thiserror::Error)]
pub enum LocalTransitError {
    #[error("key type {0:?} is not supported by the local engine")]
    UnsupportedKeyType(String),

    #[error("key {0:?} already exists")]
    KeyExists(String),

    #[error("key {0:?} not found")]
    KeyNotFound(String),

    #[error("version {requested} is outside 1..={latest}")]
    InvalidVersion { requested: u32, latest: u32 },

    #[error("failed to generate key material")]
    KeyGeneration,

    #[error(transparent)]
    Mount(#[from] KmsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalKeyType {
    Aes256Gcm96,
    Ed25519,
    Hmac,
}

impl LocalKeyType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "aes256-gcm96" => Some(Self::Aes256Gcm96),
            "ed25519" => Some(Self::Ed25519),
            "hmac" => Some(Self::Hmac),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Aes256Gcm96 => "aes256-gcm96",
            Self::Ed25519 => "ed25519",
            Self::Hmac => "hmac",
        }
    }

    fn export_kind(self) -> ExportKind {
        match self {
            Self::Aes256Gcm96 => ExportKind::EncryptionKey,
            Self::Ed25519 => ExportKind::SigningKey,
            Self::Hmac => ExportKind::HmacKey,
        }
    }
}

/// One version of a key. For Ed25519 the secret is the seed.
#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyMaterial {
    secret: [u8; KEY_SIZE],
    #[zeroize(skip)]
    public: Option<Vec<u8>>,
    #[zeroize(skip)]
    created_at: u64,
}

struct LocalKey {
    key_type: LocalKeyType,
    versions: BTreeMap<u32, KeyMaterial>,
    min_decryption_version: u32,
    exportable: bool,
}

impl LocalKey {
    fn latest_version(&self) -> u32 {
        self.versions.keys().next_back().copied().unwrap_or(0)
    }

    /// Resolves a requested version; zero selects the latest.
    fn version_for_use(&self, requested: u32) -> Result<(u32, &KeyMaterial), String> {
        let latest = self.latest_version();
        let version = if requested == 0 { latest } else { requested };
        if version > latest {
            return Err(format!(
                "requested version {version} is newer than the latest version {latest}"
            ));
        }
        if version < self.min_decryption_version {
            return Err("ciphertext or signature version is disallowed by policy (too old)".into());
        }
        self.versions
            .get(&version)
            .map(|material| (version, material))
            .ok_or_else(|| format!("version {version} not found"))
    }

    fn metadata(&self, name: &str) -> Value {
        let keys: Map<String, Value> = self
            .versions
            .range(self.min_decryption_version..)
            .map(|(version, material)| {
                let entry = match &material.public {
                    Some(public) => json!({
                        "name": self.key_type.tag(),
                        "public_key": STANDARD.encode(public),
                        "creation_time": material.created_at,
                    }),
                    None => json!(material.created_at),
                };
                (version.to_string(), entry)
            })
            .collect();

        json!({
            "name": name,
            "type": self.key_type.tag(),
            "keys": keys,
            "latest_version": self.latest_version(),
            "min_decryption_version": self.min_decryption_version,
            "min_encryption_version": 0,
            "supports_encryption": self.key_type == LocalKeyType::Aes256Gcm96,
            "supports_decryption": self.key_type == LocalKeyType::Aes256Gcm96,
            "supports_signing": self.key_type == LocalKeyType::Ed25519,
            "supports_derivation": self.key_type != LocalKeyType::Hmac,
            "exportable": self.exportable,
            "auto_rotate_period": 0,
        })
    }
}

/// Nonce sequence yielding a single caller-chosen nonce.
struct SingleNonce {
    nonce: [u8; NONCE_LEN],
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        Nonce::try_assume_unique_for_key(&self.nonce)
    }
}

/// In-memory transit engine mounted at a single path.
pub struct LocalTransit {
    mount: String,
    keys: RwLock<HashMap<String, LocalKey>>,
    rng: SystemRandom,
}

impl LocalTransit {
    /// Creates an empty engine mounted at `mount_path`.
    pub fn new(mount_path: &str) -> Result<Self, LocalTransitError> {
        Ok(Self {
            mount: normalize_mount_path(mount_path)?,
            keys: RwLock::new(HashMap::new()),
            rng: SystemRandom::new(),
        })
    }

    /// Creates a key with one version.
    pub fn create_key(
        &self,
        name: &str,
        key_type: &str,
        exportable: bool,
    ) -> Result<(), LocalTransitError> {
        let key_type = LocalKeyType::from_tag(key_type)
            .ok_or_else(|| LocalTransitError::UnsupportedKeyType(key_type.to_string()))?;

        let mut keys = self.keys.write();
        if keys.contains_key(name) {
            return Err(LocalTransitError::KeyExists(name.to_string()));
        }

        let material = self.generate(key_type)?;
        keys.insert(
            name.to_string(),
            LocalKey {
                key_type,
                versions: BTreeMap::from([(1, material)]),
                min_decryption_version: 1,
                exportable,
            },
        );
        debug!(key = name, key_type = key_type.tag(), "Created local transit key");
        Ok(())
    }

    /// Adds a new version to a key and returns its number.
    pub fn rotate(&self, name: &str) -> Result<u32, LocalTransitError> {
        let mut keys = self.keys.write();
        let key = keys
            .get_mut(name)
            .ok_or_else(|| LocalTransitError::KeyNotFound(name.to_string()))?;

        let version = key.latest_version() + 1;
        let material = self.generate(key.key_type)?;
        key.versions.insert(version, material);
        Ok(version)
    }

    /// Retires every version below `version`.
    pub fn set_min_decryption_version(
        &self,
        name: &str,
        version: u32,
    ) -> Result<(), LocalTransitError> {
        let mut keys = self.keys.write();
        let key = keys
            .get_mut(name)
            .ok_or_else(|| LocalTransitError::KeyNotFound(name.to_string()))?;

        let latest = key.latest_version();
        if version == 0 || version > latest {
            return Err(LocalTransitError::InvalidVersion {
                requested: version,
                latest,
            });
        }
        key.min_decryption_version = version;
        Ok(())
    }

    fn generate(&self, key_type: LocalKeyType) -> Result<KeyMaterial, LocalTransitError> {
        let mut secret = [0u8; KEY_SIZE];
        self.rng
            .fill(&mut secret)
            .map_err(|_| LocalTransitError::KeyGeneration)?;

        let public = match key_type {
            LocalKeyType::Ed25519 => {
                let pair = Ed25519KeyPair::from_seed_unchecked(&secret)
                    .map_err(|_| LocalTransitError::KeyGeneration)?;
                Some(pair.public_key().as_ref().to_vec())
            }
            _ => None,
        };

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(KeyMaterial {
            secret,
            public,
            created_at,
        })
    }

    fn route<'a>(&self, path: &'a str) -> Option<Vec<&'a str>> {
        let rest = path.strip_prefix(&self.mount)?.strip_prefix('/')?;
        Some(rest.split('/').collect())
    }

    fn with_key<T>(
        &self,
        path: &str,
        escaped_name: &str,
        f: impl FnOnce(&str, &LocalKey) -> Result<T, String>,
    ) -> Result<Option<T>, TransportError> {
        let name = decode_name(path, escaped_name)?;
        let keys = self.keys.read();
        match keys.get(&name) {
            Some(key) => f(&name, key).map(Some).map_err(|e| bad_request(path, e)),
            None => Ok(None),
        }
    }

    fn encrypt(&self, key: &LocalKey, body: &Value) -> Result<Value, String> {
        if key.key_type != LocalKeyType::Aes256Gcm96 {
            return Err(format!("key type {} does not support encryption", key.key_type.tag()));
        }
        let plaintext = STANDARD
            .decode(string_field(body, "plaintext")?)
            .map_err(|_| "failed to base64-decode plaintext".to_string())?;
        let requested = u32_field(body, "key_version")?;
        let (version, material) = key.version_for_use(requested)?;

        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| "failed to generate nonce".to_string())?;

        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &material.secret)
            .map_err(|_| "invalid key material".to_string())?;
        let mut sealing = aead::SealingKey::new(unbound, SingleNonce { nonce });

        let mut in_out = plaintext;
        sealing
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| "encryption failed".to_string())?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&in_out);

        Ok(json!({
            "ciphertext": wrap_envelope(version, &STANDARD.encode(sealed)),
            "key_version": version,
        }))
    }

    fn decrypt(&self, key: &LocalKey, body: &Value) -> Result<Value, String> {
        if key.key_type != LocalKeyType::Aes256Gcm96 {
            return Err(format!("key type {} does not support decryption", key.key_type.tag()));
        }
        let (version, payload) = split_envelope(string_field(body, "ciphertext")?)
            .ok_or_else(|| "invalid ciphertext: no prefix".to_string())?;
        if version == 0 {
            return Err("invalid ciphertext: version is zero".into());
        }
        let (_, material) = key.version_for_use(version)?;

        let sealed = STANDARD
            .decode(payload)
            .map_err(|_| "invalid ciphertext: could not decode".to_string())?;
        if sealed.len() < NONCE_LEN + TAG_SIZE {
            return Err("invalid ciphertext: too short".into());
        }
        let (nonce_bytes, encrypted) = sealed.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &material.secret)
            .map_err(|_| "invalid key material".to_string())?;
        let mut opening = aead::OpeningKey::new(unbound, SingleNonce { nonce });

        let mut in_out = encrypted.to_vec();
        let plaintext = opening
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| "cipher: message authentication failed".to_string())?;

        Ok(json!({ "plaintext": STANDARD.encode(plaintext) }))
    }

    fn sign(&self, key: &LocalKey, body: &Value) -> Result<Value, String> {
        if key.key_type != LocalKeyType::Ed25519 {
            return Err(format!("key type {} does not support signing", key.key_type.tag()));
        }
        let input = STANDARD
            .decode(string_field(body, "input")?)
            .map_err(|_| "unable to decode input as base64".to_string())?;
        let requested = u32_field(body, "key_version")?;
        let (version, material) = key.version_for_use(requested)?;

        let pair = Ed25519KeyPair::from_seed_unchecked(&material.secret)
            .map_err(|_| "invalid key material".to_string())?;
        let signature = pair.sign(&input);

        Ok(json!({
            "signature": wrap_envelope(version, &URL_SAFE_NO_PAD.encode(signature.as_ref())),
            "key_version": version,
        }))
    }

    fn verify(&self, key: &LocalKey, body: &Value) -> Result<Value, String> {
        if key.key_type != LocalKeyType::Ed25519 {
            return Err(format!("key type {} does not support verification", key.key_type.tag()));
        }
        let batch: Vec<VerifyItem> = body
            .get("batch_input")
            .cloned()
            .ok_or_else(|| "missing batch_input".to_string())
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| format!("invalid batch_input: {e}"))
            })?;
        if batch.is_empty() {
            return Err("missing batch_input".into());
        }

        let results: Vec<Value> = batch
            .iter()
            .map(|item| match verify_item(key, item) {
                Ok(valid) => json!({ "valid": valid }),
                Err(error) => json!({ "valid": false, "error": error }),
            })
            .collect();

        Ok(json!({ "batch_results": results }))
    }

    fn export(
        &self,
        key: &LocalKey,
        name: &str,
        kind: ExportKind,
        version: &str,
    ) -> Result<Value, String> {
        if !key.exportable {
            return Err("private key material is not exportable".into());
        }
        if kind != key.key_type.export_kind() {
            return Err(format!(
                "{kind} export is not supported for key type {}",
                key.key_type.tag()
            ));
        }
        let version: u32 = match version {
            "latest" => key.latest_version(),
            raw => raw.parse().map_err(|_| format!("invalid key version {raw:?}"))?,
        };
        let material = key
            .versions
            .get(&version)
            .ok_or_else(|| format!("version {version} not found"))?;

        let encoded = match &material.public {
            Some(public) => {
                let mut full = material.secret.to_vec();
                full.extend_from_slice(public);
                let encoded = STANDARD.encode(&full);
                full.zeroize();
                encoded
            }
            None => STANDARD.encode(material.secret),
        };

        Ok(json!({
            "name": name,
            "type": key.key_type.tag(),
            "keys": { version.to_string(): encoded },
        }))
    }
}

fn verify_item(key: &LocalKey, item: &VerifyItem) -> Result<bool, String> {
    let (version, payload) = split_envelope(&item.signature)
        .ok_or_else(|| "invalid signature: no prefix".to_string())?;
    let (_, material) = key.version_for_use(version)?;
    let public = material
        .public
        .as_deref()
        .ok_or_else(|| "key has no public key".to_string())?;

    let input = STANDARD
        .decode(&item.input)
        .map_err(|_| "unable to decode input as base64".to_string())?;
    let raw_signature = match item.marshaling_algorithm.as_str() {
        "jws" => URL_SAFE_NO_PAD.decode(payload),
        _ => STANDARD.decode(payload),
    }
    .map_err(|_| "unable to decode signature".to_string())?;

    Ok(UnparsedPublicKey::new(&signature::ED25519, public)
        .verify(&input, &raw_signature)
        .is_ok())
}

fn decode_name(path: &str, escaped: &str) -> Result<String, TransportError> {
    percent_decode_str(escaped)
        .decode_utf8()
        .map(|name| name.into_owned())
        .map_err(|_| bad_request(path, "key name is not valid UTF-8".into()))
}

fn string_field<'a>(body: &'a Value, name: &str) -> Result<&'a str, String> {
    body.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {name}"))
}

fn u32_field(body: &Value, name: &str) -> Result<u32, String> {
    match body.get(name) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("invalid {name}")),
    }
}

fn bad_request(path: &str, error: String) -> TransportError {
    TransportError::Status {
        path: path.to_string(),
        status: 400,
        errors: vec![error],
    }
}

fn not_found(path: &str) -> TransportError {
    TransportError::Status {
        path: path.to_string(),
        status: 404,
        errors: vec![format!("no handler for route {path:?}")],
    }
}

#[async_trait]
impl Transport for LocalTransit {
    async fn read(&self, path: &str) -> Result<Option<Value>, TransportError> {
        let segments = self.route(path).ok_or_else(|| not_found(path))?;
        match segments.as_slice() {
            ["keys", name] => self.with_key(path, name, |name, key| Ok(key.metadata(name))),
            ["export", kind, name, version] => {
                let kind = ExportKind::from_segment(kind).ok_or_else(|| not_found(path))?;
                self.with_key(path, name, |name, key| self.export(key, name, kind, version))
            }
            _ => Err(not_found(path)),
        }
    }

    async fn write(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let segments = self.route(path).ok_or_else(|| not_found(path))?;
        let body = body.unwrap_or(Value::Null);

        let result = match segments.as_slice() {
            ["keys", name, "rotate"] => {
                self.rotate(&decode_name(path, name)?)
                    .map_err(|e| bad_request(path, e.to_string()))?;
                self.with_key(path, name, |name, key| Ok(key.metadata(name)))?
            }
            ["encrypt", name] => self.with_key(path, name, |_, key| self.encrypt(key, &body))?,
            ["decrypt", name] => self.with_key(path, name, |_, key| self.decrypt(key, &body))?,
            ["sign", name] => self.with_key(path, name, |_, key| self.sign(key, &body))?,
            ["verify", name] => self.with_key(path, name, |_, key| self.verify(key, &body))?,
            _ => return Err(not_found(path)),
        };

        // Writes to a missing key are rejected rather than answered empty.
        result
            .map(Some)
            .ok_or_else(|| bad_request(path, "encryption key not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kms::public_key::PublicKey;
    use crate::kms::traits::*;
    use crate::kms::vault::VaultKms;
    use ed25519_dalek::Verifier as _;

    fn engine() -> Arc<LocalTransit> {
        let engine = LocalTransit::new("transit").unwrap();
        engine.create_key("orders", "aes256-gcm96", true).unwrap();
        engine.create_key("tokens", "ed25519", false).unwrap();
        engine.create_key("macs", "hmac", true).unwrap();
        Arc::new(engine)
    }

    async fn client(engine: &Arc<LocalTransit>, key: &str) -> VaultKms {
        VaultKms::new(engine.clone(), "transit", key).await.unwrap()
    }

    #[test]
    fn test_create_key_validation() {
        let engine = engine();
        assert!(matches!(
            engine.create_key("orders", "aes256-gcm96", false),
            Err(LocalTransitError::KeyExists(_))
        ));
        assert!(matches!(
            engine.create_key("other", "rsa-2048", false),
            Err(LocalTransitError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            engine.set_min_decryption_version("orders", 5),
            Err(LocalTransitError::InvalidVersion { requested: 5, latest: 1 })
        ));
        assert!(matches!(
            engine.rotate("missing"),
            Err(LocalTransitError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_across_rotation() {
        let engine = engine();
        let kms = client(&engine, "orders").await;

        let old = kms.encrypt(b"first").await.unwrap();
        kms.rotate_key().await.unwrap();
        assert_eq!(kms.key_info().latest_version, 2);

        let new = kms.encrypt(b"second").await.unwrap();
        assert_eq!(kms.decrypt(&new).await.unwrap(), b"second".to_vec());

        // A bare payload is assumed to be from the latest version.
        assert!(kms.decrypt(&old).await.is_err());
        let mut enveloped = b"vault:v1:".to_vec();
        enveloped.extend_from_slice(&old);
        assert_eq!(kms.decrypt(&enveloped).await.unwrap(), b"first".to_vec());
    }

    #[tokio::test]
    async fn test_retired_version_cannot_decrypt() {
        let engine = engine();
        let kms = client(&engine, "orders").await;

        let old = kms.encrypt(b"first").await.unwrap();
        let mut enveloped = b"vault:v1:".to_vec();
        enveloped.extend_from_slice(&old);

        kms.rotate_key().await.unwrap();
        engine.set_min_decryption_version("orders", 2).unwrap();
        kms.refresh().await.unwrap();
        assert_eq!(kms.key_info().min_decryption_version, 2);

        match kms.decrypt(&enveloped).await {
            Err(KmsError::Transport { source, .. }) => assert_eq!(source.status(), Some(400)),
            other => panic!("expected a rejected decrypt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails() {
        let engine = engine();
        let kms = client(&engine, "orders").await;

        let ciphertext = kms.encrypt(b"payload").await.unwrap();
        let mut sealed = STANDARD.decode(&ciphertext).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        let tampered = STANDARD.encode(sealed).into_bytes();

        assert!(matches!(
            kms.decrypt(&tampered).await,
            Err(KmsError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_sign_verify_across_rotation() {
        let engine = engine();
        let kms = client(&engine, "tokens").await;

        let message = b"eyJhbGciOiJFZERTQSJ9.eyJzdWIiOiIxIn0";
        let old = kms.sign(message).await.unwrap();

        kms.rotate_key().await.unwrap();
        let new = kms.sign(message).await.unwrap();
        assert_ne!(old, new);

        kms.verify(message, &old).await.unwrap();
        kms.verify(message, &new).await.unwrap();
        assert_eq!(kms.verification_public_keys().await.unwrap().len(), 2);

        assert!(matches!(
            kms.verify(b"other message", &new).await,
            Err(KmsError::VerificationFailed { min: 1, max: 2, .. })
        ));

        engine.set_min_decryption_version("tokens", 2).unwrap();
        kms.refresh().await.unwrap();
        assert!(matches!(
            kms.verify(message, &old).await,
            Err(KmsError::VerificationFailed { min: 2, max: 2, .. })
        ));
        assert_eq!(kms.verification_public_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_checks_against_public_key() {
        let engine = engine();
        let kms = client(&engine, "tokens").await;

        let message = b"header.payload";
        let signature = kms.sign(message).await.unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&signature).unwrap();

        let PublicKey::Ed25519(verifying_key) = kms.public_key().await.unwrap() else {
            panic!("expected an Ed25519 public key");
        };
        let signature = ed25519_dalek::Signature::from_slice(&raw).unwrap();
        verifying_key.verify(message, &signature).unwrap();
    }

    #[tokio::test]
    async fn test_export() {
        let engine = engine();

        let orders = client(&engine, "orders").await;
        let exported = orders.export_key().await.unwrap();
        assert_eq!(STANDARD.decode(exported.material()).unwrap().len(), KEY_SIZE);

        let macs = client(&engine, "macs").await;
        assert!(macs.export_key().await.is_ok());
        assert!(matches!(
            macs.encrypt(b"x").await,
            Err(KmsError::CapabilityDenied { .. })
        ));

        let tokens = client(&engine, "tokens").await;
        assert!(matches!(
            tokens.export_key().await,
            Err(KmsError::CapabilityDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_export_ed25519_includes_public_key() {
        let engine = LocalTransit::new("transit").unwrap();
        engine.create_key("signer", "ed25519", true).unwrap();
        let engine = Arc::new(engine);
        let kms = client(&engine, "signer").await;

        let exported = kms.export_key().await.unwrap();
        let bytes = STANDARD.decode(exported.material()).unwrap();
        assert_eq!(bytes.len(), 64);

        let PublicKey::Ed25519(verifying_key) = kms.public_key().await.unwrap() else {
            panic!("expected an Ed25519 public key");
        };
        assert_eq!(&bytes[32..], verifying_key.as_bytes());
    }

    #[tokio::test]
    async fn test_escaped_key_names_and_nested_mounts() {
        let engine = LocalTransit::new("/team/transit/").unwrap();
        engine.create_key("orders key", "aes256-gcm96", false).unwrap();
        let engine = Arc::new(engine);

        let kms = VaultKms::new(engine, "team/transit", "orders key")
            .await
            .unwrap();
        let ciphertext = kms.encrypt(b"x").await.unwrap();
        assert_eq!(kms.decrypt(&ciphertext).await.unwrap(), b"x".to_vec());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let engine = engine();
        assert_eq!(engine.read("transit/keys/missing").await.unwrap(), None);

        let result = engine
            .write("transit/encrypt/missing", Some(json!({"plaintext": ""})))
            .await;
        assert!(matches!(result, Err(TransportError::Status { status: 400, .. })));

        let result = engine.read("other/keys/orders").await;
        assert!(matches!(result, Err(TransportError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_empty_plaintext_round_trip() {
        let engine = engine();
        let kms = client(&engine, "orders").await;

        let ciphertext = kms.encrypt(b"").await.unwrap();
        assert!(!ciphertext.is_empty());
        // The backend answers an empty plaintext, which the client rejects.
        assert!(matches!(
            kms.decrypt(&ciphertext).await,
            Err(KmsError::Protocol { .. })
        ));
    }
}
