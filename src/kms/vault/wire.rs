// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transit engine wire format: request paths, payloads and the
//! `vault:v<N>:` ciphertext/signature envelope.

use std::collections::HashMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Deserializer, Serialize};

use crate::kms::error::KmsError;
use crate::kms::key_type::ExportKind;

/// Prefix of every enveloped ciphertext and signature.
pub const ENVELOPE_PREFIX: &str = "vault:v";

/// Marshaling used for all signatures.
pub(crate) const JWS_MARSHALING: &str = "jws";

/// Characters escaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Wraps a bare payload in the envelope for `version`.
pub fn wrap_envelope(version: u32, payload: &str) -> String {
    format!("{ENVELOPE_PREFIX}{version}:{payload}")
}

/// Splits an enveloped value into its version and bare payload.
///
/// Returns `None` unless the value starts with `vault:v<digits>:`.
pub fn split_envelope(value: &str) -> Option<(u32, &str)> {
    let rest = value.strip_prefix(ENVELOPE_PREFIX)?;
    let (version, payload) = rest.split_once(':')?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((version.parse().ok()?, payload))
}

fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Normalizes a mount path: trims whitespace and slashes, drops empty
/// segments and escapes every remaining segment.
pub(crate) fn normalize_mount_path(raw: &str) -> Result<String, KmsError> {
    let trimmed = raw.trim().trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return Err(KmsError::Configuration(format!(
            "mount path {raw:?} is empty"
        )));
    }
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(KmsError::Configuration(format!(
            "mount path {raw:?} contains relative segments"
        )));
    }

    Ok(segments
        .iter()
        .map(|s| escape_segment(s))
        .collect::<Vec<_>>()
        .join("/"))
}

/// Request paths for one key, relative to the backend API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyPaths {
    pub mount: String,
    pub metadata: String,
    pub encrypt: String,
    pub decrypt: String,
    pub sign: String,
    pub verify: String,
    pub rotate: String,
    escaped_key: String,
}

impl KeyPaths {
    pub fn new(mount_path: &str, key_name: &str) -> Result<Self, KmsError> {
        let name = key_name.trim();
        if name.is_empty() {
            return Err(KmsError::Configuration("key name is blank".into()));
        }

        let mount = normalize_mount_path(mount_path)?;
        let key = escape_segment(name);

        Ok(Self {
            metadata: format!("{mount}/keys/{key}"),
            encrypt: format!("{mount}/encrypt/{key}"),
            decrypt: format!("{mount}/decrypt/{key}"),
            sign: format!("{mount}/sign/{key}"),
            verify: format!("{mount}/verify/{key}"),
            rotate: format!("{mount}/keys/{key}/rotate"),
            escaped_key: key,
            mount,
        })
    }

    pub fn export(&self, kind: ExportKind, version: u32) -> String {
        format!(
            "{}/export/{}/{}/{}",
            self.mount, kind, self.escaped_key, version
        )
    }
}

/// Key metadata returned by `GET keys/<name>`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KeyMetadata {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub keys: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub latest_version: u32,
    #[serde(default)]
    pub min_decryption_version: u32,
    #[serde(default)]
    pub min_encryption_version: u32,
    #[serde(default)]
    pub supports_signing: bool,
    #[serde(default)]
    pub supports_encryption: bool,
    #[serde(default)]
    pub supports_decryption: bool,
    #[serde(default)]
    pub supports_derivation: bool,
    #[serde(default)]
    pub exportable: bool,
    #[serde(default, deserialize_with = "deserialize_period")]
    pub auto_rotate_period: Duration,
}

#[derive(Debug, Serialize)]
pub(crate) struct EncryptRequest {
    pub plaintext: String,
    pub key_version: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EncryptResponse {
    #[serde(default)]
    pub ciphertext: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DecryptRequest {
    pub ciphertext: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecryptResponse {
    #[serde(default)]
    pub plaintext: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignRequest {
    pub input: String,
    pub marshaling_algorithm: &'static str,
    pub key_version: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignResponse {
    #[serde(default)]
    pub signature: Option<String>,
}

/// Body of a batch verify; Vault reads the list from `batch_input`.
#[derive(Debug, Serialize)]
pub(crate) struct VerifyRequest {
    pub batch_input: Vec<VerifyItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct VerifyItem {
    pub key_version: u32,
    pub marshaling_algorithm: String,
    pub signature: String,
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyResponse {
    #[serde(default)]
    pub batch_results: Vec<VerifyResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyResult {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

/// Accepts a rotation period as integer seconds or a duration string
/// such as `"24h"`, `"90m"` or `"3600s"`.
fn deserialize_period<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
        Null,
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_period(&text).map_err(serde::de::Error::custom),
        Raw::Null => Ok(Duration::ZERO),
    }
}

pub(crate) fn parse_period(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Duration::ZERO);
    }

    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid rotation period {text:?}"))?;

    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(format!("invalid rotation period unit in {text:?}")),
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("rotation period {text:?} overflows"))
}
