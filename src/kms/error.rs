// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMS error types.

use std::fmt;

use super::key_type::KeyType;
use super::public_key::PublicKeyError;
use super::vault::TransportError;

/// The operation an error or audit event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    Rotate,
    Export,
    PublicKey,
}

impl Operation {
    /// Returns the operation name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Resolve => "resolve",
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
            Operation::Sign => "sign",
            Operation::Verify => "verify",
            Operation::Rotate => "rotate",
            Operation::Export => "export",
            Operation::PublicKey => "public_key",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key name, plus the version an operation targeted when one was known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    pub name: String,
    pub version: Option<u32>,
}

impl KeyRef {
    pub(crate) fn new(name: &str, version: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{} v{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Errors that can occur in KMS operations.
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    /// Invalid construction parameters or settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The backend reported a key type outside the supported set.
    #[error("key {key} has unsupported key type {tag:?}")]
    UnsupportedKeyType { key: String, tag: String },

    /// The key lacks the capability the operation needs. No request was sent.
    #[error("{operation} denied for key {key}: {reason}")]
    CapabilityDenied {
        operation: Operation,
        key: String,
        reason: &'static str,
    },

    /// Public key requested for a key family without one.
    #[error("the key doesn't have a public key(s): {key} is a {key_type} key")]
    NoPublicKey { key: String, key_type: KeyType },

    /// Caller input rejected before any request was sent.
    #[error("invalid input to {operation}: {reason}")]
    InvalidInput {
        operation: Operation,
        reason: &'static str,
    },

    /// The transport failed to complete the request.
    #[error("{operation} on key {key} failed: {source}")]
    Transport {
        operation: Operation,
        key: KeyRef,
        #[source]
        source: TransportError,
    },

    /// The backend answered with an unexpected or malformed response.
    #[error("unexpected {operation} response for key {key}: {reason}")]
    Protocol {
        operation: Operation,
        key: KeyRef,
        reason: String,
    },

    /// A public key published by the backend could not be decoded.
    #[error("public key of key {key} could not be decoded: {source}")]
    PublicKeyDecode {
        key: KeyRef,
        #[source]
        source: PublicKeyError,
    },

    /// No candidate key version accepted the signature.
    #[error("signature not valid for any version {min}..={max} of key {key}")]
    VerificationFailed { key: String, min: u32, max: u32 },

    /// The key was rotated but its metadata could not be refreshed.
    #[error("key {key} was rotated but refreshing its metadata failed: {source}")]
    RotationRefresh {
        key: String,
        #[source]
        source: Box<KmsError>,
    },
}

impl KmsError {
    /// Returns true for errors raised locally, before any request was sent.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            KmsError::Configuration(_)
                | KmsError::CapabilityDenied { .. }
                | KmsError::NoPublicKey { .. }
                | KmsError::InvalidInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ref_display() {
        assert_eq!(KeyRef::new("payments", Some(3)).to_string(), "payments v3");
        assert_eq!(KeyRef::new("payments", None).to_string(), "payments");
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = KmsError::Protocol {
            operation: Operation::Encrypt,
            key: KeyRef::new("payments", Some(2)),
            reason: "response has no ciphertext".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected encrypt response for key payments v2: response has no ciphertext"
        );

        let err = KmsError::NoPublicKey {
            key: "payments".into(),
            key_type: KeyType::Symmetric,
        };
        assert!(err
            .to_string()
            .starts_with("the key doesn't have a public key(s)"));
    }

    #[test]
    fn test_local_rejections() {
        let denied = KmsError::CapabilityDenied {
            operation: Operation::Export,
            key: "payments".into(),
            reason: "key is not exportable",
        };
        assert!(denied.is_local_rejection());

        let failed = KmsError::VerificationFailed {
            key: "payments".into(),
            min: 1,
            max: 2,
        };
        assert!(!failed.is_local_rejection());
    }
}
