// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Audit logging for key operations.
//!
//! Every operation on an [`AuditedKms`] produces one structured event on
//! the `audit` tracing target, carrying the key, the operation and its
//! outcome. Rotations and exports are always logged at warning level or
//! above; capability denials are critical.
//!
//! # Example
//!
//! ```rust,no_run
//! use transit_kms::kms::audit::{AuditEvent, AuditLogger};
//! use transit_kms::kms::Operation;
//!
//! let logger = AuditLogger::new("payments-api");
//! logger.log(AuditEvent::new(Operation::Rotate, "orders"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{info, warn};

use super::error::{KmsError, Operation};
use super::public_key::PublicKey;
use super::traits::{
    Decryptor, Encryptor, ExportedKey, KeyExporter, KeyManagementService, KeyRotator,
    PublicKeyExporter, Signer, Verifier,
};

/// Severity levels for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Info,
    /// Unusual but legitimate, such as a rotation or an export.
    Warning,
    /// The operation failed.
    Error,
    /// The operation was refused.
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "INFO",
            AuditSeverity::Warning => "WARN",
            AuditSeverity::Error => "ERROR",
            AuditSeverity::Critical => "CRITICAL",
        }
    }
}

fn base_severity(operation: Operation) -> AuditSeverity {
    match operation {
        Operation::Rotate | Operation::Export => AuditSeverity::Warning,
        _ => AuditSeverity::Info,
    }
}

/// An audit event for a key operation.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Process-unique event ID.
    pub event_id: u64,
    pub timestamp: SystemTime,
    pub operation: Operation,
    pub key_id: String,
    pub details: Option<String>,
    /// The user or service on whose behalf the operation ran.
    pub principal: Option<String>,
    pub error: Option<String>,
    /// Set when the operation was refused for lack of a capability.
    pub denied: bool,
}

impl AuditEvent {
    pub fn new(operation: Operation, key_id: impl Into<String>) -> Self {
        static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

        Self {
            event_id: EVENT_COUNTER.fetch_add(1, Ordering::SeqCst),
            timestamp: SystemTime::now(),
            operation,
            key_id: key_id.into(),
            details: None,
            principal: None,
            error: None,
            denied: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Records the outcome of `result`.
    pub fn with_outcome<T>(mut self, result: &Result<T, KmsError>) -> Self {
        if let Err(e) = result {
            self.denied = matches!(e, KmsError::CapabilityDenied { .. });
            self.error = Some(e.to_string());
        }
        self
    }

    pub fn severity(&self) -> AuditSeverity {
        if self.denied {
            AuditSeverity::Critical
        } else if self.error.is_some() {
            AuditSeverity::Error
        } else {
            base_severity(self.operation)
        }
    }
}

/// Emits audit events through `tracing`.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    service_name: String,
    min_severity: AuditSeverity,
}

impl AuditLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            min_severity: AuditSeverity::Info,
        }
    }

    /// Drops events below `severity`.
    pub fn with_min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Returns true if an event of `severity` would be emitted.
    pub fn enabled(&self, severity: AuditSeverity) -> bool {
        severity >= self.min_severity
    }

    pub fn log(&self, event: AuditEvent) {
        let severity = event.severity();
        if !self.enabled(severity) {
            return;
        }

        let timestamp = event
            .timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        match severity {
            AuditSeverity::Info => {
                info!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    key_id = %event.key_id,
                    details = ?event.details,
                    principal = ?event.principal,
                    "Key operation completed"
                );
            }
            AuditSeverity::Warning => {
                warn!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    key_id = %event.key_id,
                    details = ?event.details,
                    principal = ?event.principal,
                    "Sensitive key operation completed"
                );
            }
            AuditSeverity::Error | AuditSeverity::Critical => {
                tracing::error!(
                    target: "audit",
                    event_id = event.event_id,
                    timestamp,
                    service = %self.service_name,
                    operation = event.operation.as_str(),
                    key_id = %event.key_id,
                    details = ?event.details,
                    principal = ?event.principal,
                    error = ?event.error,
                    severity = severity.as_str(),
                    "Key operation failed or denied"
                );
            }
        }
    }
}

/// Wraps a KMS so that every operation is audited.
pub struct AuditedKms<K: KeyManagementService> {
    inner: K,
    audit: AuditLogger,
    principal: Option<String>,
}

impl<K: KeyManagementService> AuditedKms<K> {
    pub fn new(kms: K, service_name: impl Into<String>) -> Self {
        Self::with_logger(kms, AuditLogger::new(service_name))
    }

    pub fn with_logger(kms: K, audit: AuditLogger) -> Self {
        Self {
            inner: kms,
            audit,
            principal: None,
        }
    }

    /// Attributes every event to `principal`.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    fn record<T>(
        &self,
        operation: Operation,
        result: &Result<T, KmsError>,
        details: Option<String>,
    ) {
        let mut event = AuditEvent::new(operation, self.inner.key_id()).with_outcome(result);
        event.details = details;
        event.principal = self.principal.clone();
        self.audit.log(event);
    }
}

#[async_trait]
impl<K: KeyManagementService> Encryptor for AuditedKms<K> {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let result = self.inner.encrypt(plaintext).await;
        self.record(
            Operation::Encrypt,
            &result,
            Some(format!("bytes={}", plaintext.len())),
        );
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> Decryptor for AuditedKms<K> {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let result = self.inner.decrypt(ciphertext).await;
        self.record(Operation::Decrypt, &result, None);
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> Signer for AuditedKms<K> {
    async fn sign(&self, protected: &[u8]) -> Result<Vec<u8>, KmsError> {
        let result = self.inner.sign(protected).await;
        self.record(Operation::Sign, &result, None);
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> Verifier for AuditedKms<K> {
    async fn verify(&self, protected: &[u8], signature: &[u8]) -> Result<(), KmsError> {
        let result = self.inner.verify(protected, signature).await;
        self.record(Operation::Verify, &result, None);
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> KeyRotator for AuditedKms<K> {
    async fn rotate_key(&self) -> Result<(), KmsError> {
        let result = self.inner.rotate_key().await;
        self.record(Operation::Rotate, &result, None);
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> PublicKeyExporter for AuditedKms<K> {
    async fn public_key(&self) -> Result<PublicKey, KmsError> {
        let result = self.inner.public_key().await;
        self.record(Operation::PublicKey, &result, None);
        result
    }

    async fn verification_public_keys(&self) -> Result<Vec<PublicKey>, KmsError> {
        let result = self.inner.verification_public_keys().await;
        let details = result.as_ref().ok().map(|keys| format!("keys={}", keys.len()));
        self.record(Operation::PublicKey, &result, details);
        result
    }
}

#[async_trait]
impl<K: KeyManagementService> KeyExporter for AuditedKms<K> {
    async fn export_key(&self) -> Result<ExportedKey, KmsError> {
        let result = self.inner.export_key().await;
        let details = result
            .as_ref()
            .ok()
            .map(|key| format!("key_type={}", key.key_type()));
        self.record(Operation::Export, &result, details);
        result
    }
}

impl<K: KeyManagementService> KeyManagementService for AuditedKms<K> {
    fn key_id(&self) -> &str {
        self.inner.key_id()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kms::vault::{LocalTransit, VaultKms};

    #[test]
    fn test_event_severity() {
        let event = AuditEvent::new(Operation::Encrypt, "orders");
        assert_eq!(event.severity(), AuditSeverity::Info);

        let event = AuditEvent::new(Operation::Rotate, "orders");
        assert_eq!(event.severity(), AuditSeverity::Warning);

        let event = AuditEvent::new(Operation::Export, "orders").with_error("backend down");
        assert_eq!(event.severity(), AuditSeverity::Error);
    }

    #[test]
    fn test_denial_is_critical() {
        let result: Result<(), KmsError> = Err(KmsError::CapabilityDenied {
            operation: Operation::Export,
            key: "orders".into(),
            reason: "key is not exportable",
        });
        let event = AuditEvent::new(Operation::Export, "orders").with_outcome(&result);
        assert!(event.denied);
        assert_eq!(event.severity(), AuditSeverity::Critical);
    }

    #[test]
    fn test_event_builders() {
        let event = AuditEvent::new(Operation::Sign, "tokens")
            .with_details("jws")
            .with_principal("svc-auth");
        assert_eq!(event.details.as_deref(), Some("jws"));
        assert_eq!(event.principal.as_deref(), Some("svc-auth"));

        let other = AuditEvent::new(Operation::Sign, "tokens");
        assert_ne!(event.event_id, other.event_id);
    }

    #[test]
    fn test_min_severity() {
        let logger = AuditLogger::new("test").with_min_severity(AuditSeverity::Warning);
        assert!(!logger.enabled(AuditSeverity::Info));
        assert!(logger.enabled(AuditSeverity::Critical));
        logger.log(AuditEvent::new(Operation::Rotate, "orders"));
    }

    #[tokio::test]
    async fn test_audited_kms_passes_through() {
        let engine = LocalTransit::new("transit").unwrap();
        engine.create_key("orders", "aes256-gcm96", false).unwrap();
        let kms = VaultKms::new(Arc::new(engine), "transit", "orders")
            .await
            .unwrap();
        let audited = AuditedKms::new(kms, "test").with_principal("unit-test");

        assert_eq!(audited.key_id(), "orders");
        let ciphertext = audited.encrypt(b"secret").await.unwrap();
        assert_eq!(audited.decrypt(&ciphertext).await.unwrap(), b"secret".to_vec());
        assert!(matches!(
            audited.export_key().await,
            Err(KmsError::CapabilityDenied { .. })
        ));
        audited.rotate_key().await.unwrap();
        assert_eq!(audited.inner().key_info().latest_version, 2);
    }
}
