// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the Vault transit client.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kms::error::KmsError;
use crate::net::{
    HttpClientConfig, NetworkPolicy, TlsConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS,
    DEFAULT_REQUEST_TIMEOUT,
};

use super::wire::{normalize_mount_path, parse_period};

/// Default transit mount path.
pub const DEFAULT_MOUNT_PATH: &str = "transit";

/// A Vault token. Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultToken(String);

impl VaultToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value.
    ///
    /// # Security
    ///
    /// Do not log or persist the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultToken([REDACTED])")
    }
}

/// Settings for connecting to a transit key over HTTP.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address, e.g. `https://vault.example.com:8200`.
    pub address: String,
    pub token: Option<VaultToken>,
    pub namespace: Option<String>,
    pub mount_path: String,
    pub key_name: String,
    pub tls: Option<TlsConfig>,
    pub policy: NetworkPolicy,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_redirects: usize,
}

impl VaultConfig {
    /// Creates a configuration for `key_name` on the server at `address`,
    /// using the default mount and timeouts.
    pub fn new(address: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            namespace: None,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            key_name: key_name.into(),
            tls: None,
            policy: NetworkPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(VaultToken::new(token));
        self
    }

    /// Sets the enterprise namespace sent with every request.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets which address ranges the client may reach.
    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Loads the configuration from the process environment, after
    /// reading a `.env` file if one exists.
    ///
    /// `VAULT_ADDR` and `VAULT_TRANSIT_KEY` are required.
    pub fn from_env() -> Result<Self, KmsError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, KmsError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| KmsError::Configuration(format!("{name} is not set")))
        };

        let mut config = Self::new(required("VAULT_ADDR")?, required("VAULT_TRANSIT_KEY")?);

        if let Some(token) = var("VAULT_TOKEN") {
            config = config.with_token(token);
        }
        if let Some(namespace) = var("VAULT_NAMESPACE") {
            config = config.with_namespace(namespace);
        }
        if let Some(mount) = var("VAULT_TRANSIT_MOUNT") {
            config = config.with_mount_path(mount);
        }

        let mut tls = TlsConfig::new();
        if let Some(ca) = var("VAULT_CACERT") {
            tls = tls.with_ca(PathBuf::from(ca));
        }
        tls.cert_path = var("VAULT_CLIENT_CERT").map(PathBuf::from);
        tls.key_path = var("VAULT_CLIENT_KEY").map(PathBuf::from);
        if tls != TlsConfig::default() {
            config = config.with_tls(tls);
        }

        if let Some(timeout) = var("VAULT_CLIENT_TIMEOUT") {
            config.request_timeout = parse_period(&timeout).map_err(|e| {
                KmsError::Configuration(format!("VAULT_CLIENT_TIMEOUT: {e}"))
            })?;
        }
        if let Some(redirects) = var("VAULT_MAX_REDIRECTS") {
            config.max_redirects = redirects.trim().parse().map_err(|_| {
                KmsError::Configuration(format!("VAULT_MAX_REDIRECTS: invalid count {redirects:?}"))
            })?;
        }

        let flag = |name: &str| parse_flag(name, var(name));
        config.policy = NetworkPolicy::new()
            .allow_private_network(flag("VAULT_ALLOW_PRIVATE_NETWORK")?)
            .allow_loopback(flag("VAULT_ALLOW_LOOPBACK")?);

        Ok(config)
    }

    /// Checks the configuration for errors that would only surface on
    /// first use.
    pub fn validate(&self) -> Result<(), KmsError> {
        let address = self.parsed_address()?;
        if !matches!(address.scheme(), "http" | "https") {
            return Err(KmsError::Configuration(format!(
                "address {} must use http or https",
                self.address
            )));
        }
        if address.host().is_none() {
            return Err(KmsError::Configuration(format!(
                "address {} has no host",
                self.address
            )));
        }

        if self.key_name.trim().is_empty() {
            return Err(KmsError::Configuration("key name is blank".into()));
        }
        normalize_mount_path(&self.mount_path)?;

        if self.token.as_ref().is_some_and(|t| t.expose().trim().is_empty()) {
            return Err(KmsError::Configuration("token is blank".into()));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(KmsError::Configuration("timeouts must be non-zero".into()));
        }
        if let Some(tls) = &self.tls {
            if tls.cert_path.is_some() != tls.key_path.is_some() {
                return Err(KmsError::Configuration(
                    "client certificate and key must be provided together".into(),
                ));
            }
        }

        Ok(())
    }

    /// Parses the server address.
    pub fn parsed_address(&self) -> Result<Url, KmsError> {
        Url::parse(self.address.trim()).map_err(|e| {
            KmsError::Configuration(format!("invalid address {:?}: {e}", self.address))
        })
    }

    /// Returns the HTTP client settings.
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            max_redirects: self.max_redirects,
            policy: self.policy,
            tls: self.tls.clone(),
        }
    }
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool, KmsError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(KmsError::Configuration(format!(
            "{name}: expected a boolean, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(vars: &[(&str, &str)]) -> Result<VaultConfig, KmsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VaultConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_builder() {
        let config = VaultConfig::new("https://vault.example.com:8200", "orders")
            .with_token("s.secret")
            .with_namespace("team-a")
            .with_mount_path("payments/transit")
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(5))
            .with_max_redirects(0);

        assert!(config.validate().is_ok());
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.mount_path, "payments/transit");

        let http = config.http_client_config();
        assert_eq!(http.request_timeout, Duration::from_secs(5));
        assert_eq!(http.max_redirects, 0);
    }

    #[test]
    fn test_token_is_redacted() {
        let config = VaultConfig::new("https://vault.example.com", "orders").with_token("s.secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("s.secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            VaultConfig::new("not a url", "orders"),
            VaultConfig::new("ftp://vault.example.com", "orders"),
            VaultConfig::new("https://vault.example.com", "  "),
            VaultConfig::new("https://vault.example.com", "orders").with_mount_path("/"),
            VaultConfig::new("https://vault.example.com", "orders").with_token(" "),
            VaultConfig::new("https://vault.example.com", "orders")
                .with_timeouts(Duration::ZERO, Duration::from_secs(1)),
            VaultConfig::new("https://vault.example.com", "orders").with_tls(TlsConfig {
                key_path: Some(PathBuf::from("key.pem")),
                ..TlsConfig::default()
            }),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(KmsError::Configuration(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_from_vars() {
        let config = from_map(&[
            ("VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULT_TOKEN", "root"),
            ("VAULT_NAMESPACE", "admin"),
            ("VAULT_TRANSIT_KEY", "orders"),
            ("VAULT_CACERT", "/etc/vault/ca.pem"),
            ("VAULT_CLIENT_TIMEOUT", "30"),
            ("VAULT_MAX_REDIRECTS", "1"),
            ("VAULT_ALLOW_LOOPBACK", "true"),
        ])
        .unwrap();

        assert_eq!(config.address, "http://127.0.0.1:8200");
        assert_eq!(config.token.as_ref().map(VaultToken::expose), Some("root"));
        assert_eq!(config.namespace.as_deref(), Some("admin"));
        assert_eq!(config.mount_path, DEFAULT_MOUNT_PATH);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 1);
        assert_eq!(
            config.tls.as_ref().and_then(|t| t.ca_path.clone()),
            Some(PathBuf::from("/etc/vault/ca.pem"))
        );
        assert!(config.policy.allows("127.0.0.1".parse().unwrap()));
        assert!(!config.policy.allows("10.0.0.1".parse().unwrap()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_requires_address_and_key() {
        assert!(matches!(
            from_map(&[("VAULT_TRANSIT_KEY", "orders")]),
            Err(KmsError::Configuration(_))
        ));
        assert!(matches!(
            from_map(&[("VAULT_ADDR", "https://vault"), ("VAULT_TRANSIT_KEY", " ")]),
            Err(KmsError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        let base = [("VAULT_ADDR", "https://vault"), ("VAULT_TRANSIT_KEY", "orders")];
        for extra in [
            ("VAULT_ALLOW_PRIVATE_NETWORK", "maybe"),
            ("VAULT_MAX_REDIRECTS", "-1"),
            ("VAULT_CLIENT_TIMEOUT", "soon"),
        ] {
            let mut vars = base.to_vec();
            vars.push(extra);
            assert!(from_map(&vars).is_err(), "{extra:?}");
        }
    }
}
