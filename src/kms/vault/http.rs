// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport to a Vault server.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::kms::error::KmsError;
use crate::net::{GuardedClient, NetError};

use super::config::VaultConfig;
use super::transport::{Transport, TransportError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const REQUEST_HEADER: &str = "X-Vault-Request";

/// Vault's error body.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Sends transit requests to `<address>/v1/<path>`.
pub struct HttpTransport {
    client: GuardedClient,
    base: String,
    token: Option<HeaderValue>,
    namespace: Option<HeaderValue>,
}

impl HttpTransport {
    /// Builds the transport and its HTTP client from configuration.
    pub fn new(config: &VaultConfig) -> Result<Self, KmsError> {
        let address = config.parsed_address()?;
        let client = GuardedClient::new(&config.http_client_config())
            .map_err(|e| KmsError::Configuration(format!("HTTP client: {e}")))?;

        let token = config
            .token
            .as_ref()
            .map(|token| {
                let mut value = HeaderValue::from_str(token.expose().trim()).map_err(|_| {
                    KmsError::Configuration("token contains invalid characters".into())
                })?;
                value.set_sensitive(true);
                Ok::<_, KmsError>(value)
            })
            .transpose()?;

        let namespace = config
            .namespace
            .as_deref()
            .map(|ns| {
                HeaderValue::from_str(ns.trim()).map_err(|_| {
                    KmsError::Configuration("namespace contains invalid characters".into())
                })
            })
            .transpose()?;

        Ok(Self {
            client,
            base: address.as_str().trim_end_matches('/').to_string(),
            token,
            namespace,
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!("{}/v1/{}", self.base, path.trim_start_matches('/'));
        let url = Url::parse(&raw).map_err(|_| TransportError::Rejected {
            path: path.to_string(),
            source: NetError::InvalidUrl {
                url: raw,
                reason: "not a valid URL",
            },
        })?;
        self.client
            .check_url(&url)
            .map_err(|source| TransportError::Rejected {
                path: path.to_string(),
                source,
            })?;
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let url = self.url(path)?;
        let http = |source| TransportError::Http {
            path: path.to_string(),
            source,
        };

        let mut request = self
            .client
            .inner()
            .request(method.clone(), url)
            .header(REQUEST_HEADER, "true");
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token.clone());
        }
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace.clone());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(http)?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "Vault response");

        if status == StatusCode::NO_CONTENT
            || (method == Method::GET && status == StatusCode::NOT_FOUND)
        {
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(http)?;
        if !status.is_success() {
            let errors = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.errors)
                .unwrap_or_default();
            return Err(TransportError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                errors,
            });
        }

        extract_data(path, &bytes)
    }
}

/// Returns the `data` object of a success body.
fn extract_data(path: &str, bytes: &[u8]) -> Result<Option<Value>, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let mut body: Value = serde_json::from_slice(bytes).map_err(|source| TransportError::Decode {
        path: path.to_string(),
        source,
    })?;
    Ok(body
        .get_mut("data")
        .map(Value::take)
        .filter(|data| !data.is_null()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read(&self, path: &str) -> Result<Option<Value>, TransportError> {
        self.send(Method::GET, path, None).await
    }

    async fn write(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        self.send(Method::POST, path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetworkPolicy;
    use serde_json::json;

    fn transport(address: &str, policy: NetworkPolicy) -> HttpTransport {
        let config = VaultConfig::new(address, "orders")
            .with_token("s.token")
            .with_namespace("team")
            .with_network_policy(policy);
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_url_building() {
        let transport = transport("https://vault.example.com:8200/", NetworkPolicy::new());
        let url = transport.url("transit/keys/orders").unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com:8200/v1/transit/keys/orders");
        assert!(transport.token.as_ref().unwrap().is_sensitive());
    }

    #[test]
    fn test_denied_address_is_rejected_before_sending() {
        let transport = transport(
            "http://169.254.169.254",
            NetworkPolicy::new().allow_private_network(true),
        );
        let result = transport.url("transit/keys/orders");
        assert!(matches!(
            result,
            Err(TransportError::Rejected {
                source: NetError::Denied { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_loopback_denied_by_default() {
        let transport = transport("http://127.0.0.1:8200", NetworkPolicy::new());
        let result = transport.read("transit/keys/orders").await;
        assert!(matches!(result, Err(TransportError::Rejected { .. })));
    }

    #[test]
    fn test_extract_data() {
        let body = serde_json::to_vec(&json!({
            "request_id": "x",
            "data": {"ciphertext": "vault:v1:abc=="}
        }))
        .unwrap();
        assert_eq!(
            extract_data("p", &body).unwrap(),
            Some(json!({"ciphertext": "vault:v1:abc=="}))
        );

        let no_data = serde_json::to_vec(&json!({"data": null})).unwrap();
        assert_eq!(extract_data("p", &no_data).unwrap(), None);
        assert_eq!(extract_data("p", b"").unwrap(), None);
        assert!(matches!(
            extract_data("p", b"<html>"),
            Err(TransportError::Decode { .. })
        ));
    }

    #[test]
    fn test_invalid_header_values() {
        let config =
            VaultConfig::new("https://vault.example.com", "orders").with_token("bad\ntoken");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(KmsError::Configuration(_))
        ));
    }
}
