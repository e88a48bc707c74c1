// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! HTTP client with the outbound address policy applied.
//!
//! Host names go through [`GuardedResolver`]; IP-literal hosts, which
//! skip DNS, are checked by [`GuardedClient::check_url`] before a request
//! and by the redirect policy on every hop.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect;
use tracing::debug;
use url::{Host, Url};

use super::error::NetError;
use super::policy::NetworkPolicy;
use super::resolver::GuardedResolver;
use super::tls::{build_client_config, TlsConfig};

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default redirect cap.
pub const DEFAULT_MAX_REDIRECTS: usize = 3;

/// Settings for [`GuardedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_redirects: usize,
    pub policy: NetworkPolicy,
    pub tls: Option<TlsConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            policy: NetworkPolicy::default(),
            tls: None,
        }
    }
}

/// A `reqwest` client that only reaches addresses the policy permits.
#[derive(Debug, Clone)]
pub struct GuardedClient {
    client: reqwest::Client,
    policy: NetworkPolicy,
}

impl GuardedClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, NetError> {
        let tls = build_client_config(config.tls.as_ref().unwrap_or(&TlsConfig::default()))?;
        let policy = config.policy;
        let max_redirects = config.max_redirects;

        let redirects = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error(NetError::TooManyRedirects(max_redirects));
            }
            let verdict = check_url_with(&policy, attempt.url());
            match verdict {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });

        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .dns_resolver(Arc::new(GuardedResolver::new(policy)))
            .redirect(redirects)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(NetError::Client)?;

        debug!(?policy, max_redirects, "Built guarded HTTP client");
        Ok(Self { client, policy })
    }

    /// Checks a request target before sending.
    pub fn check_url(&self, url: &Url) -> Result<(), NetError> {
        check_url_with(&self.policy, url)
    }

    pub fn policy(&self) -> NetworkPolicy {
        self.policy
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Accepts http(s) URLs whose host is a name or a permitted IP literal.
fn check_url_with(policy: &NetworkPolicy, url: &Url) -> Result<(), NetError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetError::InvalidUrl {
            url: url.to_string(),
            reason: "scheme must be http or https",
        });
    }

    match url.host() {
        Some(Host::Domain(_)) => Ok(()),
        Some(Host::Ipv4(v4)) => policy.check(&v4.to_string(), IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => policy.check(&v6.to_string(), IpAddr::V6(v6)),
        None => Err(NetError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host",
        }),
    }
}
