// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Network guard and TLS error types.

use std::net::IpAddr;
use std::path::PathBuf;

use super::policy::AddressClass;

/// Errors raised while building or policing outbound connections.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A destination address falls in a range the policy denies.
    #[error("address {addr} of {host} is {class} and denied by policy")]
    Denied {
        host: String,
        addr: IpAddr,
        class: AddressClass,
    },

    /// Every resolved address of a host was denied.
    #[error("no permitted address for {host}")]
    NoPermittedAddress { host: String },

    /// Host name resolution failed.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The URL is unusable as a request target.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    /// The redirect chain exceeded the configured cap.
    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    /// Certificate loading failed.
    #[error("failed to load certificate from {path}: {reason}")]
    CertificateLoad { path: PathBuf, reason: String },

    /// Private key loading failed.
    #[error("failed to load private key from {path}: {reason}")]
    PrivateKeyLoad { path: PathBuf, reason: String },

    /// TLS configuration is inconsistent.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// rustls rejected the configuration.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
