// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Outbound networking: address policy, guarded DNS, HTTP client and TLS.

mod client;
mod error;
mod policy;
mod resolver;
mod tls;

pub use client::{
    GuardedClient, HttpClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::NetError;
pub use policy::{classify, AddressClass, NetworkPolicy};
pub use resolver::{filter_addrs, GuardedResolver};
pub use tls::{build_client_config, TlsConfig};
