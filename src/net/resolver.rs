// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! DNS resolver that applies the [`NetworkPolicy`] to every answer.
//!
//! Filtering at resolution time means the connection is made to an
//! address that was checked, not to whatever a second lookup returns.

use std::net::SocketAddr;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{debug, warn};

use super::error::NetError;
use super::policy::NetworkPolicy;

/// Resolves with the system resolver and drops denied addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardedResolver {
    policy: NetworkPolicy,
}

impl GuardedResolver {
    pub fn new(policy: NetworkPolicy) -> Self {
        Self { policy }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let policy = self.policy;
        Box::pin(async move {
            let result: Result<Addrs, Box<dyn std::error::Error + Send + Sync>> =
                match resolve_host(&policy, name.as_str()).await {
                    Ok(permitted) => Ok(Box::new(permitted.into_iter())),
                    Err(e) => Err(Box::new(e)),
                };
            result
        })
    }
}

async fn resolve_host(policy: &NetworkPolicy, host: &str) -> Result<Vec<SocketAddr>, NetError> {
    let resolved = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| NetError::Resolve {
            host: host.to_string(),
            source,
        })?;

    let permitted = filter_addrs(policy, host, resolved)?;
    debug!(host, addrs = permitted.len(), "Resolved host");
    Ok(permitted)
}

/// Keeps the permitted addresses, failing if none remain.
pub fn filter_addrs(
    policy: &NetworkPolicy,
    host: &str,
    addrs: impl IntoIterator<Item = SocketAddr>,
) -> Result<Vec<SocketAddr>, NetError> {
    let mut denied = None;
    let permitted: Vec<SocketAddr> = addrs
        .into_iter()
        .filter(|addr| match policy.check(host, addr.ip()) {
            Ok(()) => true,
            Err(e) => {
                warn!(host, addr = %addr.ip(), "Dropped denied address");
                denied = Some(e);
                false
            }
        })
        .collect();

    if !permitted.is_empty() {
        return Ok(permitted);
    }
    Err(denied.unwrap_or_else(|| NetError::NoPermittedAddress {
        host: host.to_string(),
    }))
}
