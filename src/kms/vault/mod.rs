// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Vault transit engine backend.
//!
//! [`VaultKms`] drives one transit key through a [`Transport`]: either
//! [`HttpTransport`] against a Vault server, or [`LocalTransit`], an
//! in-memory engine for development and tests.
//!
//! Ciphertexts and signatures cross the API as bare payloads; the
//! `vault:v<N>:` envelope is stripped on the way out and added on the
//! way in.

mod capabilities;
mod config;
mod http;
mod local;
mod service;
#[cfg(test)]
mod testing;
mod transport;
mod wire;

pub use capabilities::KeyInfo;
pub use config::{VaultConfig, VaultToken, DEFAULT_MOUNT_PATH};
pub use http::HttpTransport;
pub use local::{LocalTransit, LocalTransitError};
pub use service::VaultKms;
pub use transport::{Transport, TransportError};
pub use wire::{split_envelope, wrap_envelope, ENVELOPE_PREFIX};
