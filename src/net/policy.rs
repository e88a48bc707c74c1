// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Outbound address policy.
//!
//! Every address a request may reach is classified into a range. Only
//! public addresses are allowed unless loopback or private ranges are
//! explicitly opted in. Link-local (including cloud metadata endpoints),
//! multicast, broadcast, reserved and documentation ranges are never
//! reachable, including through IPv6 encodings of IPv4 addresses.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::NetError;

/// The range an IP address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    Public,
    Loopback,
    /// RFC 1918.
    Private,
    LinkLocal,
    /// RFC 6598 carrier-grade NAT.
    SharedAddressSpace,
    Unspecified,
    Multicast,
    Broadcast,
    Documentation,
    /// IPv6 fc00::/7.
    UniqueLocal,
    /// IETF protocol assignments, benchmarking and the former class E.
    Reserved,
}

impl AddressClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressClass::Public => "public",
            AddressClass::Loopback => "loopback",
            AddressClass::Private => "private",
            AddressClass::LinkLocal => "link-local",
            AddressClass::SharedAddressSpace => "shared address space",
            AddressClass::Unspecified => "unspecified",
            AddressClass::Multicast => "multicast",
            AddressClass::Broadcast => "broadcast",
            AddressClass::Documentation => "documentation",
            AddressClass::UniqueLocal => "unique local",
            AddressClass::Reserved => "reserved",
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an address. IPv6 addresses that carry an IPv4 address
/// (mapped, IPv4-compatible, NAT64 and 6to4) are classified by the IPv4
/// address they carry.
pub fn classify(addr: IpAddr) -> AddressClass {
    match addr {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => match embedded_ipv4(v6) {
            Some(v4) => classify_v4(v4),
            None => classify_v6(v6),
        },
    }
}

/// Returns the IPv4 address an IPv6 address routes to, if it embeds one.
fn embedded_ipv4(addr: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return Some(v4);
    }

    let s = addr.segments();
    let join = |high: u16, low: u16| Ipv4Addr::from((u32::from(high) << 16) | u32::from(low));
    let low = join(s[6], s[7]);
    match s {
        // IPv4-compatible ::a.b.c.d; `::` and `::1` are IPv6 addresses.
        [0, 0, 0, 0, 0, 0, _, _] if u32::from(low) > 1 => Some(low),
        // NAT64 well-known prefix 64:ff9b::/96.
        [0x64, 0xff9b, 0, 0, 0, 0, _, _] => Some(low),
        // 6to4 2002:a.b.c.d::/48.
        [0x2002, high, lower, ..] => Some(join(high, lower)),
        _ => None,
    }
}

fn classify_v4(addr: Ipv4Addr) -> AddressClass {
    let [a, b, c, _] = addr.octets();

    if addr.is_broadcast() {
        AddressClass::Broadcast
    } else if a == 0 {
        AddressClass::Unspecified
    } else if addr.is_loopback() {
        AddressClass::Loopback
    } else if addr.is_private() {
        AddressClass::Private
    } else if addr.is_link_local() {
        AddressClass::LinkLocal
    } else if a == 100 && (64..128).contains(&b) {
        AddressClass::SharedAddressSpace
    } else if addr.is_multicast() {
        AddressClass::Multicast
    } else if addr.is_documentation() {
        AddressClass::Documentation
    } else if (a == 192 && b == 0 && c == 0) || (a == 198 && (18..20).contains(&b)) || a >= 240 {
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}

fn classify_v6(addr: Ipv6Addr) -> AddressClass {
    let first = addr.segments()[0];

    if addr.is_unspecified() {
        AddressClass::Unspecified
    } else if addr.is_loopback() {
        AddressClass::Loopback
    } else if addr.is_multicast() {
        AddressClass::Multicast
    } else if first & 0xffc0 == 0xfe80 {
        AddressClass::LinkLocal
    } else if first & 0xfe00 == 0xfc00 {
        AddressClass::UniqueLocal
    } else if first == 0x2001 && addr.segments()[1] == 0x0db8 {
        AddressClass::Documentation
    } else if first & 0xffc0 == 0xfec0 {
        // Deprecated site-local fec0::/10.
        AddressClass::Private
    } else if (first == 0x64 && addr.segments()[1] == 0xff9b)
        || (first == 0x2001 && addr.segments()[1] == 0)
    {
        // Local-use NAT64 64:ff9b:1::/48 and Teredo 2001::/32 reach IPv4
        // hosts through a translator whose target cannot be checked.
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}

/// Which address ranges outbound requests may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkPolicy {
    allow_loopback: bool,
    allow_private: bool,
}

impl NetworkPolicy {
    /// Creates the default policy: public addresses only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits loopback addresses.
    pub fn allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    /// Permits RFC 1918, carrier-grade NAT and IPv6 unique local addresses.
    pub fn allow_private_network(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    pub fn allows(&self, addr: IpAddr) -> bool {
        match classify(addr) {
            AddressClass::Public => true,
            AddressClass::Loopback => self.allow_loopback,
            AddressClass::Private
            | AddressClass::SharedAddressSpace
            | AddressClass::UniqueLocal => self.allow_private,
            _ => false,
        }
    }

    /// Fails with [`NetError::Denied`] if `addr` may not be reached.
    pub fn check(&self, host: &str, addr: IpAddr) -> Result<(), NetError> {
        if self.allows(addr) {
            return Ok(());
        }
        Err(NetError::Denied {
            host: host.to_string(),
            addr,
            class: classify(addr),
        })
    }
}
