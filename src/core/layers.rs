//! Network layer types for decoded frames
//!
//! Provides strongly-typed structs for the header fields the analysis uses:
//! - Layer 2: Ethernet (EthernetInfo), ARP presence
//! - Layer 3: IPv4 / IPv6 (IpInfo)
//! - Layer 4: TCP / UDP ports (PortInfo)
//!
//! A `FrameRecord` bundles whichever of these a frame carried.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// EtherType for IPv4
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// EtherType for ARP
pub const ETHERTYPE_ARP: u16 = 0x0806;
/// EtherType for IPv6
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

// ============================================================================
// Layer 2 - Data Link
// ============================================================================

/// 48-bit hardware address, rendered as `aa:bb:cc:dd:ee:ff`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| format!("MAC address too short: {}", s))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| format!("invalid MAC octet '{}': {}", part, e))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address too long: {}", s));
        }
        Ok(MacAddr(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ethernet frame information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EthernetInfo {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    /// Outer EtherType (0x8100 for tagged frames)
    pub ether_type: u16,
}

impl EthernetInfo {
    pub fn new(src_mac: impl Into<MacAddr>, dst_mac: impl Into<MacAddr>, ether_type: u16) -> Self {
        Self {
            src_mac: src_mac.into(),
            dst_mac: dst_mac.into(),
            ether_type,
        }
    }
}

// ============================================================================
// Layer 3 - Network
// ============================================================================

/// IP header information
///
/// `version` is carried as decoded rather than derived from the address
/// family, so a decoder that reports an unexpected version is still
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpInfo {
    pub version: u8,
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    /// Next protocol number (IPv4 protocol / IPv6 next header)
    pub protocol: u8,
}

impl IpInfo {
    /// Build from a pair of addresses, taking the version from the family
    pub fn new(src_addr: IpAddr, dst_addr: IpAddr, protocol: u8) -> Self {
        let version = if src_addr.is_ipv6() { 6 } else { 4 };
        Self {
            version,
            src_addr,
            dst_addr,
            protocol,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        self.version == 4
    }

    pub fn is_ipv6(&self) -> bool {
        self.version == 6
    }
}

// ============================================================================
// Layer 4 - Transport
// ============================================================================

/// Port pair of a TCP segment or UDP datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortInfo {
    pub src_port: u16,
    pub dst_port: u16,
}

impl PortInfo {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self { src_port, dst_port }
    }
}

// ============================================================================
// Frame record
// ============================================================================

/// One decoded capture frame
///
/// Produced by the capture decoder (or built directly by callers) and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Captured length in bytes
    pub length: usize,
    /// Capture timestamp in seconds
    pub timestamp: f64,
    pub ethernet: Option<EthernetInfo>,
    pub ip: Option<IpInfo>,
    pub tcp: Option<PortInfo>,
    pub udp: Option<PortInfo>,
    /// ARP payload present
    pub arp: bool,
}

impl FrameRecord {
    /// Bare frame with no decoded layers
    pub fn new(length: usize, timestamp: f64) -> Self {
        Self {
            length,
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_ethernet(mut self, ethernet: EthernetInfo) -> Self {
        self.ethernet = Some(ethernet);
        self
    }

    pub fn with_ip(mut self, ip: IpInfo) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_tcp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.tcp = Some(PortInfo::new(src_port, dst_port));
        self
    }

    pub fn with_udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.udp = Some(PortInfo::new(src_port, dst_port));
        self
    }

    pub fn with_arp(mut self) -> Self {
        self.arp = true;
        self
    }

    pub fn has_ethernet(&self) -> bool {
        self.ethernet.is_some()
    }

    /// Transport ports, preferring TCP over UDP
    pub fn ports(&self) -> Option<PortInfo> {
        self.tcp.or(self.udp)
    }
}
