//! Frame decoding
//!
//! Separates decoding into distinct stages:
//! - `parse_ethernet()` - Layer 2 (Ethernet II header, ARP detection)
//! - `parse_ip()` - Layer 3 (IPv4/IPv6)
//! - `parse_transport()` - Layer 4 (TCP/UDP ports)
//!
//! A frame whose upper layers fail to decode keeps whatever lower layers
//! did decode. Only the Ethernet header is required for a frame to take
//! part in the analysis. Decoding is lax: a frame cut short by the capture
//! snaplen still yields its IP and transport headers when those bytes were
//! captured, even though the IP length field points past the end.

use std::net::IpAddr;

use etherparse::{Ethernet2HeaderSlice, LaxNetSlice, LaxSlicedPacket, LinkSlice, TransportSlice};
use tracing::trace;

use super::layers::{EthernetInfo, FrameRecord, IpInfo, MacAddr, PortInfo, ETHERTYPE_ARP};

/// 802.1Q and 802.1ad tag types
const VLAN_ETHERTYPES: [u16; 2] = [0x8100, 0x88a8];

/// Result of parsing the transport layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportInfo {
    pub tcp: Option<PortInfo>,
    pub udp: Option<PortInfo>,
}

/// Parse the Ethernet II header directly from frame bytes
///
/// Returns None if the frame is shorter than an Ethernet header.
pub fn parse_ethernet(data: &[u8]) -> Option<EthernetInfo> {
    let header = Ethernet2HeaderSlice::from_slice(data).ok()?;
    Some(EthernetInfo {
        src_mac: MacAddr(header.source()),
        dst_mac: MacAddr(header.destination()),
        ether_type: header.ether_type().0,
    })
}

/// EtherType of the payload, looking through one VLAN tag
fn payload_ether_type(data: &[u8], outer: u16) -> u16 {
    if VLAN_ETHERTYPES.contains(&outer) && data.len() >= 18 {
        u16::from_be_bytes([data[16], data[17]])
    } else {
        outer
    }
}

/// Parse the IP layer from etherparse LaxSlicedPacket
///
/// Returns None for non-IP frames (ARP, etc.)
pub fn parse_ip(sliced: &LaxSlicedPacket<'_>) -> Option<IpInfo> {
    match &sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            Some(IpInfo {
                version: 4,
                src_addr: IpAddr::from(header.source_addr()),
                dst_addr: IpAddr::from(header.destination_addr()),
                protocol: header.protocol().0,
            })
        }
        Some(LaxNetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            Some(IpInfo {
                version: 6,
                src_addr: IpAddr::from(header.source_addr()),
                dst_addr: IpAddr::from(header.destination_addr()),
                protocol: header.next_header().0,
            })
        }
        _ => None,
    }
}

/// Parse the transport layer from etherparse LaxSlicedPacket
pub fn parse_transport(sliced: &LaxSlicedPacket<'_>) -> TransportInfo {
    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => TransportInfo {
            tcp: Some(PortInfo::new(tcp.source_port(), tcp.destination_port())),
            udp: None,
        },
        Some(TransportSlice::Udp(udp)) => TransportInfo {
            tcp: None,
            udp: Some(PortInfo::new(udp.source_port(), udp.destination_port())),
        },
        _ => TransportInfo::default(),
    }
}

/// Decode one Ethernet frame into a `FrameRecord`
///
/// Never fails: undecodable bytes yield a record without the layers that
/// could not be read.
pub fn parse_ethernet_frame(data: &[u8], timestamp: f64) -> FrameRecord {
    let mut record = FrameRecord::new(data.len(), timestamp);

    let Some(ethernet) = parse_ethernet(data) else {
        trace!(len = data.len(), "frame shorter than an Ethernet header");
        return record;
    };
    record.ethernet = Some(ethernet);
    record.arp = payload_ether_type(data, ethernet.ether_type) == ETHERTYPE_ARP;

    match LaxSlicedPacket::from_ethernet(data) {
        Ok(sliced) => {
            if let Some((err, layer)) = &sliced.stop_err {
                trace!(error = %err, ?layer, "decoding stopped early");
            }
            if let Some(LinkSlice::Ethernet2(_)) = &sliced.link {
                record.ip = parse_ip(&sliced);
                let transport = parse_transport(&sliced);
                record.tcp = transport.tcp;
                record.udp = transport.udp;
            }
        }
        Err(e) => {
            trace!(error = %e, "upper layers not decodable, keeping Ethernet header only");
        }
    }

    record
}

/// Record for a frame captured on a non-Ethernet link
pub fn non_ethernet_frame(data: &[u8], timestamp: f64) -> FrameRecord {
    FrameRecord::new(data.len(), timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;
    use std::net::Ipv4Addr;

    const SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    const DST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

    fn tcp_frame() -> Vec<u8> {
        tcp_frame_with_payload(10)
    }

    fn tcp_frame_with_payload(payload_len: usize) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([192, 168, 1, 10], [192, 168, 1, 20], 64)
            .tcp(40000, 443, 1, 65535);
        let payload = vec![0u8; payload_len];
        let mut out = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut out, &payload).unwrap();
        out
    }

    fn udp6_frame() -> Vec<u8> {
        let src = [0u8; 16];
        let mut dst = [0u8; 16];
        dst[15] = 1;
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv6(src, dst, 64)
            .udp(5353, 53);
        let payload = [1u8; 4];
        let mut out = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut out, &payload).unwrap();
        out
    }

    fn arp_frame() -> Vec<u8> {
        let mut data = Vec::with_capacity(42);
        data.extend_from_slice(&[0xff; 6]);
        data.extend_from_slice(&SRC_MAC);
        data.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
        data.extend_from_slice(&[0u8; 28]);
        data
    }

    #[test]
    fn test_parse_tcp_frame() {
        let data = tcp_frame();
        let record = parse_ethernet_frame(&data, 1.5);

        assert_eq!(record.length, data.len());
        assert_eq!(record.timestamp, 1.5);
        let eth = record.ethernet.unwrap();
        assert_eq!(eth.src_mac, MacAddr(SRC_MAC));
        assert_eq!(eth.dst_mac, MacAddr(DST_MAC));
        assert_eq!(eth.ether_type, 0x0800);

        let ip = record.ip.unwrap();
        assert_eq!(ip.version, 4);
        assert_eq!(ip.src_addr, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(ip.protocol, 6);
        assert_eq!(record.tcp, Some(PortInfo::new(40000, 443)));
        assert_eq!(record.udp, None);
        assert!(!record.arp);
    }

    #[test]
    fn test_parse_udp_over_ipv6() {
        let record = parse_ethernet_frame(&udp6_frame(), 0.0);
        let ip = record.ip.unwrap();
        assert_eq!(ip.version, 6);
        assert_eq!(ip.protocol, 17);
        assert_eq!(record.udp, Some(PortInfo::new(5353, 53)));
        assert_eq!(record.tcp, None);
    }

    #[test]
    fn test_parse_arp_frame() {
        let record = parse_ethernet_frame(&arp_frame(), 0.0);
        assert!(record.arp);
        assert!(record.ip.is_none());
        assert_eq!(record.ethernet.unwrap().dst_mac, MacAddr::BROADCAST);
    }

    #[test]
    fn test_truncated_ip_keeps_ethernet() {
        let mut data = tcp_frame();
        data.truncate(20);
        let record = parse_ethernet_frame(&data, 0.0);
        assert!(record.ethernet.is_some());
        assert!(record.ip.is_none());
        assert!(record.tcp.is_none());
        assert_eq!(record.length, 20);
    }

    #[test]
    fn test_snaplen_truncated_frame_keeps_headers() {
        // 64-byte snaplen: all headers captured, most of the payload cut
        let mut data = tcp_frame_with_payload(200);
        assert!(data.len() > 64);
        data.truncate(64);

        let record = parse_ethernet_frame(&data, 0.0);
        assert_eq!(record.length, 64);
        let ip = record.ip.unwrap();
        assert_eq!(ip.version, 4);
        assert_eq!(ip.protocol, 6);
        assert_eq!(ip.dst_addr, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(record.tcp, Some(PortInfo::new(40000, 443)));
        assert_eq!(record.udp, None);
    }

    #[test]
    fn test_runt_frame_has_no_ethernet() {
        let record = parse_ethernet_frame(&[0u8; 8], 0.0);
        assert!(!record.has_ethernet());
        assert_eq!(record.length, 8);
    }
}
