//! Feature extraction from decoded frames
//!
//! Every Ethernet frame becomes one fixed-schema `FeatureVector`:
//!
//! ```text
//! [length, timestamp, src_mac, dst_mac, ethertype,
//!  src_ip|null, dst_ip|null, ip_proto|null, src_port|null, dst_port|null]
//! ```
//!
//! Only the first two fields are numeric. They form the matrix that the
//! clustering and anomaly models work on.

use std::net::IpAddr;

use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::core::{FrameRecord, MacAddr};
use crate::error::{AnalysisError, Result};

/// Feature names in serialization order
pub const FEATURE_NAMES: &[&str] = &[
    "length",
    "timestamp",
    "src_mac",
    "dst_mac",
    "ethertype",
    "src_ip",
    "dst_ip",
    "ip_proto",
    "src_port",
    "dst_port",
];

/// Number of fields in a feature vector
pub const NUM_FEATURES: usize = 10;

/// Number of leading numeric fields used by the models
pub const NUMERIC_FEATURES: usize = 2;

/// Numeric subset of one feature vector: `[length, timestamp]`
pub type NumericRow = [f64; NUMERIC_FEATURES];

/// Per-packet feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub length: u64,
    pub timestamp: f64,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub ether_type: u16,
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub ip_proto: Option<u8>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl FeatureVector {
    /// Numeric fields as floating point
    pub fn numeric(&self) -> NumericRow {
        [self.length as f64, self.timestamp]
    }
}

type FeatureTuple = (
    u64,
    f64,
    MacAddr,
    MacAddr,
    u16,
    Option<IpAddr>,
    Option<IpAddr>,
    Option<u8>,
    Option<u16>,
    Option<u16>,
);

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(NUM_FEATURES)?;
        tuple.serialize_element(&self.length)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&self.src_mac)?;
        tuple.serialize_element(&self.dst_mac)?;
        tuple.serialize_element(&self.ether_type)?;
        tuple.serialize_element(&self.src_ip)?;
        tuple.serialize_element(&self.dst_ip)?;
        tuple.serialize_element(&self.ip_proto)?;
        tuple.serialize_element(&self.src_port)?;
        tuple.serialize_element(&self.dst_port)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (length, timestamp, src_mac, dst_mac, ether_type, src_ip, dst_ip, ip_proto, src_port, dst_port) =
            <FeatureTuple as Deserialize>::deserialize(deserializer)?;
        Ok(Self {
            length,
            timestamp,
            src_mac,
            dst_mac,
            ether_type,
            src_ip,
            dst_ip,
            ip_proto,
            src_port,
            dst_port,
        })
    }
}

/// Numeric subset of a batch as an n x 2 matrix
pub fn numeric_matrix(vectors: &[FeatureVector]) -> Vec<NumericRow> {
    vectors.iter().map(FeatureVector::numeric).collect()
}

/// Per-protocol frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolCounts {
    #[serde(rename = "IPv4")]
    pub ipv4: u64,
    #[serde(rename = "IPv6")]
    pub ipv6: u64,
    #[serde(rename = "ARP")]
    pub arp: u64,
    #[serde(rename = "TCP")]
    pub tcp: u64,
    #[serde(rename = "UDP")]
    pub udp: u64,
}

/// Protocol distribution of the extracted frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub total_packets: u64,
    pub protocol_counts: ProtocolCounts,
}

impl ProtocolSummary {
    /// Count one extracted frame. Each counter moves at most once.
    fn record(&mut self, frame: &FrameRecord) {
        self.total_packets += 1;

        if let Some(ip) = &frame.ip {
            match ip.version {
                4 => self.protocol_counts.ipv4 += 1,
                6 => self.protocol_counts.ipv6 += 1,
                _ => {}
            }
        }
        if frame.arp {
            self.protocol_counts.arp += 1;
        }
        if frame.tcp.is_some() {
            self.protocol_counts.tcp += 1;
        }
        if frame.udp.is_some() {
            self.protocol_counts.udp += 1;
        }
    }
}

/// Feature extractor for a batch of frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build the feature vector for one frame
    ///
    /// Returns `Ok(None)` for frames without an Ethernet layer.
    pub fn extract_frame(&self, frame: &FrameRecord) -> Result<Option<FeatureVector>> {
        let Some(eth) = &frame.ethernet else {
            return Ok(None);
        };

        if !frame.timestamp.is_finite() {
            return Err(AnalysisError::MalformedField {
                field: "timestamp",
                reason: format!("{} is not a finite number", frame.timestamp),
            });
        }

        let ports = frame.ports();
        Ok(Some(FeatureVector {
            length: frame.length as u64,
            timestamp: frame.timestamp,
            src_mac: eth.src_mac,
            dst_mac: eth.dst_mac,
            ether_type: eth.ether_type,
            src_ip: frame.ip.map(|ip| ip.src_addr),
            dst_ip: frame.ip.map(|ip| ip.dst_addr),
            ip_proto: frame.ip.map(|ip| ip.protocol),
            src_port: ports.map(|p| p.src_port),
            dst_port: ports.map(|p| p.dst_port),
        }))
    }

    /// Extract vectors and the protocol summary for a batch
    ///
    /// Frames without Ethernet are skipped. Malformed frames are dropped on
    /// their own without affecting the rest of the batch. Neither kind is
    /// counted in the summary.
    pub fn extract(&self, frames: &[FrameRecord]) -> (Vec<FeatureVector>, ProtocolSummary) {
        let mut vectors = Vec::with_capacity(frames.len());
        let mut summary = ProtocolSummary::default();
        let mut skipped = 0usize;
        let mut dropped = 0usize;

        for (index, frame) in frames.iter().enumerate() {
            match self.extract_frame(frame) {
                Ok(Some(vector)) => {
                    summary.record(frame);
                    vectors.push(vector);
                }
                Ok(None) => skipped += 1,
                Err(e) => {
                    warn!("Dropping frame {}: {}", index, e);
                    dropped += 1;
                }
            }
        }

        debug!(
            "Extracted {} feature vectors ({} non-Ethernet skipped, {} malformed dropped)",
            vectors.len(),
            skipped,
            dropped
        );

        (vectors, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EthernetInfo, IpInfo};
    use std::net::Ipv4Addr;

    fn eth() -> EthernetInfo {
        EthernetInfo::new([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2], 0x0800)
    }

    fn ipv4(protocol: u8) -> IpInfo {
        IpInfo::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            protocol,
        )
    }

    fn scenario_frames() -> Vec<FrameRecord> {
        vec![
            FrameRecord::new(100, 0.0).with_ethernet(eth()).with_ip(ipv4(6)).with_tcp(1000, 80),
            FrameRecord::new(200, 1.0).with_ethernet(eth()).with_ip(ipv4(17)).with_udp(2000, 53),
            FrameRecord::new(60, 2.0).with_ethernet(eth()),
        ]
    }

    #[test]
    fn test_three_frame_scenario() {
        let (vectors, summary) = FeatureExtractor::new().extract(&scenario_frames());

        assert_eq!(vectors.len(), 3);
        assert_eq!(summary.total_packets, 3);
        assert_eq!(
            summary.protocol_counts,
            ProtocolCounts { ipv4: 2, ipv6: 0, arp: 0, tcp: 1, udp: 1 }
        );

        assert_eq!(vectors[0].src_port, Some(1000));
        assert_eq!(vectors[1].dst_port, Some(53));
        assert_eq!(vectors[1].ip_proto, Some(17));
        assert_eq!(vectors[2].src_ip, None);
        assert_eq!(vectors[2].ip_proto, None);
        assert_eq!(vectors[2].src_port, None);
        assert_eq!(vectors[2].numeric(), [60.0, 2.0]);
    }

    #[test]
    fn test_skips_frames_without_ethernet() {
        let mut frames = scenario_frames();
        frames.insert(1, FrameRecord::new(1500, 0.5).with_ip(ipv4(6)).with_tcp(1, 2));
        frames.push(FrameRecord::new(40, 3.0).with_arp());

        let (vectors, summary) = FeatureExtractor::new().extract(&frames);

        assert_eq!(vectors.len(), 3);
        assert_eq!(summary.total_packets, vectors.len() as u64);
        assert_eq!(summary.protocol_counts.tcp, 1);
        assert_eq!(summary.protocol_counts.arp, 0);
        assert_eq!(vectors[1].length, 200);
    }

    #[test]
    fn test_empty_input() {
        let (vectors, summary) = FeatureExtractor::new().extract(&[]);
        assert!(vectors.is_empty());
        assert_eq!(summary, ProtocolSummary::default());
    }

    #[test]
    fn test_unknown_ip_version_still_extracted() {
        let mut ip = ipv4(6);
        ip.version = 5;
        let frames = vec![FrameRecord::new(80, 0.0).with_ethernet(eth()).with_ip(ip)];

        let (vectors, summary) = FeatureExtractor::new().extract(&frames);

        assert_eq!(vectors.len(), 1);
        assert_eq!(summary.total_packets, 1);
        assert_eq!(summary.protocol_counts.ipv4, 0);
        assert_eq!(summary.protocol_counts.ipv6, 0);
        assert_eq!(vectors[0].ip_proto, Some(6));
    }

    #[test]
    fn test_independent_counters() {
        let v6 = IpInfo::new("fe80::1".parse().unwrap(), "ff02::1".parse().unwrap(), 6);
        let frames = vec![
            FrameRecord::new(90, 0.0).with_ethernet(eth()).with_ip(v6).with_tcp(1, 2).with_udp(3, 4),
            FrameRecord::new(42, 1.0).with_ethernet(eth()).with_arp(),
        ];

        let (vectors, summary) = FeatureExtractor::new().extract(&frames);

        assert_eq!(
            summary.protocol_counts,
            ProtocolCounts { ipv4: 0, ipv6: 1, arp: 1, tcp: 1, udp: 1 }
        );
        // TCP wins the port fields when both are present
        assert_eq!(vectors[0].src_port, Some(1));
    }

    #[test]
    fn test_malformed_timestamp_drops_only_that_frame() {
        let mut frames = scenario_frames();
        frames[1].timestamp = f64::NAN;

        let extractor = FeatureExtractor::new();
        assert!(matches!(
            extractor.extract_frame(&frames[1]),
            Err(AnalysisError::MalformedField { field: "timestamp", .. })
        ));

        let (vectors, summary) = extractor.extract(&frames);
        assert_eq!(vectors.len(), 2);
        assert_eq!(summary.total_packets, 2);
        assert_eq!(summary.protocol_counts.udp, 0);
    }

    #[test]
    fn test_vector_serializes_as_fixed_array() {
        let (vectors, summary) = FeatureExtractor::new().extract(&scenario_frames());

        let json = serde_json::to_value(&vectors[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                100, 0.0, "02:00:00:00:00:01", "02:00:00:00:00:02", 2048,
                "10.0.0.1", "10.0.0.2", 6, 1000, 80
            ])
        );

        let json = serde_json::to_value(&vectors[2]).unwrap();
        let fields = json.as_array().unwrap();
        assert_eq!(fields.len(), NUM_FEATURES);
        assert!(fields[5..].iter().all(|f| f.is_null()));

        let back: FeatureVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, vectors[2]);

        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["total_packets"], 3);
        assert_eq!(json["protocol_counts"]["IPv4"], 2);
        assert_eq!(json["protocol_counts"]["IPv6"], 0);
    }

    #[test]
    fn test_feature_names_match_schema() {
        assert_eq!(FEATURE_NAMES.len(), NUM_FEATURES);
        assert_eq!(&FEATURE_NAMES[..NUMERIC_FEATURES], &["length", "timestamp"]);
    }
}
