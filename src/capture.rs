//! Capture file reading
//!
//! Reads pcap and pcapng containers into an ordered list of `FrameRecord`s.
//! The container format is picked from the leading magic number. Frames
//! from non-Ethernet link types are kept as records without an Ethernet
//! layer so the extractor can skip them like any other non-Ethernet frame.
//!
//! pcapng timestamps are scaled by each interface's `if_tsresol` option,
//! defaulting to microseconds when the option is absent.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use pcap_file::pcap::PcapReader;
use pcap_file::pcapng::blocks::interface_description::{InterfaceDescriptionBlock, InterfaceDescriptionOption};
use pcap_file::pcapng::{Block, PcapNgReader};
use pcap_file::DataLink;
use tracing::{debug, info};

use crate::core::{non_ethernet_frame, parse_ethernet_frame, FrameRecord};
use crate::error::{AnalysisError, Result};

/// Section header block type, which is also the pcapng magic
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// `if_tsresol` when an interface does not carry the option: 10^-6 s
const DEFAULT_TSRESOL: u8 = 6;

/// Capture container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap,
    PcapNg,
}

impl CaptureFormat {
    /// Detect format from the first bytes of a capture
    pub fn detect(magic: &[u8]) -> Option<Self> {
        if magic.len() < 4 {
            return None;
        }
        match magic[..4] {
            [0x0a, 0x0d, 0x0d, 0x0a] => Some(CaptureFormat::PcapNg),
            [0xd4, 0xc3, 0xb2, 0xa1]
            | [0xa1, 0xb2, 0xc3, 0xd4]
            | [0x4d, 0x3c, 0xb2, 0xa1]
            | [0xa1, 0xb2, 0x3c, 0x4d] => Some(CaptureFormat::Pcap),
            _ => None,
        }
    }
}

/// Read a capture file from disk
pub fn read_capture_file<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    info!("Reading capture {}", path.display());
    read_capture(file)
}

/// Read every frame of a pcap or pcapng stream
pub fn read_capture<R: Read>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut reader = BufReader::new(reader);
    let magic: Vec<u8> = reader.fill_buf()?.iter().take(PCAPNG_MAGIC.len()).copied().collect();

    match CaptureFormat::detect(&magic) {
        Some(CaptureFormat::Pcap) => read_pcap(reader),
        Some(CaptureFormat::PcapNg) => read_pcapng(reader),
        None if magic.is_empty() => Err(AnalysisError::Capture("capture is empty".to_string())),
        None => Err(AnalysisError::Capture(format!(
            "unrecognized capture magic {:02x?}",
            magic
        ))),
    }
}

fn read_pcap<R: Read>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut pcap_reader = PcapReader::new(reader)?;
    let is_ethernet = matches!(pcap_reader.header().datalink, DataLink::ETHERNET);
    if !is_ethernet {
        debug!(
            "pcap link type {:?} is not Ethernet, frames will be skipped",
            pcap_reader.header().datalink
        );
    }

    let mut frames = Vec::new();
    while let Some(packet) = pcap_reader.next_packet() {
        let packet = packet?;
        let timestamp = packet.timestamp.as_secs_f64();
        frames.push(decode(&packet.data, timestamp, is_ethernet));
    }

    debug!("Read {} frames from pcap", frames.len());
    Ok(frames)
}

/// Link type and timestamp resolution of one pcapng interface
#[derive(Debug, Clone, Copy)]
struct Interface {
    link_type: DataLink,
    tsresol: u8,
}

impl Interface {
    fn from_block(idb: &InterfaceDescriptionBlock<'_>) -> Self {
        let tsresol = idb
            .options
            .iter()
            .find_map(|opt| match opt {
                InterfaceDescriptionOption::IfTsResol(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(DEFAULT_TSRESOL);
        Self {
            link_type: idb.linktype,
            tsresol,
        }
    }

    fn is_ethernet(&self) -> bool {
        matches!(self.link_type, DataLink::ETHERNET)
    }
}

/// Convert a raw pcapng timestamp to seconds
///
/// pcap-file hands back the raw 64-bit unit count as nanoseconds whatever
/// the interface resolution is. `tsresol` with the high bit clear means
/// units of 10^-v seconds, with it set 2^-(v & 0x7f) seconds.
fn timestamp_seconds(raw: Duration, tsresol: u8) -> f64 {
    let units = raw.as_nanos();
    let exponent = u32::from(tsresol & 0x7f);
    let per_second = if tsresol & 0x80 == 0 {
        10u128.checked_pow(exponent)
    } else {
        1u128.checked_shl(exponent)
    };
    match per_second {
        Some(div) => (units / div) as f64 + (units % div) as f64 / div as f64,
        None => units as f64 / 10f64.powi(exponent as i32),
    }
}

fn read_pcapng<R: Read>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut ng_reader = PcapNgReader::new(reader)?;
    let mut interfaces: Vec<Interface> = Vec::new();
    let mut frames = Vec::new();
    let mut last_timestamp = 0.0;

    while let Some(block) = ng_reader.next_block() {
        match block? {
            // Interface ids restart in every section
            Block::SectionHeader(_) => interfaces.clear(),
            Block::InterfaceDescription(idb) => {
                let interface = Interface::from_block(&idb);
                debug!(
                    "pcapng interface {}: {:?}, tsresol {:#04x}",
                    interfaces.len(),
                    interface.link_type,
                    interface.tsresol
                );
                interfaces.push(interface);
            }
            Block::EnhancedPacket(epb) => {
                let interface = interfaces.get(epb.interface_id as usize);
                let tsresol = interface.map_or(DEFAULT_TSRESOL, |i| i.tsresol);
                last_timestamp = timestamp_seconds(epb.timestamp, tsresol);
                let is_ethernet = interface.is_some_and(Interface::is_ethernet);
                frames.push(decode(&epb.data, last_timestamp, is_ethernet));
            }
            Block::SimplePacket(spb) => {
                // Simple packets carry no timestamp and always belong to the first interface
                let is_ethernet = interfaces.first().is_some_and(Interface::is_ethernet);
                frames.push(decode(&spb.data, last_timestamp, is_ethernet));
            }
            _ => {}
        }
    }

    debug!("Read {} frames from pcapng", frames.len());
    Ok(frames)
}

fn decode(data: &[u8], timestamp: f64, is_ethernet: bool) -> FrameRecord {
    if is_ethernet {
        parse_ethernet_frame(data, timestamp)
    } else {
        non_ethernet_frame(data, timestamp)
    }
}
