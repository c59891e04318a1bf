//! Core frame types and decoding
//!
//! - `layers`: Strongly-typed header structs and `FrameRecord`
//! - `parser`: Ethernet/IP/transport decoding into `FrameRecord`

pub mod layers;
pub mod parser;

pub use layers::{EthernetInfo, FrameRecord, IpInfo, MacAddr, PortInfo};
pub use parser::{parse_ethernet_frame, non_ethernet_frame, TransportInfo};
