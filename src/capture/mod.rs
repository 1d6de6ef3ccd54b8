pub mod adapter;
pub mod decoder;
pub mod replay;
#[cfg(feature = "live-capture")]
pub mod pcap_engine;

pub use adapter::{DecodedPacket, IngestionAdapter};
pub use decoder::decode_frame;
pub use replay::{replay_lines, ReplaySource};
#[cfg(feature = "live-capture")]
pub use pcap_engine::PcapSource;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Insufficient privileges. Try: sudo setcap cap_net_raw,cap_net_admin=eip ./packet-telemetry")]
    InsufficientPrivileges,

    #[error("Network interface '{0}' not found. Available interfaces: {1:?}")]
    InterfaceNotFound(String, Vec<String>),

    #[error("Packet capture failed: {0}")]
    Capture(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters a packet source reports when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub delivered: u64,
    pub skipped: u64,
}
