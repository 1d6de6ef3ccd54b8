use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::analysis::{classify_flags, Aggregator, PacketRecord, TransportFlags};

/// One decoded packet as handed over by a packet source.
///
/// `has_ip`, `byte_length` and `timestamp` are required when deserializing;
/// the rest may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DecodedPacket {
    pub has_ip: bool,
    #[serde(default)]
    pub source_addr: Option<String>,
    #[serde(default)]
    pub dest_addr: Option<String>,
    #[serde(default)]
    pub transport: TransportFlags,
    #[serde(default)]
    pub ip_protocol: Option<u8>,
    pub byte_length: u64,
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,
}

/// Translates packet-source notifications into `Aggregator::ingest` calls.
///
/// Cheap to clone; move a clone into whatever thread the packet source
/// delivers on.
#[derive(Debug, Clone)]
pub struct IngestionAdapter {
    aggregator: Arc<Aggregator>,
}

impl IngestionAdapter {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }

    pub fn on_packet(&self, packet: DecodedPacket) {
        self.aggregator.ingest(Self::to_record(packet));
    }

    pub fn to_record(packet: DecodedPacket) -> PacketRecord {
        let protocol = classify_flags(packet.has_ip, packet.ip_protocol, packet.transport);
        PacketRecord {
            observed_at: packet.timestamp,
            source_addr: packet.source_addr,
            dest_addr: packet.dest_addr,
            protocol,
            byte_length: packet.byte_length,
        }
    }
}
