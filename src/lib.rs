// Library exports for packet-telemetry
pub mod analysis;
pub mod capture;
pub mod config;
pub mod publish;
pub mod utils;

pub use analysis::{protocols, history, statistics};
pub use analysis::{classify, Aggregator, PacketRecord, ProtocolLabel, Snapshot};
pub use capture::{adapter, decoder, replay};
pub use capture::{DecodedPacket, IngestionAdapter};
pub use config::settings;
pub use publish::{publisher, sinks};
pub use publish::{SnapshotPublisher, SnapshotSink};
pub use utils::formatting;

// Error types
pub use anyhow::{Error, Result};
