pub mod protocols;
pub mod history;
pub mod statistics;

pub use protocols::{classify, classify_flags, ProtocolLabel, TransportFlags};
pub use history::{BoundedHistory, PacketRecord};
pub use statistics::{unix_now, Aggregator, EngineError, ProtocolCounters, Snapshot};
