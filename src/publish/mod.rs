pub mod publisher;
pub mod sinks;

pub use publisher::{DeliveryReport, PublishError, PublisherState, SnapshotPublisher};
pub use sinks::{BroadcastSink, JsonLinesSink, LogSink, SnapshotSink};
