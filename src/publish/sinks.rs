use anyhow::Context;
use log::{debug, info};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use crate::analysis::Snapshot;
use crate::utils::formatting::{format_bytes, format_clock_time, format_ip_address};

/// Receives every snapshot the publisher produces.
///
/// Deliveries happen on the publisher's task, one sink after another, so a
/// sink should hand slow work off (see `BroadcastSink`) rather than block.
pub trait SnapshotSink: Send + Sync {
    /// Name used in delivery reports and logs.
    fn name(&self) -> &str;

    fn deliver(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Writes a one-line summary of each snapshot to the log.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new() -> Self {
        Self { name: "log".to_string() }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let top_talker = snapshot
            .top_source()
            .map(|(addr, count)| format!("{} ({})", format_ip_address(addr), count))
            .unwrap_or_else(|| "-".to_string());
        let protocols: Vec<String> = snapshot
            .per_protocol
            .iter()
            .map(|(label, count)| format!("{}={}", label, count))
            .collect();
        let sample_bytes: u64 = snapshot.recent_sample.iter().map(|r| r.byte_length).sum();
        let last_seen = snapshot
            .recent_sample
            .last()
            .map(|r| format_clock_time(r.observed_at))
            .unwrap_or_else(|| "-".to_string());

        info!(
            "{} packets, {:.2} pkt/s, top talker {}, [{}], last {} packets {} (newest {})",
            snapshot.total_packets,
            snapshot.packets_per_second,
            top_talker,
            protocols.join(" "),
            snapshot.recent_sample.len(),
            format_bytes(sample_bytes),
            last_seen
        );
        Ok(())
    }
}

/// Serializes each snapshot as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    name: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> SnapshotSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let line = serde_json::to_string(snapshot).context("serializing snapshot")?;
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line).context("writing snapshot line")?;
        writer.flush().context("flushing snapshot writer")?;
        Ok(())
    }
}

/// Fans serialized snapshots out to any number of live viewers.
///
/// Each viewer holds a `broadcast::Receiver`; a lagging viewer loses old
/// snapshots instead of slowing the publisher. Having no viewers is normal.
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<str>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl SnapshotSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn deliver(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let payload: Arc<str> = serde_json::to_string(snapshot)
            .context("serializing snapshot")?
            .into();
        match self.sender.send(payload) {
            Ok(viewers) => debug!("snapshot broadcast to {} viewers", viewers),
            Err(_) => debug!("no viewers connected, snapshot dropped"),
        }
        Ok(())
    }
}
