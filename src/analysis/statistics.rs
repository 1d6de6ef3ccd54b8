use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use crate::analysis::history::{BoundedHistory, PacketRecord};
use crate::analysis::protocols::ProtocolLabel;
use crate::config::{ConfigError, EngineConfig};

/// Per-protocol packet counts. Ordered so serialized output is stable.
pub type ProtocolCounters = BTreeMap<ProtocolLabel, u64>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("snapshot window must be a positive number of seconds, got {0}")]
    InvalidWindow(f64),
}

/// Point-in-time aggregate view. Independent of the aggregator once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub total_packets: u64,
    #[serde(rename = "protocol_counts")]
    pub per_protocol: ProtocolCounters,
    #[serde(rename = "packets_per_sec")]
    pub packets_per_second: f64,
    #[serde(rename = "top_src_ips")]
    pub top_sources: Vec<(String, u64)>,
    #[serde(rename = "recent")]
    pub recent_sample: Vec<PacketRecord>,
}

impl Snapshot {
    pub fn protocol_count(&self, label: &ProtocolLabel) -> u64 {
        self.per_protocol.get(label).copied().unwrap_or(0)
    }

    pub fn top_source(&self) -> Option<&(String, u64)> {
        self.top_sources.first()
    }
}

#[derive(Debug)]
struct AggregateState {
    total_packets: u64,
    per_protocol: ProtocolCounters,
    history: BoundedHistory,
}

/// Thread-safe accumulator of packet counters and recent history.
///
/// Every mutation happens inside `ingest` under one lock. `snapshot` takes the
/// same lock only to copy the counters, the windowed records and the recent
/// sample; ranking runs after the lock is released.
#[derive(Debug)]
pub struct Aggregator {
    state: Mutex<AggregateState>,
    window_secs: f64,
    top_talkers: usize,
    recent_sample: usize,
}

impl Aggregator {
    pub fn new(history_capacity: usize) -> Result<Self, ConfigError> {
        Self::from_config(&EngineConfig {
            history_capacity,
            ..EngineConfig::default()
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(AggregateState {
                total_packets: 0,
                per_protocol: ProtocolCounters::new(),
                history: BoundedHistory::new(config.history_capacity),
            }),
            window_secs: config.window_secs,
            top_talkers: config.top_talkers,
            recent_sample: config.recent_sample,
        })
    }

    // Every critical section leaves the state consistent, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ingest(&self, record: PacketRecord) {
        let mut state = self.lock();
        state.total_packets += 1;
        *state.per_protocol.entry(record.protocol).or_insert(0) += 1;
        state.history.append(record);
    }

    pub fn snapshot(&self, window_secs: f64, now: f64) -> Result<Snapshot, EngineError> {
        if !(window_secs.is_finite() && window_secs > 0.0) {
            return Err(EngineError::InvalidWindow(window_secs));
        }

        let (total_packets, per_protocol, windowed, recent_sample) = {
            let state = self.lock();
            (
                state.total_packets,
                state.per_protocol.clone(),
                state.history.records_since(now - window_secs),
                state.history.last_n(self.recent_sample),
            )
        };

        let packets_per_second = windowed.len() as f64 / window_secs;
        let top_sources = rank_sources(&windowed, self.top_talkers);

        debug!(
            "snapshot: {} total, {} in {}s window, {} sources ranked",
            total_packets,
            windowed.len(),
            window_secs,
            top_sources.len()
        );

        Ok(Snapshot {
            total_packets,
            per_protocol,
            packets_per_second,
            top_sources,
            recent_sample,
        })
    }

    /// Snapshot over the configured window, ending at the current wall clock.
    pub fn snapshot_now(&self) -> Result<Snapshot, EngineError> {
        self.snapshot(self.window_secs, unix_now())
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn total_packets(&self) -> u64 {
        self.lock().total_packets
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }
}

/// Counts records per source address and returns the `limit` busiest,
/// highest count first. Ties keep the order in which addresses first appear.
fn rank_sources(records: &[PacketRecord], limit: usize) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(addr) = record.source_addr.as_deref() {
            counts.entry(addr).or_insert((0, index)).0 += 1;
        }
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.truncate(limit);
    ranked
        .into_iter()
        .map(|(addr, (count, _))| (addr.to_string(), count))
        .collect()
}

/// Current wall clock as fractional seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
