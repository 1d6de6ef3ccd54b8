use serde::Serialize;
use std::collections::VecDeque;
use crate::analysis::protocols::ProtocolLabel;

/// Decoded summary of one observed packet. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    /// Seconds since the Unix epoch, fractional.
    #[serde(rename = "timestamp")]
    pub observed_at: f64,
    #[serde(rename = "src")]
    pub source_addr: Option<String>,
    #[serde(rename = "dst")]
    pub dest_addr: Option<String>,
    pub protocol: ProtocolLabel,
    #[serde(rename = "size")]
    pub byte_length: u64,
}

/// Fixed-capacity record buffer kept in delivery order.
///
/// Appending to a full buffer evicts the oldest record first. Timestamps are
/// not assumed to be sorted: a packet source may deliver out of temporal
/// order, so `records_since` filters every record individually.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    records: VecDeque<PacketRecord>,
    capacity: usize,
}

impl BoundedHistory {
    /// `capacity` must be non-zero; callers validate it through the config layer.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, record: PacketRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Copy of the current contents, oldest to newest.
    pub fn snapshot_records(&self) -> Vec<PacketRecord> {
        self.records.iter().cloned().collect()
    }

    /// Records with `observed_at > cutoff`, in delivery order.
    pub fn records_since(&self, cutoff: f64) -> Vec<PacketRecord> {
        self.records
            .iter()
            .filter(|record| record.observed_at > cutoff)
            .cloned()
            .collect()
    }

    /// The newest `n` records, oldest to newest.
    pub fn last_n(&self, n: usize) -> Vec<PacketRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
