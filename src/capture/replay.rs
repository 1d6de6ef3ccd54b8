use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use crate::analysis::unix_now;
use crate::capture::{CaptureError, DecodedPacket, IngestionAdapter, SourceStats};

/// Feeds decoded packets from a JSON-lines file into the engine.
///
/// Each line holds one `DecodedPacket`. Lines that do not parse are logged
/// and skipped.
pub struct ReplaySource {
    path: PathBuf,
    rebase: bool,
}

impl ReplaySource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rebase: false,
        }
    }

    /// Shift every timestamp so the first packet lands at the current time,
    /// keeping recorded spacing. Lets old captures show up in the live window.
    pub fn with_rebase(mut self, rebase: bool) -> Self {
        self.rebase = rebase;
        self
    }

    pub fn run(&self, adapter: &IngestionAdapter) -> Result<SourceStats, CaptureError> {
        let file = File::open(&self.path)?;
        info!("Replaying decoded packets from {}", self.path.display());
        let stats = replay_lines(BufReader::new(file), adapter, self.rebase.then(unix_now))?;
        info!(
            "Replay finished: {} packets delivered, {} lines skipped",
            stats.delivered, stats.skipped
        );
        Ok(stats)
    }
}

/// `rebase_to` anchors the first packet's timestamp when set.
pub fn replay_lines<R: BufRead>(
    reader: R,
    adapter: &IngestionAdapter,
    rebase_to: Option<f64>,
) -> Result<SourceStats, CaptureError> {
    let mut stats = SourceStats::default();
    let mut offset: Option<f64> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut packet: DecodedPacket = match serde_json::from_str(line) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Skipping replay line {}: {}", index + 1, e);
                stats.skipped += 1;
                continue;
            }
        };

        if let Some(anchor) = rebase_to {
            let shift = *offset.get_or_insert(anchor - packet.timestamp);
            packet.timestamp += shift;
        }

        adapter.on_packet(packet);
        stats.delivered += 1;
    }

    debug!("replay reader exhausted after {} packets", stats.delivered);
    Ok(stats)
}
