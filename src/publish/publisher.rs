use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use crate::analysis::{Aggregator, EngineError, Snapshot};
use crate::config::{ConfigError, PublisherConfig};
use crate::publish::SnapshotSink;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publisher is already running")]
    AlreadyRunning,

    #[error("publisher must be started from within a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Idle,
    Running,
}

/// Outcome of one publishing tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

type SinkList = Arc<RwLock<Vec<Arc<dyn SnapshotSink>>>>;

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodically snapshots an `Aggregator` and pushes the result to every
/// registered sink.
///
/// A failing or panicking sink is logged and skipped; the others still get
/// the snapshot and the loop keeps ticking.
pub struct SnapshotPublisher {
    aggregator: Arc<Aggregator>,
    sinks: SinkList,
    period: Duration,
    window_secs: f64,
    running: Option<RunningLoop>,
}

impl SnapshotPublisher {
    pub fn new(aggregator: Arc<Aggregator>, config: &PublisherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window_secs = aggregator.window_secs();
        Ok(Self {
            aggregator,
            sinks: Arc::new(RwLock::new(Vec::new())),
            period: config.period(),
            window_secs,
            running: None,
        })
    }

    /// Registers a sink. Takes effect from the next tick, running or not.
    pub fn add_sink(&self, sink: Arc<dyn SnapshotSink>) {
        debug!("registering snapshot sink {}", sink.name());
        self.sinks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn state(&self) -> PublisherState {
        match &self.running {
            Some(running) if !running.handle.is_finished() => PublisherState::Running,
            _ => PublisherState::Idle,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start(&mut self) -> Result<(), PublishError> {
        if self.state() == PublisherState::Running {
            return Err(PublishError::AlreadyRunning);
        }
        let runtime = Handle::try_current().map_err(|_| PublishError::NoRuntime)?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let aggregator = Arc::clone(&self.aggregator);
        let sinks = Arc::clone(&self.sinks);
        let period = self.period;

        let handle = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        // Sinks may do blocking I/O; keep it off the runtime workers.
                        let aggregator = Arc::clone(&aggregator);
                        let sinks = Arc::clone(&sinks);
                        let tick = task::spawn_blocking(move || {
                            aggregator.snapshot_now().map(|snapshot| deliver(&snapshot, &sinks))
                        });
                        match tick.await {
                            Ok(Ok(report)) => debug!(
                                "tick delivered to {} sinks, {} failed",
                                report.delivered.len(),
                                report.failed.len()
                            ),
                            Ok(Err(e)) => error!("Snapshot failed: {}", e),
                            Err(e) => error!("Publisher tick aborted: {}", e),
                        }
                    }
                }
            }
            debug!("publisher loop exited");
        });

        info!(
            "Snapshot publisher started: every {:?}, {}s window, {} sinks",
            self.period,
            self.window_secs,
            self.sink_count()
        );
        self.running = Some(RunningLoop { stop_tx, handle });
        Ok(())
    }

    /// Ends the periodic loop. Safe to call in any state.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            // The loop may already be gone; nothing left to signal then.
            let _ = running.stop_tx.send(true);
            info!("Snapshot publisher stopped");
        }
    }

    /// Stops the loop and waits for the in-flight tick to finish.
    pub async fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(true);
            if let Err(e) = running.handle.await {
                warn!("Publisher task ended abnormally: {}", e);
            }
            info!("Snapshot publisher shut down");
        }
    }

    /// Runs a single tick now, outside the periodic loop.
    pub fn publish_once(&self, now: f64) -> Result<DeliveryReport, EngineError> {
        let snapshot = self.aggregator.snapshot(self.window_secs, now)?;
        Ok(deliver(&snapshot, &self.sinks))
    }
}

impl Drop for SnapshotPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deliver(snapshot: &Snapshot, sinks: &SinkList) -> DeliveryReport {
    let sinks: Vec<Arc<dyn SnapshotSink>> = sinks
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();

    let mut report = DeliveryReport::default();
    for sink in sinks {
        let name = sink.name().to_string();
        match panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(snapshot))) {
            Ok(Ok(())) => report.delivered.push(name),
            Ok(Err(e)) => {
                warn!("Sink {} failed to take snapshot: {:#}", name, e);
                report.failed.push(name);
            }
            Err(_) => {
                error!("Sink {} panicked while taking snapshot", name);
                report.failed.push(name);
            }
        }
    }
    report
}
