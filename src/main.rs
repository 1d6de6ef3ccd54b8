use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use packet_telemetry::analysis::unix_now;
use packet_telemetry::capture::{IngestionAdapter, ReplaySource, SourceStats};
use packet_telemetry::config::{CaptureConfig, Config};
use packet_telemetry::formatting::format_duration;
use packet_telemetry::publish::{JsonLinesSink, LogSink, SnapshotPublisher};
use packet_telemetry::Aggregator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "packet-telemetry")]
#[command(about = "Live packet statistics with periodic snapshots")]
struct Cli {
    #[arg(short, long, help = "Network interface to capture on")]
    interface: Option<String>,

    #[arg(short, long, help = "BPF capture filter, e.g. \"tcp\" or \"port 80\"")]
    filter: Option<String>,

    #[arg(short, long, help = "Configuration file path (TOML)")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Replay decoded packets from a JSON-lines file instead of capturing")]
    replay: Option<PathBuf>,

    #[arg(long, requires = "replay", help = "Shift replayed timestamps so the first packet is 'now'")]
    rebase: bool,

    #[arg(long, help = "Also print every snapshot as a JSON line on stdout")]
    json: bool,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if cli.interface.is_some() {
        config.capture.interface = cli.interface.clone();
    }
    if cli.filter.is_some() {
        config.capture.filter = cli.filter.clone();
    }

    let aggregator = Arc::new(Aggregator::from_config(&config.engine)?);
    let adapter = IngestionAdapter::new(Arc::clone(&aggregator));

    let mut publisher = SnapshotPublisher::new(Arc::clone(&aggregator), &config.publisher)?;
    publisher.add_sink(Arc::new(LogSink::new()));
    if cli.json {
        publisher.add_sink(Arc::new(JsonLinesSink::new("stdout", std::io::stdout())));
    }
    publisher.start()?;
    let started = Instant::now();

    let capture = match cli.replay {
        Some(path) => {
            let source = ReplaySource::new(path).with_rebase(cli.rebase);
            tokio::task::spawn_blocking(move || source.run(&adapter)).await??;
            None
        }
        None => Some(LiveCapture::start(&config.capture, adapter)?),
    };

    info!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    if let Some(capture) = capture {
        let stats = capture.stop()?;
        info!("Capture stopped after {} packets", stats.delivered);
    }
    publisher.shutdown().await;

    match publisher.publish_once(unix_now()) {
        Ok(report) if !report.failed.is_empty() => warn!("Final snapshot not delivered to {:?}", report.failed),
        Ok(_) => {}
        Err(e) => warn!("Final snapshot failed: {}", e),
    }

    info!(
        "Stopped after {}, {} packets ingested",
        format_duration(started.elapsed().as_secs()),
        aggregator.total_packets()
    );
    Ok(())
}

#[cfg(feature = "live-capture")]
struct LiveCapture {
    running: Arc<std::sync::atomic::AtomicBool>,
    handle: std::thread::JoinHandle<Result<SourceStats, packet_telemetry::capture::CaptureError>>,
}

#[cfg(feature = "live-capture")]
impl LiveCapture {
    fn start(config: &CaptureConfig, adapter: IngestionAdapter) -> anyhow::Result<Self> {
        let source = packet_telemetry::capture::PcapSource::open(config)?;
        info!("Capturing on {}", source.interface());
        let running = source.stop_handle();
        let handle = source.spawn(adapter)?;
        Ok(Self { running, handle })
    }

    fn stop(self) -> anyhow::Result<SourceStats> {
        self.running.store(false, std::sync::atomic::Ordering::Relaxed);
        let stats = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("capture thread panicked"))??;
        Ok(stats)
    }
}

#[cfg(not(feature = "live-capture"))]
struct LiveCapture;

#[cfg(not(feature = "live-capture"))]
impl LiveCapture {
    fn start(_config: &CaptureConfig, _adapter: IngestionAdapter) -> anyhow::Result<Self> {
        anyhow::bail!("live capture is not compiled in; rebuild with `--features live-capture` or use --replay")
    }

    fn stop(self) -> anyhow::Result<SourceStats> {
        Ok(SourceStats::default())
    }
}
