use log::{debug, info, warn};
use pcap::{Active, Capture, Device};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crate::capture::{decode_frame, CaptureError, IngestionAdapter, SourceStats};
use crate::config::CaptureConfig;

/// Live packet source backed by libpcap.
///
/// Runs on its own thread, decodes each frame and hands it to the
/// ingestion adapter. Clearing the running flag stops it after the current
/// read returns (at most one read timeout later).
pub struct PcapSource {
    capture: Capture<Active>,
    interface: String,
    running: Arc<AtomicBool>,
}

impl PcapSource {
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let available_devices = Self::list_devices()?;

        let interface = config.interface.clone().unwrap_or_else(|| {
            available_devices
                .first()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "any".to_string())
        });

        if !available_devices.iter().any(|d| d.name == interface) && interface != "any" {
            let device_names: Vec<String> = available_devices.iter().map(|d| d.name.clone()).collect();
            return Err(CaptureError::InterfaceNotFound(interface, device_names));
        }

        info!("Opening capture on interface {}", interface);

        let device = Device::from(interface.as_str());
        let mut capture = Capture::from_device(device)
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .open()
            .map_err(|e| {
                warn!("Failed to open capture device {}: {}", interface, e);
                CaptureError::InsufficientPrivileges
            })?;

        if let Some(filter) = &config.filter {
            capture
                .filter(filter, true)
                .map_err(|e| CaptureError::Capture(format!("invalid capture filter '{}': {}", filter, e)))?;
            info!("Capture filter applied: {}", filter);
        }

        Ok(Self {
            capture,
            interface,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn list_devices() -> Result<Vec<Device>, CaptureError> {
        Device::list().map_err(|e| CaptureError::Device(format!("Failed to list devices: {}", e)))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Flag shared with the capture loop; store `false` to stop it.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(mut self, adapter: IngestionAdapter) -> Result<SourceStats, CaptureError> {
        let mut stats = SourceStats::default();

        while self.running.load(Ordering::Relaxed) {
            match self.capture.next_packet() {
                Ok(packet) => {
                    let ts = packet.header.ts;
                    let timestamp = ts.tv_sec as f64 + ts.tv_usec as f64 / 1_000_000.0;
                    adapter.on_packet(decode_frame(packet.data, timestamp));
                    stats.delivered += 1;
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => return Err(CaptureError::Capture(e.to_string())),
            }
        }

        debug!("capture on {} stopped after {} packets", self.interface, stats.delivered);
        Ok(stats)
    }

    pub fn spawn(self, adapter: IngestionAdapter) -> Result<JoinHandle<Result<SourceStats, CaptureError>>, CaptureError> {
        thread::Builder::new()
            .name(format!("capture-{}", self.interface))
            .spawn(move || self.run(adapter))
            .map_err(CaptureError::from)
    }
}
