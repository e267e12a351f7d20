//! Capture session: owns the sensor, acquires bundles and fans out to the
//! per-channel processors.

use crate::acquirer::{AcquireError, Acquired, BundleAcquirer};
use crate::config::CaptureConfig;
use crate::processor::{ChannelHandles, ChannelProcessor};
use crate::report::CaptureReport;
use crate::sink::ImageSink;
use depthsnap_hw::{ChannelSelection, DeviceError, DeviceSession};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture session is not initialized")]
    NotReady,
    #[error("sensor initialization failed: {0}")]
    Initialization(#[source] DeviceError),
    #[error("sensor initialization already failed for this session")]
    InitializationFailed,
    #[error("capture session is already initialized")]
    AlreadyInitialized,
    #[error("no channels selected")]
    NoChannels,
    #[error("bundle acquisition failed: {0}")]
    Acquire(#[source] AcquireError),
    #[error("sensor not available after {0:?}")]
    Unavailable(Duration),
}

impl From<AcquireError> for CaptureError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::NotReady => CaptureError::NotReady,
            other => CaptureError::Acquire(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Capturing,
}

/// Single-owner capture session over one sensor.
///
/// Not shareable across threads; `capture` blocks the caller until the
/// device delivers a bundle (or the configured poll bound runs out).
pub struct CaptureSession<D: DeviceSession, S: ImageSink> {
    device: D,
    reader: Option<D::Reader>,
    sink: S,
    config: CaptureConfig,
    acquirer: BundleAcquirer,
    selection: ChannelSelection,
    processors: Vec<ChannelProcessor>,
    state: SessionState,
    device_open: bool,
    init_failed: bool,
}

impl<D: DeviceSession, S: ImageSink> CaptureSession<D, S> {
    pub fn new(device: D, sink: S, config: CaptureConfig) -> Self {
        Self {
            device,
            reader: None,
            sink,
            acquirer: BundleAcquirer::new(config.acquire),
            config,
            selection: ChannelSelection::NONE,
            processors: Vec::new(),
            state: SessionState::Uninitialized,
            device_open: false,
            init_failed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channels fixed at initialization (empty before).
    pub fn selection(&self) -> ChannelSelection {
        self.selection
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Open the sensor and a reader for the configured channels.
    ///
    /// Failure is terminal: the session stays uninitialized and refuses
    /// further attempts. An empty channel selection fails before the sensor
    /// is opened.
    pub fn initialize(&mut self) -> Result<(), CaptureError> {
        if self.init_failed {
            return Err(CaptureError::InitializationFailed);
        }
        if self.state != SessionState::Uninitialized {
            return Err(CaptureError::AlreadyInitialized);
        }

        let selection = self.config.selection();
        if selection.is_empty() {
            self.init_failed = true;
            tracing::error!("no channels selected, sensor left closed");
            return Err(CaptureError::NoChannels);
        }
        self.state = SessionState::Initializing;

        if let Err(err) = self.device.open() {
            return Err(self.fail_initialization(err));
        }
        self.device_open = true;

        let reader = match self.device.open_reader(selection) {
            Ok(reader) => reader,
            Err(err) => {
                self.device.close();
                self.device_open = false;
                return Err(self.fail_initialization(err));
            }
        };

        self.reader = Some(reader);
        self.selection = selection;
        self.processors = selection
            .iter()
            .map(|kind| ChannelProcessor::new(kind, self.config.output_for(kind)))
            .collect();
        self.state = SessionState::Ready;

        tracing::info!(channels = %selection, "sensor initialized");
        Ok(())
    }

    fn fail_initialization(&mut self, err: DeviceError) -> CaptureError {
        self.state = SessionState::Uninitialized;
        self.init_failed = true;
        tracing::error!(
            op = %err.op,
            status = format_args!("{:#010X}", err.status),
            "no ready sensor found"
        );
        CaptureError::Initialization(err)
    }

    /// Whether the opened sensor currently reports itself available.
    pub fn check_available(&self) -> bool {
        self.device_open && self.device.is_available()
    }

    /// Poll availability every `interval` until the sensor is available.
    ///
    /// Returns the number of unavailable checks. With `timeout` set, gives
    /// up once it has elapsed.
    pub fn wait_until_available(
        &self,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<u64, CaptureError> {
        if !self.device_open {
            return Err(CaptureError::NotReady);
        }
        let started = Instant::now();
        let mut checks = 0u64;
        while !self.device.is_available() {
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(CaptureError::Unavailable(limit));
                }
            }
            checks += 1;
            std::thread::sleep(interval);
        }
        tracing::debug!(checks, "sensor available");
        Ok(checks)
    }

    /// Capture one synchronized still of every selected channel.
    ///
    /// Returns `Err` only for faults that prevent channel work (not ready,
    /// bounded acquisition exhausted). Per-channel failures are in the
    /// report; check [`CaptureReport::succeeded`].
    pub fn capture(&mut self) -> Result<CaptureReport, CaptureError> {
        if self.state != SessionState::Ready {
            tracing::error!(state = ?self.state, "sensor did not initialize correctly");
            return Err(CaptureError::NotReady);
        }

        self.state = SessionState::Capturing;
        let result = self.capture_bundle();
        self.state = SessionState::Ready;
        result
    }

    fn capture_bundle(&mut self) -> Result<CaptureReport, CaptureError> {
        let Acquired { bundle, attempts } = self.acquirer.acquire(self.reader.as_mut())?;

        // Take every channel's handles right away; references degrade while
        // the bundle is held. Conversion happens afterwards.
        let acquired: Vec<_> = self
            .processors
            .iter()
            .map(|processor| ChannelHandles::acquire(&bundle, processor.kind()))
            .collect();

        let mut outcomes = Vec::with_capacity(acquired.len());
        for (processor, handles) in self.processors.iter().zip(acquired) {
            outcomes.push(processor.process(handles, &mut self.sink));
        }

        drop(bundle);

        let report = CaptureReport {
            poll_attempts: attempts,
            outcomes,
        };
        if !report.succeeded() {
            tracing::warn!(
                failed = report.failures().count(),
                requested = report.outcomes.len(),
                "capture incomplete"
            );
        }
        Ok(report)
    }
}

impl<D: DeviceSession, S: ImageSink> Drop for CaptureSession<D, S> {
    fn drop(&mut self) {
        self.reader = None;
        if self.device_open {
            self.device.close();
            self.device_open = false;
        }
    }
}
