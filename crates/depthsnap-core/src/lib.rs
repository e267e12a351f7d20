//! depthsnap-core: Synchronized still capture from multi-channel depth cameras.
//!
//! Polls the sensor for a synchronized bundle, takes every requested
//! channel's sub-frame from it at once, then converts and persists each
//! channel independently so one channel's failure never blocks another.

pub mod acquirer;
pub mod config;
pub mod processor;
pub mod report;
pub mod session;
pub mod sink;

#[cfg(test)]
mod testing;

pub use acquirer::{AcquireError, AcquirePolicy, BundleAcquirer};
pub use config::{CaptureConfig, ConfigError};
pub use processor::{ChannelHandles, ChannelProcessor};
pub use report::{CaptureReport, ChannelError, ChannelOutcome, ReportSummary, SavedFrame};
pub use session::{CaptureError, CaptureSession, SessionState};
pub use sink::{ImageFileSink, ImageSink, SinkError};
