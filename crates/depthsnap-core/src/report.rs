//! Per-channel outcomes and the aggregated capture report.

use crate::sink::SinkError;
use depthsnap_hw::{ChannelKind, ConvertError, DeviceError, PixelFormat};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Channel-local failure. Never aborts sibling channels.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[source] DeviceError),
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConvertError),
    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

impl ChannelError {
    /// Driver status code behind the failure, if the driver reported one.
    pub fn status(&self) -> Option<u32> {
        match self {
            ChannelError::Acquisition(e) => Some(e.status),
            ChannelError::Conversion(ConvertError::Describe(e) | ConvertError::Copy(e)) => {
                Some(e.status)
            }
            ChannelError::Conversion(_) | ChannelError::Sink(_) => None,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            ChannelError::Acquisition(_) => "acquisition",
            ChannelError::Conversion(_) => "conversion",
            ChannelError::Sink(_) => "sink",
        }
    }
}

/// A buffer that reached its sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFrame {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub bytes: usize,
}

#[derive(Debug)]
pub struct ChannelOutcome {
    pub kind: ChannelKind,
    pub result: Result<SavedFrame, ChannelError>,
}

impl ChannelOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ChannelError> {
        self.result.as_ref().err()
    }
}

/// Result of one `capture()` call that reached channel processing.
#[derive(Debug)]
pub struct CaptureReport {
    /// Polls spent acquiring the bundle, including the successful one.
    pub poll_attempts: u64,
    /// One entry per requested channel, in color, infrared, depth order.
    pub outcomes: Vec<ChannelOutcome>,
}

impl CaptureReport {
    /// True only if every requested channel succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(ChannelOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn outcome(&self, kind: ChannelKind) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            succeeded: self.succeeded(),
            poll_attempts: self.poll_attempts,
            channels: self
                .outcomes
                .iter()
                .map(|o| match &o.result {
                    Ok(saved) => ChannelSummary {
                        channel: o.kind,
                        saved: Some(saved.clone()),
                        stage: None,
                        status: None,
                        error: None,
                    },
                    Err(e) => ChannelSummary {
                        channel: o.kind,
                        saved: None,
                        stage: Some(e.stage()),
                        status: e.status().map(|s| format!("{s:#010X}")),
                        error: Some(e.to_string()),
                    },
                })
                .collect(),
        }
    }
}

/// Serializable form of a [`CaptureReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub succeeded: bool,
    pub poll_attempts: u64,
    pub channels: Vec<ChannelSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SavedFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
