//! Sensor driver boundary.
//!
//! A driver exposes one device session, a multi-channel frame reader, and a
//! chain of transient handles: bundle → sub-frame reference → sub-frame.
//! Every handle type releases its driver-side resource in `Drop`, so a
//! handle is released exactly once on every exit path of the code that
//! holds it. Handles are not retained across capture calls.

use crate::channel::{ChannelKind, ChannelSelection};
use crate::frame::PixelFormat;
use std::fmt;
use thiserror::Error;

/// Driver status codes (HRESULT-style).
pub mod status {
    pub const E_FAIL: u32 = 0x8000_4005;
    pub const E_PENDING: u32 = 0x8000_000A;
    pub const E_INVALIDARG: u32 = 0x8007_0057;
    pub const E_NOT_VALID_STATE: u32 = 0x8007_139F;
}

/// Driver operation that produced a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    Open,
    OpenReader,
    Poll,
    Reference,
    AcquireFrame,
    Describe,
    CopyFrame,
}

impl fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceOp::Open => "device open",
            DeviceOp::OpenReader => "frame reader open",
            DeviceOp::Poll => "bundle poll",
            DeviceOp::Reference => "sub-frame reference",
            DeviceOp::AcquireFrame => "sub-frame acquire",
            DeviceOp::Describe => "frame description",
            DeviceOp::CopyFrame => "frame copy",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{op} failed with status {status:#010X}")]
pub struct DeviceError {
    pub op: DeviceOp,
    pub status: u32,
}

impl DeviceError {
    pub fn new(op: DeviceOp, status: u32) -> Self {
        Self { op, status }
    }
}

/// Declared dimensions of a sub-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescription {
    pub width: u32,
    pub height: u32,
}

/// An open (or openable) physical sensor.
pub trait DeviceSession {
    type Reader: FrameReader;

    fn open(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self);

    /// Whether the sensor is connected and streaming.
    fn is_available(&self) -> bool;

    /// Open a reader producing synchronized bundles for `channels`.
    fn open_reader(&mut self, channels: ChannelSelection) -> Result<Self::Reader, DeviceError>;
}

/// Source of synchronized multi-channel bundles.
pub trait FrameReader {
    type Bundle: Bundle;

    /// Non-blocking poll for the latest bundle.
    ///
    /// Returns an error when no bundle is ready. There is no blocking
    /// variant; callers poll.
    fn acquire_latest(&mut self) -> Result<Self::Bundle, DeviceError>;
}

/// One synchronized capture instant.
pub trait Bundle {
    type Reference: SubFrameReference;

    /// Reference to one channel's data. Validity degrades the longer the
    /// bundle is held.
    fn reference(&self, kind: ChannelKind) -> Result<Self::Reference, DeviceError>;
}

pub trait SubFrameReference {
    type Frame: SubFrame;

    /// Materialize the referenced sub-frame.
    fn acquire_frame(&self) -> Result<Self::Frame, DeviceError>;
}

/// Materialized per-channel frame data.
pub trait SubFrame {
    fn kind(&self) -> ChannelKind;

    fn description(&self) -> Result<FrameDescription, DeviceError>;

    /// Copy the frame's pixels into `dst` laid out as `format`.
    ///
    /// Returns the number of bytes written.
    fn copy_to(&self, format: PixelFormat, dst: &mut [u8]) -> Result<usize, DeviceError>;
}
