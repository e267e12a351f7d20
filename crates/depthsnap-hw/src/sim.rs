//! Simulated sensor backend.
//!
//! Implements the full driver boundary in memory: bundles become ready after
//! a configurable number of polls, sub-frames carry synthetic pixel patterns,
//! and per-channel faults can be injected at the reference, acquire and copy
//! stages. Every handle records its acquisition and release in a shared
//! [`HandleLedger`].

use crate::channel::{ChannelKind, ChannelSelection};
use crate::device::{
    status, Bundle, DeviceError, DeviceOp, DeviceSession, FrameDescription, FrameReader, SubFrame,
    SubFrameReference,
};
use crate::frame::{buffer_len, PixelFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Handle types tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Reader,
    Bundle,
    Reference,
    SubFrame,
}

impl HandleKind {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            HandleKind::Reader => 0,
            HandleKind::Bundle => 1,
            HandleKind::Reference => 2,
            HandleKind::SubFrame => 3,
        }
    }
}

/// Acquire/release counters shared by every handle of one simulated device.
#[derive(Debug, Default)]
pub struct HandleLedger {
    acquired: [AtomicUsize; HandleKind::COUNT],
    released: [AtomicUsize; HandleKind::COUNT],
    polls: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl HandleLedger {
    fn acquire(&self, kind: HandleKind) {
        self.acquired[kind.index()].fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, kind: HandleKind) {
        self.released[kind.index()].fetch_add(1, Ordering::SeqCst);
    }

    pub fn acquired(&self, kind: HandleKind) -> usize {
        self.acquired[kind.index()].load(Ordering::SeqCst)
    }

    pub fn released(&self, kind: HandleKind) -> usize {
        self.released[kind.index()].load(Ordering::SeqCst)
    }

    /// Handles of `kind` acquired but not yet released.
    pub fn live(&self, kind: HandleKind) -> usize {
        self.acquired(kind) - self.released(kind)
    }

    /// Transient handles (bundles, references, sub-frames) still held.
    pub fn outstanding(&self) -> usize {
        [HandleKind::Bundle, HandleKind::Reference, HandleKind::SubFrame]
            .into_iter()
            .map(|k| self.live(k))
            .sum()
    }

    /// Total bundle polls across all readers.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Behaviour of a simulated device.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// A bundle becomes ready on this poll (1 = first poll).
    pub ready_after_polls: u32,
    /// Reported by `is_available` once the device is open.
    pub available: bool,
    /// Status returned by `open`, if it should fail.
    pub open_fault: Option<u32>,
    /// Status returned by `open_reader`, if it should fail.
    pub reader_fault: Option<u32>,
    pub color_size: (u32, u32),
    pub infrared_size: (u32, u32),
    pub depth_size: (u32, u32),
    /// Channels whose sub-frame reference cannot be obtained.
    pub reference_faults: ChannelSelection,
    /// Channels whose sub-frame cannot be materialized.
    pub frame_faults: ChannelSelection,
    /// Channels whose copy writes only half the requested bytes.
    pub short_copies: ChannelSelection,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ready_after_polls: 1,
            available: true,
            open_fault: None,
            reader_fault: None,
            color_size: (1920, 1080),
            infrared_size: (512, 424),
            depth_size: (512, 424),
            reference_faults: ChannelSelection::NONE,
            frame_faults: ChannelSelection::NONE,
            short_copies: ChannelSelection::NONE,
        }
    }
}

impl SimConfig {
    fn size_of(&self, kind: ChannelKind) -> (u32, u32) {
        match kind {
            ChannelKind::Color => self.color_size,
            ChannelKind::Infrared => self.infrared_size,
            ChannelKind::Depth => self.depth_size,
        }
    }
}

/// In-memory stand-in for a physical depth-camera rig.
pub struct SimulatedDevice {
    config: Arc<SimConfig>,
    ledger: Arc<HandleLedger>,
    opened: bool,
}

impl SimulatedDevice {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config: Arc::new(config),
            ledger: Arc::new(HandleLedger::default()),
            opened: false,
        }
    }

    /// Shared counters; stays valid after the device is dropped.
    pub fn ledger(&self) -> Arc<HandleLedger> {
        Arc::clone(&self.ledger)
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl DeviceSession for SimulatedDevice {
    type Reader = SimReader;

    fn open(&mut self) -> Result<(), DeviceError> {
        self.ledger.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.config.open_fault {
            return Err(DeviceError::new(DeviceOp::Open, code));
        }
        self.opened = true;
        tracing::debug!("simulated sensor opened");
        Ok(())
    }

    fn close(&mut self) {
        self.ledger.closes.fetch_add(1, Ordering::SeqCst);
        self.opened = false;
        tracing::debug!("simulated sensor closed");
    }

    fn is_available(&self) -> bool {
        self.opened && self.config.available
    }

    fn open_reader(&mut self, channels: ChannelSelection) -> Result<SimReader, DeviceError> {
        if !self.opened {
            return Err(DeviceError::new(DeviceOp::OpenReader, status::E_NOT_VALID_STATE));
        }
        if channels.is_empty() {
            return Err(DeviceError::new(DeviceOp::OpenReader, status::E_INVALIDARG));
        }
        if let Some(code) = self.config.reader_fault {
            return Err(DeviceError::new(DeviceOp::OpenReader, code));
        }
        self.ledger.acquire(HandleKind::Reader);
        Ok(SimReader {
            config: Arc::clone(&self.config),
            ledger: Arc::clone(&self.ledger),
            channels,
            pending_polls: 0,
            sequence: 0,
        })
    }
}

pub struct SimReader {
    config: Arc<SimConfig>,
    ledger: Arc<HandleLedger>,
    channels: ChannelSelection,
    pending_polls: u32,
    sequence: u32,
}

impl FrameReader for SimReader {
    type Bundle = SimBundle;

    fn acquire_latest(&mut self) -> Result<SimBundle, DeviceError> {
        self.ledger.polls.fetch_add(1, Ordering::SeqCst);
        self.pending_polls += 1;
        if self.pending_polls < self.config.ready_after_polls.max(1) {
            return Err(DeviceError::new(DeviceOp::Poll, status::E_PENDING));
        }
        self.pending_polls = 0;
        self.sequence = self.sequence.wrapping_add(1);
        self.ledger.acquire(HandleKind::Bundle);
        Ok(SimBundle {
            config: Arc::clone(&self.config),
            ledger: Arc::clone(&self.ledger),
            channels: self.channels,
            sequence: self.sequence,
        })
    }
}

impl Drop for SimReader {
    fn drop(&mut self) {
        self.ledger.release(HandleKind::Reader);
    }
}

pub struct SimBundle {
    config: Arc<SimConfig>,
    ledger: Arc<HandleLedger>,
    channels: ChannelSelection,
    sequence: u32,
}

impl SimBundle {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl Bundle for SimBundle {
    type Reference = SimReference;

    fn reference(&self, kind: ChannelKind) -> Result<SimReference, DeviceError> {
        if !self.channels.contains(kind) || self.config.reference_faults.contains(kind) {
            return Err(DeviceError::new(DeviceOp::Reference, status::E_FAIL));
        }
        self.ledger.acquire(HandleKind::Reference);
        Ok(SimReference {
            config: Arc::clone(&self.config),
            ledger: Arc::clone(&self.ledger),
            kind,
            sequence: self.sequence,
        })
    }
}

impl Drop for SimBundle {
    fn drop(&mut self) {
        self.ledger.release(HandleKind::Bundle);
    }
}

pub struct SimReference {
    config: Arc<SimConfig>,
    ledger: Arc<HandleLedger>,
    kind: ChannelKind,
    sequence: u32,
}

impl SubFrameReference for SimReference {
    type Frame = SimFrame;

    fn acquire_frame(&self) -> Result<SimFrame, DeviceError> {
        if self.config.frame_faults.contains(self.kind) {
            return Err(DeviceError::new(DeviceOp::AcquireFrame, status::E_PENDING));
        }
        self.ledger.acquire(HandleKind::SubFrame);
        let (width, height) = self.config.size_of(self.kind);
        Ok(SimFrame {
            ledger: Arc::clone(&self.ledger),
            kind: self.kind,
            width,
            height,
            sequence: self.sequence,
            short_copy: self.config.short_copies.contains(self.kind),
        })
    }
}

impl Drop for SimReference {
    fn drop(&mut self) {
        self.ledger.release(HandleKind::Reference);
    }
}

pub struct SimFrame {
    ledger: Arc<HandleLedger>,
    kind: ChannelKind,
    width: u32,
    height: u32,
    sequence: u32,
    short_copy: bool,
}

impl SimFrame {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    fn fill(&self, dst: &mut [u8]) {
        let width = self.width.max(1) as usize;
        let seq = self.sequence as usize;
        match self.kind {
            ChannelKind::Color => {
                for (i, px) in dst.chunks_exact_mut(4).enumerate() {
                    let (x, y) = (i % width, i / width);
                    px.copy_from_slice(&[x as u8, y as u8, seq as u8, 0xFF]);
                }
            }
            ChannelKind::Infrared => {
                for (i, px) in dst.chunks_exact_mut(2).enumerate() {
                    let (x, y) = (i % width, i / width);
                    let value = ((x * y + seq) & 0xFFFF) as u16;
                    px.copy_from_slice(&value.to_le_bytes());
                }
            }
            ChannelKind::Depth => {
                for (i, px) in dst.chunks_exact_mut(2).enumerate() {
                    let (x, y) = (i % width, i / width);
                    // Millimetres in the sensor's 0.5 m to 4.5 m working range.
                    let value = (500 + (x + y + seq) % 4000) as u16;
                    px.copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}

impl SubFrame for SimFrame {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn description(&self) -> Result<FrameDescription, DeviceError> {
        Ok(FrameDescription {
            width: self.width,
            height: self.height,
        })
    }

    fn copy_to(&self, format: PixelFormat, dst: &mut [u8]) -> Result<usize, DeviceError> {
        if format != self.kind.target_format() {
            return Err(DeviceError::new(DeviceOp::CopyFrame, status::E_INVALIDARG));
        }
        let expected = buffer_len(self.width, self.height, format)
            .ok_or(DeviceError::new(DeviceOp::CopyFrame, status::E_INVALIDARG))?;
        if dst.len() != expected {
            return Err(DeviceError::new(DeviceOp::CopyFrame, status::E_INVALIDARG));
        }
        if self.short_copy {
            let half = expected / 2;
            self.fill(&mut dst[..half]);
            return Ok(half);
        }
        self.fill(dst);
        Ok(expected)
    }
}

impl Drop for SimFrame {
    fn drop(&mut self) {
        self.ledger.release(HandleKind::SubFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_reader(config: SimConfig) -> (SimulatedDevice, SimReader) {
        let mut device = SimulatedDevice::new(config);
        device.open().unwrap();
        let reader = device.open_reader(ChannelSelection::ALL).unwrap();
        (device, reader)
    }

    #[test]
    fn test_bundle_ready_after_configured_polls() {
        let (device, mut reader) = open_reader(SimConfig {
            ready_after_polls: 3,
            ..SimConfig::default()
        });
        assert!(reader.acquire_latest().is_err());
        assert!(reader.acquire_latest().is_err());
        let bundle = reader.acquire_latest().unwrap();
        assert_eq!(bundle.sequence(), 1);
        assert_eq!(device.ledger().polls(), 3);
    }

    #[test]
    fn test_handles_released_on_drop() {
        let (device, mut reader) = open_reader(SimConfig::default());
        let ledger = device.ledger();
        {
            let bundle = reader.acquire_latest().unwrap();
            let reference = bundle.reference(ChannelKind::Depth).unwrap();
            let _frame = reference.acquire_frame().unwrap();
            assert_eq!(ledger.outstanding(), 3);
        }
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.acquired(HandleKind::SubFrame), 1);
        assert_eq!(ledger.released(HandleKind::SubFrame), 1);
    }

    #[test]
    fn test_reference_fault_injection() {
        let (_device, mut reader) = open_reader(SimConfig {
            reference_faults: ChannelSelection::from_flags(false, true, false),
            ..SimConfig::default()
        });
        let bundle = reader.acquire_latest().unwrap();
        let err = bundle.reference(ChannelKind::Infrared).err().unwrap();
        assert_eq!(err.op, DeviceOp::Reference);
        assert!(bundle.reference(ChannelKind::Color).is_ok());
    }

    #[test]
    fn test_unselected_channel_has_no_reference() {
        let mut device = SimulatedDevice::default();
        device.open().unwrap();
        let mut reader = device
            .open_reader(ChannelSelection::from_flags(true, false, false))
            .unwrap();
        let bundle = reader.acquire_latest().unwrap();
        assert!(bundle.reference(ChannelKind::Depth).is_err());
    }

    #[test]
    fn test_copy_rejects_wrong_capacity() {
        let (_device, mut reader) = open_reader(SimConfig {
            depth_size: (4, 4),
            ..SimConfig::default()
        });
        let bundle = reader.acquire_latest().unwrap();
        let frame = bundle.reference(ChannelKind::Depth).unwrap().acquire_frame().unwrap();
        let mut dst = vec![0u8; 31];
        assert!(frame.copy_to(PixelFormat::Gray16, &mut dst).is_err());
        let mut dst = vec![0u8; 32];
        assert!(frame.copy_to(PixelFormat::Bgra8, &mut dst).is_err());
        assert_eq!(frame.copy_to(PixelFormat::Gray16, &mut dst).unwrap(), 32);
    }

    #[test]
    fn test_reader_requires_open_device() {
        let mut device = SimulatedDevice::default();
        let err = device.open_reader(ChannelSelection::ALL).err().unwrap();
        assert_eq!(err.status, status::E_NOT_VALID_STATE);
    }

    #[test]
    fn test_availability_follows_open_state() {
        let mut device = SimulatedDevice::default();
        assert!(!device.is_available());
        device.open().unwrap();
        assert!(device.is_available());
        device.close();
        assert!(!device.is_available());
        assert_eq!(device.ledger().closes(), 1);
    }
}
