//! Channel conversion: raw sub-frame data into an exactly sized frame buffer.
//!
//! Raw re-packaging only: color is copied as BGRA, infrared and depth as
//! 16-bit samples. No scaling or normalization.

use crate::channel::ChannelKind;
use crate::device::{DeviceError, SubFrame};
use crate::frame::{FrameBuffer, FrameError, PixelFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("sub-frame is {actual}, converter expects {expected}")]
    ChannelMismatch {
        expected: ChannelKind,
        actual: ChannelKind,
    },
    #[error("could not read frame description: {0}")]
    Describe(#[source] DeviceError),
    #[error("frame has empty dimensions {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame buffer allocation failed: {0}")]
    Buffer(#[from] FrameError),
    #[error("frame copy failed: {0}")]
    Copy(#[source] DeviceError),
    #[error("frame copy size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Converter for one channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConverter {
    kind: ChannelKind,
}

impl ChannelConverter {
    pub fn for_kind(kind: ChannelKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn target_format(&self) -> PixelFormat {
        self.kind.target_format()
    }

    /// Copy `frame` into a new buffer of exactly `width * height * bpp` bytes.
    pub fn convert<F: SubFrame + ?Sized>(&self, frame: &F) -> Result<FrameBuffer, ConvertError> {
        if frame.kind() != self.kind {
            return Err(ConvertError::ChannelMismatch {
                expected: self.kind,
                actual: frame.kind(),
            });
        }

        let desc = frame.description().map_err(ConvertError::Describe)?;
        if desc.width == 0 || desc.height == 0 {
            return Err(ConvertError::EmptyFrame {
                width: desc.width,
                height: desc.height,
            });
        }

        let format = self.target_format();
        let mut buffer = FrameBuffer::zeroed(desc.width, desc.height, format)?;
        let expected = buffer.len();

        let written = frame
            .copy_to(format, buffer.data_mut())
            .map_err(ConvertError::Copy)?;
        if written != expected {
            return Err(ConvertError::SizeMismatch {
                expected,
                actual: written,
            });
        }

        tracing::trace!(
            channel = %self.kind,
            width = desc.width,
            height = desc.height,
            bytes = expected,
            "converted sub-frame"
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{status, DeviceOp, FrameDescription};

    /// Hand-rolled sub-frame reporting a fixed size and copy length.
    struct StubFrame {
        kind: ChannelKind,
        width: u32,
        height: u32,
        /// Bytes the copy reports; `None` fills the whole destination.
        copy_len: Option<usize>,
        fill: u8,
    }

    impl SubFrame for StubFrame {
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
            let n = self.copy_len.unwrap_or(dst.len()).min(dst.len());
            dst[..n].fill(self.fill);
            Ok(self.copy_len.unwrap_or(n))
        }
    }

    fn stub(kind: ChannelKind, width: u32, height: u32) -> StubFrame {
        StubFrame {
            kind,
            width,
            height,
            copy_len: None,
            fill: 0xAB,
        }
    }

    #[test]
    fn test_color_is_bgra_sized() {
        let buf = ChannelConverter::for_kind(ChannelKind::Color)
            .convert(&stub(ChannelKind::Color, 1920, 1080))
            .unwrap();
        assert_eq!(buf.format(), PixelFormat::Bgra8);
        assert_eq!(buf.len(), 1920 * 1080 * 4);
        assert!(buf.data().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_depth_and_infrared_are_gray16_sized() {
        for kind in [ChannelKind::Infrared, ChannelKind::Depth] {
            let buf = ChannelConverter::for_kind(kind)
                .convert(&stub(kind, 512, 424))
                .unwrap();
            assert_eq!(buf.format(), PixelFormat::Gray16);
            assert_eq!(buf.len(), 512 * 424 * 2);
            assert_eq!((buf.width(), buf.height()), (512, 424));
        }
    }

    #[test]
    fn test_short_copy_is_size_mismatch() {
        let mut frame = stub(ChannelKind::Depth, 4, 4);
        frame.copy_len = Some(16);
        let err = ChannelConverter::for_kind(ChannelKind::Depth)
            .convert(&frame)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::SizeMismatch { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn test_oversized_copy_is_size_mismatch() {
        let mut frame = stub(ChannelKind::Color, 2, 2);
        frame.copy_len = Some(64);
        let err = ChannelConverter::for_kind(ChannelKind::Color)
            .convert(&frame)
            .unwrap_err();
        assert!(matches!(err, ConvertError::SizeMismatch { expected: 16, .. }));
    }

    #[test]
    fn test_empty_dimensions_rejected() {
        let err = ChannelConverter::for_kind(ChannelKind::Infrared)
            .convert(&stub(ChannelKind::Infrared, 0, 424))
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyFrame { .. }));
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let err = ChannelConverter::for_kind(ChannelKind::Color)
            .convert(&stub(ChannelKind::Depth, 2, 2))
            .unwrap_err();
        assert!(matches!(err, ConvertError::ChannelMismatch { .. }));
    }
}
