//! Frame buffer type: owned, tightly packed pixel data for one channel.

use serde::{Deserialize, Serialize};

/// Pixel layout of a converted frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha (4 bytes/pixel).
    Bgra8,
    /// 16-bit little-endian unsigned single channel (2 bytes/pixel).
    Gray16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Gray16 => 2,
        }
    }
}

/// Exact byte length of a `width` x `height` buffer in `format`.
///
/// Returns `None` on arithmetic overflow.
pub fn buffer_len(width: u32, height: u32, format: PixelFormat) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(format.bytes_per_pixel())
}

/// A converted pixel buffer for one channel.
///
/// `data.len()` always equals `width * height * bytes_per_pixel(format)`;
/// there is no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap existing pixel data, checking its length against the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let expected =
            buffer_len(width, height, format).ok_or(FrameError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Allocate a zero-filled buffer of the exact size.
    pub fn zeroed(width: u32, height: u32, format: PixelFormat) -> Result<Self, FrameError> {
        let len = buffer_len(width, height, format).ok_or(FrameError::TooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            format,
            data: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the pixel bytes. The length cannot change.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode a `Gray16` buffer into native 16-bit samples.
    pub fn gray16_samples(&self) -> Result<Vec<u16>, FrameError> {
        if self.format != PixelFormat::Gray16 {
            return Err(FrameError::WrongFormat {
                expected: PixelFormat::Gray16,
                actual: self.format,
            });
        }
        Ok(self
            .data
            .chunks_exact(2)
            .map(|px| u16::from_le_bytes([px[0], px[1]]))
            .collect())
    }

    /// Reorder a `Bgra8` buffer into RGBA byte order.
    pub fn bgra_to_rgba(&self) -> Result<Vec<u8>, FrameError> {
        if self.format != PixelFormat::Bgra8 {
            return Err(FrameError::WrongFormat {
                expected: PixelFormat::Bgra8,
                actual: self.format,
            });
        }
        let mut rgba = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        Ok(rgba)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame dimensions {width}x{height} overflow the address space")]
    TooLarge { width: u32, height: u32 },
    #[error("wrong pixel format: expected {expected:?}, got {actual:?}")]
    WrongFormat {
        expected: PixelFormat,
        actual: PixelFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_exact_size() {
        let buf = FrameBuffer::zeroed(1920, 1080, PixelFormat::Bgra8).unwrap();
        assert_eq!(buf.len(), 1920 * 1080 * 4);
        let buf = FrameBuffer::zeroed(512, 424, PixelFormat::Gray16).unwrap();
        assert_eq!(buf.len(), 512 * 424 * 2);
    }

    #[test]
    fn test_new_rejects_short_data() {
        let result = FrameBuffer::new(2, 2, PixelFormat::Gray16, vec![0u8; 7]);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn test_new_rejects_padded_data() {
        let result = FrameBuffer::new(2, 1, PixelFormat::Bgra8, vec![0u8; 12]);
        assert!(result.is_err());
    }

    #[test]
    fn test_gray16_samples_little_endian() {
        let data = vec![0x34, 0x12, 0xff, 0x00];
        let buf = FrameBuffer::new(2, 1, PixelFormat::Gray16, data).unwrap();
        assert_eq!(buf.gray16_samples().unwrap(), vec![0x1234, 0x00ff]);
    }

    #[test]
    fn test_bgra_to_rgba() {
        let buf = FrameBuffer::new(1, 1, PixelFormat::Bgra8, vec![10, 20, 30, 255]).unwrap();
        assert_eq!(buf.bgra_to_rgba().unwrap(), vec![30, 20, 10, 255]);
    }

    #[test]
    fn test_format_mismatch() {
        let buf = FrameBuffer::zeroed(1, 1, PixelFormat::Bgra8).unwrap();
        assert!(buf.gray16_samples().is_err());
    }

    #[test]
    fn test_buffer_len_overflow() {
        assert!(buffer_len(u32::MAX, u32::MAX, PixelFormat::Bgra8).is_none());
    }
}
