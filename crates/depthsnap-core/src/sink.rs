//! Image sinks: persist converted frame buffers.

use depthsnap_hw::{FrameBuffer, FrameError, PixelFormat};
use image::{DynamicImage, ImageBuffer, Luma, RgbaImage};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("buffer does not match its pixel format: {0}")]
    Frame(#[from] FrameError),
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink rejected {path}: {reason}")]
    Rejected { path: String, reason: String },
}

/// Destination for converted buffers. Takes ownership of each buffer.
pub trait ImageSink {
    fn write(&mut self, buffer: FrameBuffer, destination: &Path) -> Result<(), SinkError>;
}

/// Encodes buffers with the `image` crate; the container is chosen from the
/// destination's extension.
#[derive(Debug, Clone, Default)]
pub struct ImageFileSink {
    create_dirs: bool,
}

impl ImageFileSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create missing parent directories before writing.
    pub fn create_dirs(mut self, enabled: bool) -> Self {
        self.create_dirs = enabled;
        self
    }
}

impl ImageSink for ImageFileSink {
    fn write(&mut self, buffer: FrameBuffer, destination: &Path) -> Result<(), SinkError> {
        if self.create_dirs {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        let image = to_dynamic_image(&buffer)?;
        image.save(destination)?;
        Ok(())
    }
}

/// Wrap a frame buffer in an encodable image.
///
/// BGRA is reordered to RGBA here since encoders have no BGRA layout.
pub fn to_dynamic_image(buffer: &FrameBuffer) -> Result<DynamicImage, SinkError> {
    let (width, height) = (buffer.width(), buffer.height());
    let image = match buffer.format() {
        PixelFormat::Bgra8 => {
            let rgba = buffer.bgra_to_rgba()?;
            let img =
                RgbaImage::from_raw(width, height, rgba).ok_or_else(|| layout_error(buffer))?;
            DynamicImage::ImageRgba8(img)
        }
        PixelFormat::Gray16 => {
            let samples = buffer.gray16_samples()?;
            let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, samples)
                .ok_or_else(|| layout_error(buffer))?;
            DynamicImage::ImageLuma16(img)
        }
    };
    Ok(image)
}

fn layout_error(buffer: &FrameBuffer) -> SinkError {
    let pixels = buffer.width() as usize * buffer.height() as usize;
    SinkError::Frame(FrameError::InvalidLength {
        expected: pixels * buffer.format().bytes_per_pixel(),
        actual: buffer.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray16_png_round_trip_preserves_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captures").join("depth.png");
        let data: Vec<u8> = [1000u16, 2000, 3000, 65535, 0, 42]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let buffer = FrameBuffer::new(3, 2, PixelFormat::Gray16, data).unwrap();

        ImageFileSink::new().create_dirs(true).write(buffer, &path).unwrap();

        let decoded = image::open(&path).unwrap().into_luma16();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), vec![1000, 2000, 3000, 65535, 0, 42]);
    }

    #[test]
    fn test_bgra_written_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        let buffer = FrameBuffer::new(1, 1, PixelFormat::Bgra8, vec![10, 20, 30, 255]).unwrap();

        ImageFileSink::new().write(buffer, &path).unwrap();

        let decoded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }

    #[test]
    fn test_missing_directory_is_an_error_without_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ir.png");
        let buffer = FrameBuffer::zeroed(2, 2, PixelFormat::Gray16).unwrap();

        let err = ImageFileSink::new().write(buffer, &path).unwrap_err();
        assert!(matches!(err, SinkError::Encode(_) | SinkError::Io(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_unknown_extension_fails_to_encode() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = FrameBuffer::zeroed(2, 2, PixelFormat::Gray16).unwrap();
        let err = ImageFileSink::new()
            .write(buffer, &dir.path().join("frame.unknownext"))
            .unwrap_err();
        assert!(matches!(err, SinkError::Encode(_)));
    }
}
