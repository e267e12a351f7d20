//! Per-channel processing: convert an acquired sub-frame and hand it to the sink.

use crate::report::{ChannelError, ChannelOutcome, SavedFrame};
use crate::sink::ImageSink;
use depthsnap_hw::{Bundle, ChannelConverter, ChannelKind, DeviceError, SubFrameReference};
use std::path::{Path, PathBuf};

/// A channel's sub-frame and the reference it was materialized from.
///
/// Dropping releases the sub-frame first, then the reference.
pub struct ChannelHandles<R: SubFrameReference> {
    frame: R::Frame,
    _reference: R,
}

impl<R: SubFrameReference> ChannelHandles<R> {
    /// Request `kind`'s reference from `bundle` and materialize its sub-frame.
    ///
    /// A reference whose sub-frame cannot be materialized is released before
    /// the error is returned.
    pub fn acquire<B>(bundle: &B, kind: ChannelKind) -> Result<Self, DeviceError>
    where
        B: Bundle<Reference = R>,
    {
        let reference = bundle.reference(kind)?;
        let frame = reference.acquire_frame()?;
        Ok(Self {
            frame,
            _reference: reference,
        })
    }

    pub fn frame(&self) -> &R::Frame {
        &self.frame
    }
}

/// Converts and persists exactly one channel kind.
#[derive(Debug, Clone)]
pub struct ChannelProcessor {
    converter: ChannelConverter,
    destination: PathBuf,
}

impl ChannelProcessor {
    pub fn new(kind: ChannelKind, destination: impl Into<PathBuf>) -> Self {
        Self {
            converter: ChannelConverter::for_kind(kind),
            destination: destination.into(),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.converter.kind()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Convert the acquired sub-frame and write it to the sink.
    ///
    /// Consumes the handles; they are released before this returns on every
    /// path. Failures are reported in the outcome, never propagated.
    pub fn process<R, S>(
        &self,
        acquired: Result<ChannelHandles<R>, DeviceError>,
        sink: &mut S,
    ) -> ChannelOutcome
    where
        R: SubFrameReference,
        S: ImageSink + ?Sized,
    {
        let kind = self.kind();
        let result = self.run(acquired, sink);
        match &result {
            Ok(saved) => tracing::info!(
                channel = %kind,
                path = %saved.path.display(),
                width = saved.width,
                height = saved.height,
                "frame saved"
            ),
            Err(err) => match err.status() {
                Some(status) => tracing::error!(
                    channel = %kind,
                    stage = err.stage(),
                    status = format_args!("{status:#010X}"),
                    error = %err,
                    "channel capture failed"
                ),
                None => tracing::error!(
                    channel = %kind,
                    stage = err.stage(),
                    error = %err,
                    "channel capture failed"
                ),
            },
        }
        ChannelOutcome { kind, result }
    }

    fn run<R, S>(
        &self,
        acquired: Result<ChannelHandles<R>, DeviceError>,
        sink: &mut S,
    ) -> Result<SavedFrame, ChannelError>
    where
        R: SubFrameReference,
        S: ImageSink + ?Sized,
    {
        let handles = acquired.map_err(ChannelError::Acquisition)?;
        let converted = self.converter.convert(handles.frame());
        // The pixels are copied out; release the driver handles before the
        // slow encode.
        drop(handles);
        let buffer = converted?;

        let saved = SavedFrame {
            path: self.destination.clone(),
            width: buffer.width(),
            height: buffer.height(),
            format: buffer.format(),
            bytes: buffer.len(),
        };
        sink.write(buffer, &self.destination)?;
        Ok(saved)
    }
}
