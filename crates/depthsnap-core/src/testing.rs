//! In-memory sink used by the unit tests.

use crate::sink::{ImageSink, SinkError};
use depthsnap_hw::FrameBuffer;
use std::path::{Path, PathBuf};

pub struct SinkWrite {
    pub buffer: FrameBuffer,
    pub path: PathBuf,
}

/// Keeps every written buffer; rejects writes to `fail_paths`.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: Vec<SinkWrite>,
    pub fail_paths: Vec<PathBuf>,
}

impl ImageSink for RecordingSink {
    fn write(&mut self, buffer: FrameBuffer, destination: &Path) -> Result<(), SinkError> {
        if self.fail_paths.iter().any(|p| p == destination) {
            return Err(SinkError::Rejected {
                path: destination.display().to_string(),
                reason: "injected failure".into(),
            });
        }
        self.writes.push(SinkWrite {
            buffer,
            path: destination.to_path_buf(),
        });
        Ok(())
    }
}
