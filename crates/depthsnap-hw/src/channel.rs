//! Sensor channel identities and channel selection masks.

use crate::frame::PixelFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sensor modality emitted by the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Color,
    Infrared,
    Depth,
}

impl ChannelKind {
    /// All channels, in processing order.
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Color,
        ChannelKind::Infrared,
        ChannelKind::Depth,
    ];

    /// Pixel format a converted buffer of this channel must have.
    pub fn target_format(self) -> PixelFormat {
        match self {
            ChannelKind::Color => PixelFormat::Bgra8,
            ChannelKind::Infrared | ChannelKind::Depth => PixelFormat::Gray16,
        }
    }

    fn bit(self) -> u8 {
        match self {
            ChannelKind::Color => 0b001,
            ChannelKind::Infrared => 0b010,
            ChannelKind::Depth => 0b100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Color => "color",
            ChannelKind::Infrared => "infrared",
            ChannelKind::Depth => "depth",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of channels requested from the device.
///
/// Fixed once a session is initialized; the device reader is opened with
/// exactly this mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelSelection(u8);

impl ChannelSelection {
    pub const NONE: ChannelSelection = ChannelSelection(0);
    pub const ALL: ChannelSelection = ChannelSelection(0b111);

    /// Build a selection from the three per-channel flags.
    pub fn from_flags(color: bool, infrared: bool, depth: bool) -> Self {
        let mut selection = Self::NONE;
        if color {
            selection.insert(ChannelKind::Color);
        }
        if infrared {
            selection.insert(ChannelKind::Infrared);
        }
        if depth {
            selection.insert(ChannelKind::Depth);
        }
        selection
    }

    pub fn insert(&mut self, kind: ChannelKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: ChannelKind) {
        self.0 &= !kind.bit();
    }

    pub fn contains(self, kind: ChannelKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Raw bit mask (color = bit 0, infrared = bit 1, depth = bit 2).
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Selected channels in processing order.
    pub fn iter(self) -> impl Iterator<Item = ChannelKind> {
        ChannelKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<ChannelKind> for ChannelSelection {
    fn from_iter<I: IntoIterator<Item = ChannelKind>>(iter: I) -> Self {
        let mut selection = Self::NONE;
        for kind in iter {
            selection.insert(kind);
        }
        selection
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(ChannelKind::as_str).collect();
        f.write_str(&names.join("+"))
    }
}
