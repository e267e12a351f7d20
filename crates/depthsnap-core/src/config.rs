//! Capture configuration, loaded from TOML with `DEPTHSNAP_*` environment overrides.

use crate::acquirer::AcquirePolicy;
use depthsnap_hw::{ChannelKind, ChannelSelection};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which channels to request. All enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelFlags {
    pub color: bool,
    pub infrared: bool,
    pub depth: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            color: true,
            infrared: true,
            depth: true,
        }
    }
}

/// One destination per channel; used only when the channel is wanted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub color: PathBuf,
    pub infrared: PathBuf,
    pub depth: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            color: PathBuf::from("color.png"),
            infrared: PathBuf::from("infrared.png"),
            depth: PathBuf::from("depth.png"),
        }
    }
}

/// Session configuration. Fixed before initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub channels: ChannelFlags,
    pub output: OutputPaths,
    pub acquire: AcquirePolicy,
}

impl CaptureConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Apply `DEPTHSNAP_*` environment variables on top of the current values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, current: bool| lookup(key).map(|v| v != "0").unwrap_or(current);
        self.channels.color = flag("DEPTHSNAP_COLOR", self.channels.color);
        self.channels.infrared = flag("DEPTHSNAP_INFRARED", self.channels.infrared);
        self.channels.depth = flag("DEPTHSNAP_DEPTH", self.channels.depth);

        if let Some(path) = lookup("DEPTHSNAP_COLOR_OUTPUT") {
            self.output.color = PathBuf::from(path);
        }
        if let Some(path) = lookup("DEPTHSNAP_INFRARED_OUTPUT") {
            self.output.infrared = PathBuf::from(path);
        }
        if let Some(path) = lookup("DEPTHSNAP_DEPTH_OUTPUT") {
            self.output.depth = PathBuf::from(path);
        }
        if let Some(max) = lookup("DEPTHSNAP_MAX_POLLS").and_then(|v| v.parse::<u64>().ok()) {
            self.acquire.max_polls = (max > 0).then_some(max);
        }
    }

    pub fn selection(&self) -> ChannelSelection {
        let channels = &self.channels;
        ChannelSelection::from_flags(channels.color, channels.infrared, channels.depth)
    }

    pub fn output_for(&self, kind: ChannelKind) -> &Path {
        match kind {
            ChannelKind::Color => &self.output.color,
            ChannelKind::Infrared => &self.output.infrared,
            ChannelKind::Depth => &self.output.depth,
        }
    }

    pub fn set_output(&mut self, kind: ChannelKind, path: impl Into<PathBuf>) {
        let slot = match kind {
            ChannelKind::Color => &mut self.output.color,
            ChannelKind::Infrared => &mut self.output.infrared,
            ChannelKind::Depth => &mut self.output.depth,
        };
        *slot = path.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.selection(), ChannelSelection::ALL);
        assert_eq!(config.output_for(ChannelKind::Depth), Path::new("depth.png"));
        assert_eq!(config.acquire.max_polls, None);
        assert!(!config.acquire.yield_between_polls);
    }

    #[test]
    fn test_parse_full_file() {
        let config = CaptureConfig::from_toml_str(
            r#"
            [channels]
            color = true
            infrared = false
            depth = true

            [output]
            color = "shots/TestColor.png"
            depth = "shots/TestDepth.png"

            [acquire]
            max_polls = 5000
            yield_between_polls = true
            "#,
        )
        .unwrap();
        assert_eq!(config.selection(), ChannelSelection::from_flags(true, false, true));
        assert_eq!(config.output_for(ChannelKind::Color), Path::new("shots/TestColor.png"));
        assert_eq!(config.output_for(ChannelKind::Infrared), Path::new("infrared.png"));
        assert_eq!(config.acquire.max_polls, Some(5000));
        assert!(config.acquire.yield_between_polls);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(CaptureConfig::from_toml_str("").unwrap(), CaptureConfig::default());
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(CaptureConfig::from_toml_str("[channels]\ncolor = \"yes\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEPTHSNAP_INFRARED", "0"),
            ("DEPTHSNAP_DEPTH_OUTPUT", "/tmp/d.png"),
            ("DEPTHSNAP_MAX_POLLS", "10"),
        ]
        .into_iter()
        .collect();
        let mut config = CaptureConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert!(config.channels.color);
        assert!(!config.channels.infrared);
        assert_eq!(config.output_for(ChannelKind::Depth), Path::new("/tmp/d.png"));
        assert_eq!(config.acquire.max_polls, Some(10));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CaptureConfig::load(Path::new("/nonexistent/depthsnap.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
