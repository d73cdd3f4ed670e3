// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration resolved from host metadata
//!
//! Metadata is a flat JSON object, read once at startup. Keys not listed in
//! [`crate::constants::keys`] are ignored so hosts can keep unrelated entries
//! in the same document.

use crate::backends::camera::{CameraFacing, Size};
use crate::constants::{DEFAULT_FLIP_FRAMES_VERTICALLY, DEFAULT_LANDMARKS_CHANNEL, keys};
use crate::errors::ConfigError;
use crate::graph::GraphSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw metadata as the host provides it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostMetadata {
    graph_id: Option<String>,
    input_stream_name: Option<String>,
    output_stream_name: Option<String>,
    flip_frames_vertically: Option<bool>,
    converter_flip_frames_vertically: Option<bool>,
    camera_facing_front: Option<bool>,
    camera_target_resolution: Option<Size>,
    verbose_diagnostics: Option<bool>,
    landmarks_channel_name: Option<String>,
}

/// Immutable pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Processing graph to load
    pub graph_id: String,
    /// Graph stream fed with camera textures
    pub input_stream_name: String,
    /// Graph stream rendered to the display surface
    pub output_stream_name: String,
    /// Flip the graph's output vertically
    pub flip_frames_vertically: bool,
    /// Flip frames vertically while converting camera frames
    pub converter_flip_frames_vertically: bool,
    pub camera_facing: CameraFacing,
    /// Capture resolution request; `None` lets the camera decide
    pub target_resolution: Option<Size>,
    /// Log every landmark packet
    pub verbose_diagnostics: bool,
    /// Side channel carrying landmark packets
    pub landmarks_channel: String,
}

impl PipelineConfig {
    /// Resolve the configuration from a metadata object
    pub fn from_metadata(metadata: &serde_json::Value) -> Result<Self, ConfigError> {
        if !metadata.is_object() {
            return Err(ConfigError::Parse("metadata must be a JSON object".into()));
        }
        let raw = HostMetadata::deserialize(metadata)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let metadata: serde_json::Value = serde_json::from_str(json)?;
        Self::from_metadata(&metadata)
    }

    /// Read and resolve a metadata file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading pipeline metadata");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// `<config dir>/lookandtell/metadata.json`
    pub fn default_metadata_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lookandtell").join("metadata.json"))
    }

    fn from_raw(raw: HostMetadata) -> Result<Self, ConfigError> {
        let graph_id = required(raw.graph_id, keys::GRAPH_ID)?;
        let input_stream_name = required(raw.input_stream_name, keys::INPUT_STREAM_NAME)?;
        let output_stream_name = required(raw.output_stream_name, keys::OUTPUT_STREAM_NAME)?;

        if let Some(size) = raw.camera_target_resolution
            && size.is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: keys::CAMERA_TARGET_RESOLUTION,
                reason: format!("{} has a zero dimension", size),
            });
        }

        let landmarks_channel = match raw.landmarks_channel_name {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::EmptyValue(keys::LANDMARKS_CHANNEL_NAME));
            }
            Some(name) => name,
            None => DEFAULT_LANDMARKS_CHANNEL.to_string(),
        };

        let flip_frames_vertically = raw
            .flip_frames_vertically
            .unwrap_or(DEFAULT_FLIP_FRAMES_VERTICALLY);

        Ok(Self {
            graph_id,
            input_stream_name,
            output_stream_name,
            flip_frames_vertically,
            converter_flip_frames_vertically: raw
                .converter_flip_frames_vertically
                .unwrap_or(flip_frames_vertically),
            camera_facing: CameraFacing::from_front_flag(raw.camera_facing_front),
            target_resolution: raw.camera_target_resolution,
            verbose_diagnostics: raw.verbose_diagnostics.unwrap_or(false),
            landmarks_channel,
        })
    }

    /// Identifiers the processing graph is constructed with
    pub fn graph_spec(&self) -> GraphSpec {
        GraphSpec::new(
            self.graph_id.clone(),
            self.input_stream_name.clone(),
            self.output_stream_name.clone(),
        )
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        None => Err(ConfigError::MissingKey(key)),
        Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Some(v) => Ok(v),
    }
}
