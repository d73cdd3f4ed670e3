// SPDX-License-Identifier: GPL-3.0-only

//! GPU-side frame representation

use crate::backends::camera::Size;
use std::time::Instant;

/// Identity of one texture converter instance
///
/// Every resume creates a converter with a new id, so a frame can always be
/// traced back to the converter generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConverterId(pub u64);

impl std::fmt::Display for ConverterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One camera frame converted into a GPU texture
///
/// Produced on the GPU thread and moved into the processing graph. Not
/// `Clone`: a texture belongs to exactly one processing cycle.
#[derive(Debug)]
pub struct FrameTexture {
    /// Texture name within the GPU context
    pub name: u32,
    /// Converter that produced it
    pub converter: ConverterId,
    /// Output dimensions configured on the converter
    pub size: Size,
    /// Dimensions of the camera frame it was converted from
    pub source_size: Size,
    pub flip_y: bool,
    /// Camera delivery sequence number
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub captured_at: Instant,
}
