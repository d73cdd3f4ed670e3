// SPDX-License-Identifier: GPL-3.0-only

//! Processing graph boundary
//!
//! The visual-processing graph is a black box: one input texture stream in,
//! one output texture stream out to the display surface, plus optional
//! result packets on named side channels. The pipeline only depends on the
//! [`ProcessingGraph`] trait.

pub mod packet;
pub mod passthrough;

pub use packet::{LandmarkList, NormalizedLandmark, ResultPacket};
pub use passthrough::{GraphStats, PassthroughGraph};

use crate::gpu::{ConverterId, FrameTexture, NativeContext};
use crate::surface::OutputSurface;
use std::sync::{Arc, Weak};

/// Identifiers the graph is constructed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSpec {
    pub graph_id: String,
    pub input_stream: String,
    pub output_stream: String,
}

impl GraphSpec {
    pub fn new(
        graph_id: impl Into<String>,
        input_stream: impl Into<String>,
        output_stream: impl Into<String>,
    ) -> Self {
        Self {
            graph_id: graph_id.into(),
            input_stream: input_stream.into(),
            output_stream: output_stream.into(),
        }
    }
}

/// The converter currently feeding the graph's input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSource {
    pub converter: ConverterId,
}

/// Side-channel packet callback; must return quickly
pub type PacketHandler = Box<dyn Fn(&ResultPacket) + Send + Sync>;

/// Builds the graph against a GPU context at pipeline creation
pub type GraphFactory =
    Box<dyn FnOnce(&GraphSpec, NativeContext) -> Result<Arc<dyn ProcessingGraph>, String>>;

/// Processing graph handle
///
/// Configuration methods are called from the host thread;
/// [`ProcessingGraph::process_frame`] is only ever called from the GPU
/// worker thread.
pub trait ProcessingGraph: Send + Sync {
    fn spec(&self) -> &GraphSpec;

    /// Bind (or with `None`, unbind) the surface processed frames are
    /// written to. A surface that has since been destroyed is skipped.
    fn bind_output_surface(&self, surface: Option<Weak<dyn OutputSurface>>);

    fn set_output_flip_vertical(&self, flip: bool);

    /// Accept frames from this converter only; frames from any earlier
    /// converter are dropped
    fn register_input_source(&self, source: InputSource);

    /// Subscribe to packets on a named side channel
    fn on_packet(&self, channel: &str, handler: PacketHandler);

    /// Input stream: process one converted frame
    fn process_frame(&self, texture: FrameTexture);
}
