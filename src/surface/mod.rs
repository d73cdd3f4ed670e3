// SPDX-License-Identifier: GPL-3.0-only

//! Display surface binding
//!
//! The presentation target belongs to the windowing system. Its buffer is
//! created, resized and destroyed independently of the pipeline, so the
//! pipeline only ever holds a [`Weak`] reference and drops it the moment
//! destruction is reported.

pub mod memory;

pub use memory::{HeadlessView, MemorySurface};

use crate::backends::camera::{SensorRotation, Size};
use crate::gpu::FrameTexture;
use std::sync::{Arc, Weak};

/// Buffer the processing graph writes processed frames into
pub trait OutputSurface: Send + Sync {
    /// Called on the GPU thread by the graph's output stage
    fn present(&self, texture: &FrameTexture, flip_vertical: bool);
}

/// The on-screen view hosting the surface
///
/// Hidden until the camera has produced its first frame.
pub trait PreviewView: Send + Sync {
    fn set_visible(&self, visible: bool);
    fn is_visible(&self) -> bool;
}

/// Lifecycle notifications from the windowing system
#[derive(Clone)]
pub enum SurfaceEvent {
    /// A new buffer exists
    Created(Weak<dyn OutputSurface>),
    /// The buffer changed format or shape
    Changed { format: i32, width: u32, height: u32 },
    /// The buffer is gone; no further writes may target it
    Destroyed,
}

impl std::fmt::Debug for SurfaceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceEvent::Created(_) => write!(f, "Created"),
            SurfaceEvent::Changed {
                format,
                width,
                height,
            } => write!(f, "Changed({}x{}, format {})", width, height, format),
            SurfaceEvent::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Shape of the bound surface as last resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceGeometry {
    pub width: u32,
    pub height: u32,
    pub rotation: SensorRotation,
}

impl SurfaceGeometry {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Back-reference to the current surface, if any
#[derive(Default)]
pub struct SurfaceBinding {
    surface: Option<Weak<dyn OutputSurface>>,
}

impl SurfaceBinding {
    pub fn bind(&mut self, surface: Weak<dyn OutputSurface>) {
        self.surface = Some(surface);
    }

    pub fn clear(&mut self) {
        self.surface = None;
    }

    /// Bound and still alive
    pub fn is_bound(&self) -> bool {
        self.upgrade().is_some()
    }

    pub fn upgrade(&self) -> Option<Arc<dyn OutputSurface>> {
        self.surface.as_ref().and_then(Weak::upgrade)
    }

    pub fn weak(&self) -> Option<Weak<dyn OutputSurface>> {
        self.surface.clone()
    }
}

impl std::fmt::Debug for SurfaceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBinding")
            .field("bound", &self.is_bound())
            .finish()
    }
}
