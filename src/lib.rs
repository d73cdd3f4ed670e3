// SPDX-License-Identifier: MPL-2.0

//! Look and Tell - camera preview pipeline for a visual-processing graph
//!
//! This library wires a live camera feed into a GPU processing graph and its
//! output onto a display surface, and follows the host application's
//! lifecycle (permission, pause, resume, destroy) while doing so.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipeline`]: Lifecycle coordinator, surface geometry and landmark diagnostics
//! - [`backends`]: Camera session and permission abstractions
//! - [`gpu`]: GPU context worker and texture converters
//! - [`graph`]: Processing graph boundary and result packets
//! - [`surface`]: Display surface binding
//! - [`config`]: Host metadata handling
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = PipelineCoordinator::from_metadata(&metadata, collaborators)?;
//! pipeline.on_resume()?;
//! pipeline.on_surface_event(SurfaceEvent::Created(surface))?;
//! pipeline.on_surface_event(SurfaceEvent::Changed { format: 1, width: 1080, height: 1920 })?;
//! pipeline.dispatch_pending()?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod graph;
pub mod pipeline;
pub mod surface;

// Re-export commonly used types
pub use backends::camera::{CameraFacing, CameraSession, Size, SyntheticCamera};
pub use config::PipelineConfig;
pub use errors::{AppError, AppResult};
pub use pipeline::{Collaborators, PipelineCoordinator, PipelineState};
pub use surface::SurfaceEvent;
