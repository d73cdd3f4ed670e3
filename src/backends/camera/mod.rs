// SPDX-License-Identifier: GPL-3.0-only

//! Camera session abstraction
//!
//! A camera session owns the physical camera and writes frames into a
//! [`CameraTexture`]. The pipeline only talks to it through the
//! [`CameraSession`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ PipelineCoordinator │  ← start once, geometry queries
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraSession Trait │  ← Common interface
//! └──────────┬──────────┘
//!            │ frames (camera thread)
//!            ▼
//! ┌─────────────────────┐
//! │    CameraTexture    │  ← slot the texture converter attaches to
//! └─────────────────────┘
//! ```

pub mod frame_loop;
pub mod synthetic;
pub mod texture;
pub mod types;

pub use synthetic::SyntheticCamera;
pub use texture::{CameraTexture, FrameSink};
pub use types::*;

/// One-shot notification fired with the camera's texture once the first
/// frame is available
pub type FirstFrameCallback = Box<dyn FnOnce(CameraTexture) + Send>;

/// One-shot notification fired when the camera fails to come up after
/// `start` already returned
pub type StartFailedCallback = Box<dyn FnOnce(BackendError) + Send>;

/// Creates a camera session on demand, once permission is confirmed
pub type CameraFactory = Box<dyn FnMut() -> Box<dyn CameraSession>>;

/// Camera session interface
///
/// Callbacks must be registered before [`CameraSession::start`]; they may be
/// invoked from the camera's own delivery thread.
pub trait CameraSession: Send {
    /// Open the camera with the given facing and optional capture resolution
    ///
    /// `None` lets the session pick its native resolution. A session starts
    /// at most once.
    fn start(&mut self, facing: CameraFacing, target_resolution: Option<Size>)
    -> BackendResult<()>;

    /// Register the first-frame notification
    fn on_first_frame(&mut self, callback: FirstFrameCallback);

    /// Register the asynchronous start-failure notification
    fn on_start_failed(&mut self, callback: StartFailedCallback);

    /// Map a view size to a display size with the camera's native aspect
    /// ratio, expressed in sensor orientation
    fn compute_display_size(&self, view_size: Size) -> Size;

    /// Whether the sensor is mounted perpendicular to the device's natural
    /// orientation
    fn is_rotated(&self) -> bool;

    /// Sensor mounting rotation
    fn sensor_rotation(&self) -> SensorRotation {
        if self.is_rotated() {
            SensorRotation::Rotate90
        } else {
            SensorRotation::None
        }
    }

    fn state(&self) -> CameraSessionState;

    /// Stop delivering frames and release the camera
    fn stop(&mut self);
}

/// Fit `frame` (sensor orientation) into `view` (device orientation) keeping
/// the aspect ratio, and return the result in sensor orientation again
pub fn fit_display_size(frame: Size, view: Size, rotated: bool) -> Size {
    if frame.is_empty() || view.is_empty() {
        return Size::default();
    }

    let oriented = if rotated { frame.swapped() } else { frame };
    let scale = (view.width as f64 / oriented.width as f64)
        .min(view.height as f64 / oriented.height as f64);
    let fitted = Size::new(
        (oriented.width as f64 * scale).round() as u32,
        (oriented.height as f64 * scale).round() as u32,
    );

    if rotated { fitted.swapped() } else { fitted }
}
