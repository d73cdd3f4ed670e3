// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera session
//!
//! Generates frames at a fixed rate on its own thread. Used by the headless
//! host and by tests that need a camera delivering concurrently with the
//! pipeline.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::texture::CameraTexture;
use super::types::*;
use super::{CameraSession, FirstFrameCallback, StartFailedCallback, fit_display_size};
use crate::constants::synthetic;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Camera session backed by a generated test pattern
pub struct SyntheticCamera {
    sensor_size: Size,
    rotation: SensorRotation,
    framerate: u32,
    /// Frames to deliver before the loop ends on its own (None = unbounded)
    frame_limit: Option<u64>,
    /// Simulated failure reported after `start` returned
    start_failure: Option<String>,
    resolution: Size,
    state: Arc<Mutex<CameraSessionState>>,
    texture: CameraTexture,
    first_frame: Option<FirstFrameCallback>,
    start_failed: Option<StartFailedCallback>,
    capture: Option<CaptureLoopController>,
}

impl SyntheticCamera {
    /// Landscape sensor with default rate, mounted without rotation
    pub fn new() -> Self {
        Self {
            sensor_size: Size::new(synthetic::SENSOR_WIDTH, synthetic::SENSOR_HEIGHT),
            rotation: SensorRotation::None,
            framerate: synthetic::FRAMERATE,
            frame_limit: None,
            start_failure: None,
            resolution: Size::default(),
            state: Arc::new(Mutex::new(CameraSessionState::Uninitialized)),
            texture: CameraTexture::new(),
            first_frame: None,
            start_failed: None,
            capture: None,
        }
    }

    pub fn with_sensor_size(mut self, size: Size) -> Self {
        self.sensor_size = size;
        self
    }

    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Delivery rate; 0 delivers frames as fast as the pipeline accepts them
    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Make the sensor fail while opening, after `start` has returned
    pub fn with_start_failure(mut self, reason: impl Into<String>) -> Self {
        self.start_failure = Some(reason.into());
        self
    }

    /// The texture frames are written into
    pub fn texture(&self) -> CameraTexture {
        self.texture.clone()
    }

    fn frame_interval(&self) -> Duration {
        if self.framerate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / self.framerate as f64)
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes in one RGBA frame, computed in `usize` so large resolutions
/// cannot overflow
fn pattern_len(resolution: Size) -> usize {
    (resolution.width as usize)
        .saturating_mul(resolution.height as usize)
        .saturating_mul(4)
}

/// State owned by the delivery thread
struct DeliveryState {
    pattern: Arc<[u8]>,
    resolution: Size,
    sequence: u64,
    started_at: Instant,
    first_frame: Option<FirstFrameCallback>,
}

impl CameraSession for SyntheticCamera {
    fn start(
        &mut self,
        facing: CameraFacing,
        target_resolution: Option<Size>,
    ) -> BackendResult<()> {
        if self.capture.is_some() {
            return Err(BackendError::AlreadyStarted);
        }

        self.resolution = target_resolution
            .filter(|size| !size.is_empty())
            .unwrap_or(self.sensor_size);

        info!(
            %facing,
            resolution = %self.resolution,
            rotation = %self.rotation,
            "Starting synthetic camera"
        );

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CameraSessionState::Starting;

        let resolution = self.resolution;
        let failure = self.start_failure.take();
        let start_failed = self.start_failed.take();
        let first_frame = self.first_frame.take();
        let frame_limit = self.frame_limit;
        let texture = self.texture.clone();
        let state = Arc::clone(&self.state);
        let init_state = Arc::clone(&self.state);

        let controller = CaptureLoopController::start_paced(
            "synthetic-camera",
            self.frame_interval(),
            move || {
                if let Some(reason) = failure {
                    *init_state.lock().unwrap_or_else(PoisonError::into_inner) =
                        CameraSessionState::Stopped;
                    if let Some(callback) = start_failed {
                        callback(BackendError::StartFailed(reason.clone()));
                    }
                    return Err(reason);
                }

                let pattern: Vec<u8> = (0..pattern_len(resolution))
                    .map(|i| (i % 251) as u8)
                    .collect();

                Ok(DeliveryState {
                    pattern: Arc::from(pattern),
                    resolution,
                    sequence: 0,
                    started_at: Instant::now(),
                    first_frame,
                })
            },
            move |delivery| {
                if frame_limit.is_some_and(|limit| delivery.sequence >= limit) {
                    return LoopAction::Stop;
                }

                if let Some(callback) = delivery.first_frame.take() {
                    *state.lock().unwrap_or_else(PoisonError::into_inner) =
                        CameraSessionState::Running;
                    debug!(texture = texture.id(), "Synthetic camera delivered first frame");
                    callback(texture.clone());
                }

                let frame = RawFrame {
                    width: delivery.resolution.width,
                    height: delivery.resolution.height,
                    data: Arc::clone(&delivery.pattern),
                    sequence: delivery.sequence,
                    timestamp_ns: delivery.started_at.elapsed().as_nanos() as u64,
                    captured_at: Instant::now(),
                };
                delivery.sequence += 1;
                texture.publish(frame);

                LoopAction::Continue
            },
        )
        .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        self.capture = Some(controller);
        Ok(())
    }

    fn on_first_frame(&mut self, callback: FirstFrameCallback) {
        self.first_frame = Some(callback);
    }

    fn on_start_failed(&mut self, callback: StartFailedCallback) {
        self.start_failed = Some(callback);
    }

    fn compute_display_size(&self, view_size: Size) -> Size {
        let frame = if self.resolution.is_empty() {
            self.sensor_size
        } else {
            self.resolution
        };
        fit_display_size(frame, view_size, self.is_rotated())
    }

    fn is_rotated(&self) -> bool {
        self.rotation.swaps_dimensions()
    }

    fn sensor_rotation(&self) -> SensorRotation {
        self.rotation
    }

    fn state(&self) -> CameraSessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
                CameraSessionState::Stopped;
            info!(
                published = self.texture.published_count(),
                dropped = self.texture.dropped_count(),
                "Synthetic camera stopped"
            );
        }
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
