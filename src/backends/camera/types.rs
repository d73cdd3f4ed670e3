// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera session abstraction

//! Shared types for camera sessions

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Pixel dimensions (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same area with width and height exchanged
    pub const fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// width / height, 0.0 for an empty size
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which physical camera the session opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraFacing {
    /// User-facing camera
    Front,
    /// World-facing camera
    #[default]
    Back,
}

impl CameraFacing {
    /// Resolve facing from the `cameraFacingFront` flag; absent means back
    pub fn from_front_flag(front: Option<bool>) -> Self {
        match front {
            Some(true) => CameraFacing::Front,
            _ => CameraFacing::Back,
        }
    }
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Front => write!(f, "front"),
            CameraFacing::Back => write!(f, "back"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Sensors on handheld devices are commonly mounted at 90° or 270° relative
/// to the device's natural orientation, so the frames they deliver are
/// perpendicular to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Number of clockwise quarter turns (0-3)
    pub fn quadrant(&self) -> u8 {
        (self.degrees() / 90) as u8
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Lifecycle of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraSessionState {
    #[default]
    Uninitialized,
    Starting,
    Running,
    Stopped,
}

/// A single raw frame written by the camera into its texture slot
///
/// The pixel payload is reference counted so publishing a frame never
/// copies it; the converter is the only reader.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Packed pixel data as delivered by the sensor
    pub data: Arc<[u8]>,
    /// Monotonic delivery sequence number, starting at 0
    pub sequence: u64,
    /// Sensor timestamp in nanoseconds since session start
    pub timestamp_ns: u64,
    /// When the frame entered the pipeline (for latency diagnostics)
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Result type for camera operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for camera operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No camera with the requested facing exists
    DeviceNotFound(String),
    /// The session failed to start streaming
    StartFailed(String),
    /// `start` was called on a session that already started
    AlreadyStarted,
    /// Camera stopped delivering frames unexpectedly
    Disconnected,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::StartFailed(msg) => write!(f, "Camera failed to start: {}", msg),
            BackendError::AlreadyStarted => write!(f, "Camera session already started"),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
