// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Host metadata keys recognized by [`crate::config::PipelineConfig`]
pub mod keys {
    pub const GRAPH_ID: &str = "graphId";
    pub const INPUT_STREAM_NAME: &str = "inputStreamName";
    pub const OUTPUT_STREAM_NAME: &str = "outputStreamName";
    pub const FLIP_FRAMES_VERTICALLY: &str = "flipFramesVertically";
    pub const CONVERTER_FLIP_FRAMES_VERTICALLY: &str = "converterFlipFramesVertically";
    pub const CAMERA_FACING_FRONT: &str = "cameraFacingFront";
    pub const CAMERA_TARGET_RESOLUTION: &str = "cameraTargetResolution";
    pub const VERBOSE_DIAGNOSTICS: &str = "verboseDiagnostics";
    pub const LANDMARKS_CHANNEL_NAME: &str = "landmarksChannelName";
}

/// Camera preview frames are flipped vertically unless metadata says otherwise
pub const DEFAULT_FLIP_FRAMES_VERTICALLY: bool = true;

/// Side channel carrying landmark packets when metadata does not name one
pub const DEFAULT_LANDMARKS_CHANNEL: &str = "multi_hand_landmarks";

/// Diagnostic emitted for a packet with no landmark lists
pub const NO_LANDMARKS_MESSAGE: &str = "No landmarks detected";

/// Log target of the per-packet landmark lines
pub const LANDMARKS_LOG_TARGET: &str = "lookandtell::landmarks";

/// Request code used for the camera permission request
pub const CAMERA_PERMISSION_REQUEST_CODE: i32 = 0;

/// Name of the camera permission forwarded to the permission collaborator
pub const CAMERA_PERMISSION: &str = "android.permission.CAMERA";

/// GPU worker thread name
pub const GPU_THREAD_NAME: &str = "gpu-context";

/// Diagnostics worker thread name
pub const DIAGNOSTICS_THREAD_NAME: &str = "landmark-log";

/// Synthetic camera defaults
pub mod synthetic {
    /// Native sensor resolution (landscape, as most sensors report)
    pub const SENSOR_WIDTH: u32 = 1920;
    pub const SENSOR_HEIGHT: u32 = 1080;
    /// Delivery rate in frames per second
    pub const FRAMERATE: u32 = 30;
}
