// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview pipeline

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main pipeline error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Host metadata could not be resolved into a configuration
    Config(ConfigError),
    /// Camera session failures (start, delivery)
    Camera(BackendError),
    /// GPU context failures
    Gpu(GpuError),
    /// Processing graph construction failures
    Graph(String),
    /// The landmark diagnostics worker could not be started
    Diagnostics(String),
}

/// Configuration errors, always fatal at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required metadata key is absent
    MissingKey(&'static str),
    /// A required string key is present but empty
    EmptyValue(&'static str),
    /// A key holds a value of the wrong type or shape
    InvalidValue { key: &'static str, reason: String },
    /// Metadata is not a JSON object or failed to parse
    Parse(String),
    /// Metadata file could not be read
    Io(String),
}

/// GPU context errors
///
/// Any of these tears the pipeline down; acquisition is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The dedicated GPU worker thread could not be spawned
    WorkerSpawn(String),
    /// The GPU worker has exited and no longer accepts commands
    WorkerGone,
    /// A converter was used after it was closed
    ConverterClosed(u64),
}

/// Landmark packet decode anomalies (diagnostic path only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Payload was not a landmark-list sequence
    Malformed(String),
    /// Landmark coordinate was not a finite number
    NonFinite { list: usize, landmark: usize },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Gpu(e) => write!(f, "GPU error: {}", e),
            AppError::Graph(msg) => write!(f, "Processing graph error: {}", msg),
            AppError::Diagnostics(msg) => write!(f, "Diagnostics error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingKey(key) => write!(f, "missing required metadata key '{}'", key),
            ConfigError::EmptyValue(key) => write!(f, "metadata key '{}' must not be empty", key),
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "invalid value for metadata key '{}': {}", key, reason)
            }
            ConfigError::Parse(msg) => write!(f, "cannot parse metadata: {}", msg),
            ConfigError::Io(msg) => write!(f, "cannot read metadata: {}", msg),
        }
    }
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::WorkerSpawn(msg) => write!(f, "failed to spawn GPU worker: {}", msg),
            GpuError::WorkerGone => write!(f, "GPU worker is no longer running"),
            GpuError::ConverterClosed(id) => write!(f, "texture converter #{} is closed", id),
        }
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::Malformed(msg) => write!(f, "malformed landmark packet: {}", msg),
            PacketError::NonFinite { list, landmark } => {
                write!(f, "non-finite coordinate in list {} landmark {}", list, landmark)
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for GpuError {}
impl std::error::Error for PacketError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<GpuError> for AppError {
    fn from(err: GpuError) -> Self {
        AppError::Gpu(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
