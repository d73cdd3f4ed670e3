// SPDX-License-Identifier: GPL-3.0-only

//! Landmark result packets
//!
//! A packet carries a timestamp and a serialized sequence of landmark lists
//! (one list per detected subject). Decoding is done by the consumer, so a
//! malformed packet only ever affects the diagnostic path.

use crate::errors::PacketError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A landmark with coordinates normalized to the frame (x, y in 0..1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Ordered landmarks of one detected subject
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkList {
    pub landmarks: Vec<NormalizedLandmark>,
}

impl LandmarkList {
    pub fn new(landmarks: Vec<NormalizedLandmark>) -> Self {
        Self { landmarks }
    }
}

/// Immutable, timestamped side-channel packet
#[derive(Debug, Clone)]
pub struct ResultPacket {
    /// Microseconds, in the timebase of the frame it was computed from
    timestamp: i64,
    payload: Arc<[u8]>,
}

impl ResultPacket {
    /// Wrap a raw payload as received from the graph
    pub fn new(timestamp: i64, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
        }
    }

    /// Serialize landmark lists into a packet
    pub fn from_landmark_lists(timestamp: i64, lists: &[LandmarkList]) -> Self {
        // Plain structs of floats always serialize
        let payload = serde_json::to_vec(lists).unwrap_or_default();
        Self::new(timestamp, payload)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the landmark-list sequence
    ///
    /// An empty payload decodes as an empty sequence (nothing detected).
    pub fn decode_landmark_lists(&self) -> Result<Vec<LandmarkList>, PacketError> {
        if self.payload.is_empty() {
            return Ok(Vec::new());
        }

        let lists: Vec<LandmarkList> = serde_json::from_slice(&self.payload)
            .map_err(|e| PacketError::Malformed(e.to_string()))?;

        for (list_index, list) in lists.iter().enumerate() {
            if let Some(landmark_index) = list.landmarks.iter().position(|l| !l.is_finite()) {
                return Err(PacketError::NonFinite {
                    list: list_index,
                    landmark: landmark_index,
                });
            }
        }

        Ok(lists)
    }
}
