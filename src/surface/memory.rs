// SPDX-License-Identifier: GPL-3.0-only

//! In-memory surface and view for headless runs

use super::{OutputSurface, PreviewView};
use crate::backends::camera::Size;
use crate::gpu::FrameTexture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct LastPresent {
    size: Size,
    sequence: u64,
    flip: bool,
    latency: Duration,
}

/// Surface that records what was presented instead of drawing it
#[derive(Debug, Default)]
pub struct MemorySurface {
    presented: AtomicU64,
    last: Mutex<Option<LastPresent>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented_count(&self) -> u64 {
        self.presented.load(Ordering::SeqCst)
    }

    /// Output size of the most recent frame
    pub fn last_size(&self) -> Option<Size> {
        self.last_present().map(|last| last.size)
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_present().map(|last| last.sequence)
    }

    pub fn last_flip(&self) -> Option<bool> {
        self.last_present().map(|last| last.flip)
    }

    /// Capture-to-present latency of the most recent frame
    pub fn last_latency(&self) -> Option<Duration> {
        self.last_present().map(|last| last.latency)
    }

    fn last_present(&self) -> Option<LastPresent> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSurface for MemorySurface {
    fn present(&self, texture: &FrameTexture, flip_vertical: bool) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(LastPresent {
            size: texture.size,
            sequence: texture.sequence,
            flip: flip_vertical,
            latency: texture.captured_at.elapsed(),
        });
        self.presented.fetch_add(1, Ordering::SeqCst);
    }
}

/// View with a visibility flag and nothing on screen
#[derive(Debug, Default)]
pub struct HeadlessView {
    visible: AtomicBool,
    transitions: AtomicU64,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times visibility actually changed
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl PreviewView for HeadlessView {
    fn set_visible(&self, visible: bool) {
        if self.visible.swap(visible, Ordering::SeqCst) != visible {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}
