// SPDX-License-Identifier: GPL-3.0-only

//! Camera output slot
//!
//! A [`CameraTexture`] is the handle a camera session writes raw frames into.
//! It outlives any single texture converter: on every resume a fresh
//! converter attaches to the same slot, replacing the previous one. Frames
//! published while nothing is attached are dropped.

use super::types::RawFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Receiver of raw camera frames (the texture converter's input side)
pub trait FrameSink: Send + Sync {
    /// Identity used to detach only the sink that is currently attached
    fn sink_id(&self) -> u64;

    /// Hand one frame over. Returns `false` when the frame was discarded.
    ///
    /// Blocks until the downstream consumer has finished with the frame.
    fn deliver(&self, frame: RawFrame) -> bool;
}

struct Inner {
    id: u64,
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Camera-side texture handle shared between camera session and converter
#[derive(Clone)]
pub struct CameraTexture {
    inner: Arc<Inner>,
}

impl CameraTexture {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
                sink: Mutex::new(None),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Attach a sink, replacing whatever was attached before
    pub fn attach(&self, sink: Arc<dyn FrameSink>) {
        let mut slot = self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(texture = self.inner.id, sink = sink.sink_id(), "Attaching frame sink");
        *slot = Some(sink);
    }

    /// Detach the sink with the given id; a newer sink stays attached
    pub fn detach(&self, sink_id: u64) -> bool {
        let mut slot = self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if current.sink_id() == sink_id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Publish a frame from the camera delivery thread
    ///
    /// The lock is released before delivery so attach/detach from the host
    /// thread never waits on a blocked delivery.
    pub fn publish(&self, frame: RawFrame) -> bool {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let sink = self
            .inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let delivered = match sink {
            Some(sink) => sink.deliver(frame),
            None => false,
        };

        if !delivered {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Frames written by the camera so far
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Frames that found no attached (or an already closed) sink
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Default for CameraTexture {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CameraTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraTexture")
            .field("id", &self.inner.id)
            .field("attached", &self.is_attached())
            .field("published", &self.published_count())
            .finish()
    }
}
