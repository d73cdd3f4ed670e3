// SPDX-License-Identifier: GPL-3.0-only

//! GPU context management
//!
//! A [`GpuContextManager`] owns one rendering context and the single worker
//! thread allowed to use it. Everything that touches the context (converter
//! resources, frame conversion, graph processing) is sent to that thread as a
//! message, so two threads can never issue GPU work concurrently.
//!
//! Frames are handed over as a rendezvous: a camera thread pushing a frame
//! waits until the processing graph has returned from it, so there is never
//! more than one frame in flight and no frame queue.

pub mod converter;
pub mod texture;
mod worker;

pub use converter::TextureConverter;
pub use texture::{ConverterId, FrameTexture};
pub use worker::{ConverterReport, GpuStatsSnapshot};

use crate::constants::GPU_THREAD_NAME;
use crate::errors::GpuError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use worker::{GpuCommand, GpuStats};

static NEXT_CONTEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque native handle of a GPU context, passed to the processing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeContext(pub u64);

/// Cloneable sender side of the GPU worker
#[derive(Clone)]
pub struct GpuHandle {
    native: NativeContext,
    commands: mpsc::Sender<GpuCommand>,
}

impl GpuHandle {
    pub fn native_context(&self) -> NativeContext {
        self.native
    }

    /// Queue a command, waiting while the single slot is occupied
    ///
    /// Must not be called from inside an async runtime.
    pub(crate) fn submit(&self, command: GpuCommand) -> Result<(), GpuError> {
        self.commands
            .blocking_send(command)
            .map_err(|_| GpuError::WorkerGone)
    }
}

/// Owner of the GPU context and its worker thread
pub struct GpuContextManager {
    handle: GpuHandle,
    stats: Arc<GpuStats>,
    worker: Option<JoinHandle<()>>,
}

impl GpuContextManager {
    /// Create the context and spawn its worker thread
    ///
    /// Failure is fatal for the pipeline; there is no retry.
    pub fn new() -> Result<Self, GpuError> {
        let native = NativeContext(NEXT_CONTEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let (commands, receiver) = mpsc::channel(1);
        let stats = Arc::new(GpuStats::default());
        let worker_stats = Arc::clone(&stats);

        let worker = std::thread::Builder::new()
            .name(GPU_THREAD_NAME.to_string())
            .spawn(move || worker::run(receiver, worker_stats))
            .map_err(|e| GpuError::WorkerSpawn(e.to_string()))?;

        info!(context = native.0, "GPU context created");

        Ok(Self {
            handle: GpuHandle { native, commands },
            stats,
            worker: Some(worker),
        })
    }

    pub fn native_context(&self) -> NativeContext {
        self.handle.native
    }

    pub fn handle(&self) -> &GpuHandle {
        &self.handle
    }

    pub fn stats(&self) -> GpuStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker after it drains queued commands, and join it
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if self.handle.submit(GpuCommand::Shutdown).is_err() {
            warn!("GPU worker exited before shutdown was requested");
        }
        if let Err(e) = worker.join() {
            warn!("GPU worker panicked: {:?}", e);
        }

        let stats = self.stats.snapshot();
        info!(
            context = self.handle.native.0,
            converted = stats.frames_converted,
            discarded = stats.frames_discarded,
            "GPU context destroyed"
        );
    }
}

impl Drop for GpuContextManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GpuContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContextManager")
            .field("native", &self.handle.native)
            .field("running", &self.is_running())
            .finish()
    }
}
