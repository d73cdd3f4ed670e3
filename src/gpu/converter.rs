// SPDX-License-Identifier: GPL-3.0-only

//! Texture converter
//!
//! Turns raw camera frames into [`FrameTexture`]s for the processing graph.
//! The handle lives on the host thread; the conversion resources live on the
//! GPU worker and are only touched through [`GpuCommand`]s.
//!
//! A converter is single-use: once closed it never accepts frames again, and
//! the pipeline opens a new one on the next resume.

use super::GpuHandle;
use super::texture::ConverterId;
use super::worker::{ConverterReport, GpuCommand};
use crate::backends::camera::{CameraTexture, FrameSink, RawFrame, Size};
use crate::errors::GpuError;
use crate::graph::{InputSource, ProcessingGraph};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

static NEXT_CONVERTER_ID: AtomicU64 = AtomicU64::new(1);

/// Host-side handle to one converter instance
pub struct TextureConverter {
    id: ConverterId,
    gpu: GpuHandle,
    closed: Arc<AtomicBool>,
    source: Option<CameraTexture>,
    output: Option<Size>,
    report: Option<ConverterReport>,
}

impl TextureConverter {
    /// Allocate a converter on the GPU context, delivering to `consumer`
    pub fn open(
        gpu: &GpuHandle,
        flip_y: bool,
        consumer: Arc<dyn ProcessingGraph>,
    ) -> Result<Self, GpuError> {
        let id = ConverterId(NEXT_CONVERTER_ID.fetch_add(1, Ordering::Relaxed));
        let closed = Arc::new(AtomicBool::new(false));

        gpu.submit(GpuCommand::Open {
            converter: id,
            flip_y,
            closed: Arc::clone(&closed),
            consumer,
        })?;

        info!(converter = %id, flip_y, "Texture converter opened");

        Ok(Self {
            id,
            gpu: gpu.clone(),
            closed,
            source: None,
            output: None,
            report: None,
        })
    }

    pub fn id(&self) -> ConverterId {
        self.id
    }

    /// The identity to register as the graph's input source
    pub fn input_source(&self) -> InputSource {
        InputSource { converter: self.id }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current output size, once a source is bound
    pub fn output_size(&self) -> Option<Size> {
        self.output
    }

    /// Bind to the camera texture and retarget the output dimensions
    ///
    /// Calling it again with a new size re-binds in place. The configure
    /// command is queued before the sink is attached, so every frame the
    /// converter receives is already converted at the new size.
    pub fn set_surface_texture(
        &mut self,
        texture: &CameraTexture,
        output: Size,
    ) -> Result<(), GpuError> {
        if self.is_closed() {
            return Err(GpuError::ConverterClosed(self.id.0));
        }

        if let Some(previous) = &self.source
            && previous.id() != texture.id()
        {
            previous.detach(self.id.0);
        }

        self.gpu.submit(GpuCommand::Configure {
            converter: self.id,
            source: texture.id(),
            output,
        })?;

        let already_attached = self
            .source
            .as_ref()
            .is_some_and(|current| current.id() == texture.id());
        if !already_attached {
            texture.attach(Arc::new(ConverterSink {
                converter: self.id,
                closed: Arc::clone(&self.closed),
                gpu: self.gpu.clone(),
            }));
        }

        debug!(converter = %self.id, texture = texture.id(), %output, "Converter bound to camera texture");
        self.source = Some(texture.clone());
        self.output = Some(output);
        Ok(())
    }

    /// Stop accepting frames and release the GPU resources
    ///
    /// Returns once the GPU worker has drained every frame queued before the
    /// close and freed the converter's resources. Frames still in flight are
    /// discarded, never handed to the graph. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<ConverterReport, GpuError> {
        if let Some(report) = self.report {
            return Ok(report);
        }

        self.closed.store(true, Ordering::SeqCst);
        if let Some(source) = self.source.take() {
            source.detach(self.id.0);
        }

        let (done, ack) = oneshot::channel();
        self.gpu.submit(GpuCommand::Close {
            converter: self.id,
            done,
        })?;
        let report = ack.blocking_recv().map_err(|_| GpuError::WorkerGone)?;

        info!(
            converter = %self.id,
            converted = report.frames_converted,
            discarded = report.frames_discarded,
            "Texture converter closed"
        );
        self.report = Some(report);
        Ok(report)
    }
}

impl Drop for TextureConverter {
    fn drop(&mut self) {
        if self.report.is_none()
            && let Err(e) = self.close()
        {
            warn!(converter = %self.id, error = %e, "Failed to close converter on drop");
        }
    }
}

impl std::fmt::Debug for TextureConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureConverter")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("output", &self.output)
            .finish()
    }
}

/// Converter input attached to the camera texture
struct ConverterSink {
    converter: ConverterId,
    closed: Arc<AtomicBool>,
    gpu: GpuHandle,
}

impl FrameSink for ConverterSink {
    fn sink_id(&self) -> u64 {
        self.converter.0
    }

    /// Blocks until the graph has consumed the frame, so the camera can
    /// never get more than one frame ahead of it
    fn deliver(&self, frame: RawFrame) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let (consumed, ack) = oneshot::channel();
        let submitted = self.gpu.submit(GpuCommand::Convert {
            converter: self.converter,
            frame,
            consumed,
        });
        if submitted.is_err() {
            return false;
        }
        // A worker that shut down with the frame still queued drops the sender
        ack.blocking_recv().unwrap_or(false)
    }
}
