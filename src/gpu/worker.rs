// SPDX-License-Identifier: GPL-3.0-only

//! GPU context worker
//!
//! The only thread that touches the GPU context. Conversion resources for
//! each open converter live here, and the processing graph is invoked from
//! here, so conversion and graph work can never overlap.

use super::texture::{ConverterId, FrameTexture};
use crate::backends::camera::{RawFrame, Size};
use crate::graph::ProcessingGraph;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Counters shared between the worker and its owner
#[derive(Debug, Default)]
pub(crate) struct GpuStats {
    pub(crate) open_converters: AtomicUsize,
    pub(crate) peak_open_converters: AtomicUsize,
    pub(crate) converters_opened: AtomicU64,
    pub(crate) frames_converted: AtomicU64,
    pub(crate) frames_discarded: AtomicU64,
}

/// Point-in-time copy of the GPU counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuStatsSnapshot {
    pub open_converters: usize,
    /// Highest number of simultaneously open converters ever observed
    pub peak_open_converters: usize,
    pub converters_opened: u64,
    pub frames_converted: u64,
    pub frames_discarded: u64,
}

impl GpuStats {
    pub(crate) fn snapshot(&self) -> GpuStatsSnapshot {
        GpuStatsSnapshot {
            open_converters: self.open_converters.load(Ordering::SeqCst),
            peak_open_converters: self.peak_open_converters.load(Ordering::SeqCst),
            converters_opened: self.converters_opened.load(Ordering::SeqCst),
            frames_converted: self.frames_converted.load(Ordering::SeqCst),
            frames_discarded: self.frames_discarded.load(Ordering::SeqCst),
        }
    }
}

/// What a converter did during its lifetime, reported when it closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterReport {
    pub frames_converted: u64,
    pub frames_discarded: u64,
}

pub(crate) enum GpuCommand {
    /// Allocate conversion resources for a new converter
    Open {
        converter: ConverterId,
        flip_y: bool,
        closed: Arc<AtomicBool>,
        consumer: Arc<dyn ProcessingGraph>,
    },
    /// Bind the converter to a camera texture with the given output size
    Configure {
        converter: ConverterId,
        source: u64,
        output: Size,
    },
    /// Convert one camera frame and hand it to the consumer
    ///
    /// `consumed` completes once the consumer has returned from the frame,
    /// with `false` when the frame was discarded instead.
    Convert {
        converter: ConverterId,
        frame: RawFrame,
        consumed: oneshot::Sender<bool>,
    },
    /// Release the converter's resources; acknowledged after the release
    Close {
        converter: ConverterId,
        done: oneshot::Sender<ConverterReport>,
    },
    Shutdown,
}

/// GPU resources owned by one converter
struct ConversionStage {
    texture_name: u32,
    flip_y: bool,
    closed: Arc<AtomicBool>,
    consumer: Arc<dyn ProcessingGraph>,
    source: Option<u64>,
    output: Option<Size>,
    report: ConverterReport,
}

struct Worker {
    stages: HashMap<ConverterId, ConversionStage>,
    next_texture_name: u32,
    stats: Arc<GpuStats>,
}

pub(crate) fn run(mut commands: mpsc::Receiver<GpuCommand>, stats: Arc<GpuStats>) {
    info!("GPU context worker started");

    let mut worker = Worker {
        stages: HashMap::new(),
        next_texture_name: 1,
        stats,
    };

    while let Some(command) = commands.blocking_recv() {
        match command {
            GpuCommand::Open {
                converter,
                flip_y,
                closed,
                consumer,
            } => worker.open(converter, flip_y, closed, consumer),
            GpuCommand::Configure {
                converter,
                source,
                output,
            } => worker.configure(converter, source, output),
            GpuCommand::Convert {
                converter,
                frame,
                consumed,
            } => {
                let delivered = worker.convert(converter, frame);
                let _ = consumed.send(delivered);
            }
            GpuCommand::Close { converter, done } => {
                let report = worker.close(converter);
                // The closer may have given up waiting; nothing to do then
                let _ = done.send(report);
            }
            GpuCommand::Shutdown => break,
        }
    }

    let leftover: Vec<ConverterId> = worker.stages.keys().copied().collect();
    for converter in leftover {
        warn!(%converter, "Releasing converter still open at GPU shutdown");
        worker.close(converter);
    }

    info!("GPU context worker exiting");
}

impl Worker {
    fn open(
        &mut self,
        converter: ConverterId,
        flip_y: bool,
        closed: Arc<AtomicBool>,
        consumer: Arc<dyn ProcessingGraph>,
    ) {
        let texture_name = self.next_texture_name;
        self.next_texture_name += 1;

        self.stages.insert(
            converter,
            ConversionStage {
                texture_name,
                flip_y,
                closed,
                consumer,
                source: None,
                output: None,
                report: ConverterReport::default(),
            },
        );

        let open = self.stats.open_converters.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats
            .peak_open_converters
            .fetch_max(open, Ordering::SeqCst);
        self.stats.converters_opened.fetch_add(1, Ordering::SeqCst);

        debug!(%converter, texture_name, flip_y, open, "Converter resources allocated");
    }

    fn configure(&mut self, converter: ConverterId, source: u64, output: Size) {
        match self.stages.get_mut(&converter) {
            Some(stage) => {
                stage.source = Some(source);
                stage.output = Some(output);
                debug!(%converter, source, %output, "Converter output retargeted");
            }
            None => debug!(%converter, "Configure for released converter ignored"),
        }
    }

    fn convert(&mut self, converter: ConverterId, frame: RawFrame) -> bool {
        let Some(stage) = self.stages.get_mut(&converter) else {
            self.discard(converter, frame.sequence, "released");
            return false;
        };

        if stage.closed.load(Ordering::SeqCst) {
            stage.report.frames_discarded += 1;
            self.discard(converter, frame.sequence, "closed");
            return false;
        }

        let Some(output) = stage.output else {
            stage.report.frames_discarded += 1;
            self.discard(converter, frame.sequence, "unconfigured");
            return false;
        };

        let texture = FrameTexture {
            name: stage.texture_name,
            converter,
            size: output,
            source_size: frame.size(),
            flip_y: stage.flip_y,
            sequence: frame.sequence,
            timestamp_ns: frame.timestamp_ns,
            captured_at: frame.captured_at,
        };

        trace!(%converter, sequence = frame.sequence, "Frame converted");
        stage.report.frames_converted += 1;
        self.stats.frames_converted.fetch_add(1, Ordering::SeqCst);

        // Synchronous: the texture slot is free again once this returns
        stage.consumer.process_frame(texture);
        true
    }

    fn discard(&self, converter: ConverterId, sequence: u64, reason: &str) {
        trace!(%converter, sequence, reason, "Frame discarded");
        self.stats.frames_discarded.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self, converter: ConverterId) -> ConverterReport {
        match self.stages.remove(&converter) {
            Some(stage) => {
                let open = self.stats.open_converters.fetch_sub(1, Ordering::SeqCst) - 1;
                debug!(
                    %converter,
                    texture_name = stage.texture_name,
                    converted = stage.report.frames_converted,
                    discarded = stage.report.frames_discarded,
                    open,
                    "Converter resources released"
                );
                stage.report
            }
            None => ConverterReport::default(),
        }
    }
}
