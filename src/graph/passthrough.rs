// SPDX-License-Identifier: GPL-3.0-only

//! Passthrough processing graph
//!
//! Presents every input texture unchanged on the bound output surface. It can
//! also emit synthetic landmark packets so the diagnostics path has traffic
//! without a real vision graph.

use super::packet::{LandmarkList, NormalizedLandmark, ResultPacket};
use super::{GraphSpec, InputSource, PacketHandler, ProcessingGraph};
use crate::gpu::{FrameTexture, NativeContext};
use crate::surface::OutputSurface;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, info, trace};

type SharedHandler = Arc<dyn Fn(&ResultPacket) + Send + Sync>;

/// Landmarks per synthetic subject (matches a hand model's 21 keypoints)
const SYNTHETIC_LANDMARKS: usize = 21;

/// Frames per synthetic "present"/"absent" phase
const SYNTHETIC_PHASE_FRAMES: u64 = 30;

/// Point-in-time copy of the graph counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub frames_processed: u64,
    pub frames_presented: u64,
    /// Frames whose surface had been destroyed (write skipped)
    pub stale_surface_writes: u64,
    /// Frames processed while no surface was bound
    pub unbound_frames: u64,
    /// Frames from a converter other than the registered input source
    pub stale_inputs: u64,
    /// Frames whose sequence did not increase
    pub out_of_order: u64,
    pub last_sequence: Option<u64>,
    pub packets_emitted: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    presented: AtomicU64,
    stale_surface: AtomicU64,
    unbound: AtomicU64,
    stale_inputs: AtomicU64,
    out_of_order: AtomicU64,
    packets: AtomicU64,
}

#[derive(Default)]
struct OutputState {
    surface: Option<Weak<dyn OutputSurface>>,
    flip_vertical: bool,
}

pub struct PassthroughGraph {
    spec: GraphSpec,
    context: NativeContext,
    output: Mutex<OutputState>,
    input: Mutex<Option<InputSource>>,
    last_sequence: Mutex<Option<u64>>,
    handlers: Mutex<HashMap<String, Vec<SharedHandler>>>,
    synthetic_channel: Option<String>,
    counters: Counters,
}

impl PassthroughGraph {
    pub fn new(spec: GraphSpec, context: NativeContext) -> Self {
        info!(
            graph = %spec.graph_id,
            input = %spec.input_stream,
            output = %spec.output_stream,
            context = context.0,
            "Passthrough graph created"
        );

        Self {
            spec,
            context,
            output: Mutex::new(OutputState::default()),
            input: Mutex::new(None),
            last_sequence: Mutex::new(None),
            handlers: Mutex::new(HashMap::new()),
            synthetic_channel: None,
            counters: Counters::default(),
        }
    }

    /// Emit one synthetic landmark packet per processed frame on `channel`
    pub fn with_synthetic_landmarks(mut self, channel: impl Into<String>) -> Self {
        self.synthetic_channel = Some(channel.into());
        self
    }

    pub fn native_context(&self) -> NativeContext {
        self.context
    }

    /// Deliver a packet to every handler subscribed to `channel`
    ///
    /// Handlers run on the caller's thread, outside any graph lock.
    pub fn emit_packet(&self, channel: &str, packet: &ResultPacket) {
        let handlers: Vec<SharedHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(packet);
        }
        self.counters.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            frames_processed: self.counters.processed.load(Ordering::SeqCst),
            frames_presented: self.counters.presented.load(Ordering::SeqCst),
            stale_surface_writes: self.counters.stale_surface.load(Ordering::SeqCst),
            unbound_frames: self.counters.unbound.load(Ordering::SeqCst),
            stale_inputs: self.counters.stale_inputs.load(Ordering::SeqCst),
            out_of_order: self.counters.out_of_order.load(Ordering::SeqCst),
            last_sequence: *self
                .last_sequence
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            packets_emitted: self.counters.packets.load(Ordering::SeqCst),
        }
    }

    fn track_sequence(&self, sequence: u64) {
        let mut last = self
            .last_sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|previous| sequence <= previous) {
            self.counters.out_of_order.fetch_add(1, Ordering::SeqCst);
        }
        *last = Some(sequence);
    }

    fn present(&self, texture: &FrameTexture) {
        let (surface, flip) = {
            let output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
            (output.surface.clone(), output.flip_vertical)
        };

        let Some(surface) = surface else {
            self.counters.unbound.fetch_add(1, Ordering::SeqCst);
            return;
        };

        match surface.upgrade() {
            Some(surface) => {
                surface.present(texture, flip);
                self.counters.presented.fetch_add(1, Ordering::SeqCst);
            }
            None => {
                trace!(sequence = texture.sequence, "Output surface gone, frame not presented");
                self.counters.stale_surface.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn emit_synthetic_landmarks(&self, channel: &str, texture: &FrameTexture) {
        let timestamp = (texture.timestamp_ns / 1_000) as i64;
        let visible = (texture.sequence / SYNTHETIC_PHASE_FRAMES) % 2 == 0;

        let lists = if visible {
            let phase = texture.sequence as f32 * 0.05;
            let landmarks = (0..SYNTHETIC_LANDMARKS)
                .map(|i| {
                    let angle = phase + i as f32 * std::f32::consts::TAU / SYNTHETIC_LANDMARKS as f32;
                    NormalizedLandmark::new(
                        0.5 + 0.2 * angle.cos(),
                        0.5 + 0.2 * angle.sin(),
                        -0.01 * i as f32,
                    )
                })
                .collect();
            vec![LandmarkList::new(landmarks)]
        } else {
            Vec::new()
        };

        self.emit_packet(channel, &ResultPacket::from_landmark_lists(timestamp, &lists));
    }
}

impl ProcessingGraph for PassthroughGraph {
    fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    fn bind_output_surface(&self, surface: Option<Weak<dyn OutputSurface>>) {
        debug!(bound = surface.is_some(), "Binding graph output surface");
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .surface = surface;
    }

    fn set_output_flip_vertical(&self, flip: bool) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flip_vertical = flip;
    }

    fn register_input_source(&self, source: InputSource) {
        debug!(converter = %source.converter, "Registering graph input source");
        *self.input.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
    }

    fn on_packet(&self, channel: &str, handler: PacketHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.to_string())
            .or_default()
            .push(Arc::from(handler));
    }

    fn process_frame(&self, texture: FrameTexture) {
        let registered = *self.input.lock().unwrap_or_else(PoisonError::into_inner);
        if registered.is_none_or(|source| source.converter != texture.converter) {
            trace!(converter = %texture.converter, "Frame from unregistered source dropped");
            self.counters.stale_inputs.fetch_add(1, Ordering::SeqCst);
            return;
        }

        self.track_sequence(texture.sequence);
        self.counters.processed.fetch_add(1, Ordering::SeqCst);
        self.present(&texture);

        if let Some(channel) = &self.synthetic_channel {
            self.emit_synthetic_landmarks(channel, &texture);
        }
    }
}
