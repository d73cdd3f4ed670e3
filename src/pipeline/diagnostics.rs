// SPDX-License-Identifier: GPL-3.0-only

//! Landmark packet diagnostics
//!
//! Packets are handed off from the graph's callback without blocking and
//! decoded on a dedicated logging thread, so a slow or malformed packet can
//! never hold up the GPU thread.

use crate::constants::{DIAGNOSTICS_THREAD_NAME, LANDMARKS_LOG_TARGET, NO_LANDMARKS_MESSAGE};
use crate::graph::{LandmarkList, PacketHandler, ResultPacket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Log filter used when `RUST_LOG` is unset
///
/// Warnings only, except for the landmark lines, which are only ever
/// produced when verbose diagnostics are switched on.
pub fn default_log_filter() -> String {
    format!("warn,{}=info", LANDMARKS_LOG_TARGET)
}

/// Diagnostic lines for one decoded packet, each tagged with its timestamp
pub fn describe_landmarks(timestamp: i64, lists: &[LandmarkList]) -> Vec<String> {
    if lists.is_empty() {
        return vec![format!("[TS:{}] {}", timestamp, NO_LANDMARKS_MESSAGE)];
    }

    let mut lines = vec![format!("[TS:{}] Landmark lists: {}", timestamp, lists.len())];
    for (list_index, list) in lists.iter().enumerate() {
        lines.push(format!(
            "[TS:{}] List {}: {} landmarks",
            timestamp,
            list_index,
            list.landmarks.len()
        ));
        for (index, landmark) in list.landmarks.iter().enumerate() {
            lines.push(format!(
                "[TS:{}]   Landmark {}: ({:.6}, {:.6}, {:.6})",
                timestamp, index, landmark.x, landmark.y, landmark.z
            ));
        }
    }
    lines
}

/// Point-in-time copy of the diagnostics counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsStats {
    pub packets: u64,
    /// Packets that decoded to an empty sequence
    pub no_landmarks: u64,
    pub lists: u64,
    pub landmarks: u64,
    pub decode_errors: u64,
}

#[derive(Default)]
struct Counters {
    packets: AtomicU64,
    no_landmarks: AtomicU64,
    lists: AtomicU64,
    landmarks: AtomicU64,
    decode_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DiagnosticsStats {
        DiagnosticsStats {
            packets: self.packets.load(Ordering::SeqCst),
            no_landmarks: self.no_landmarks.load(Ordering::SeqCst),
            lists: self.lists.load(Ordering::SeqCst),
            landmarks: self.landmarks.load(Ordering::SeqCst),
            decode_errors: self.decode_errors.load(Ordering::SeqCst),
        }
    }
}

enum LogMessage {
    Packet(ResultPacket),
    Shutdown,
}

/// Background logger for one landmark side channel
pub struct LandmarkLogger {
    channel: String,
    sender: mpsc::UnboundedSender<LogMessage>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl LandmarkLogger {
    pub fn spawn(channel: impl Into<String>) -> std::io::Result<Self> {
        let channel = channel.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let worker_channel = channel.clone();

        let worker = std::thread::Builder::new()
            .name(DIAGNOSTICS_THREAD_NAME.to_string())
            .spawn(move || run(receiver, worker_channel, worker_counters))?;

        Ok(Self {
            channel,
            sender,
            counters,
            worker: Some(worker),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Packet callback to register on the graph's side channel
    pub fn handler(&self) -> PacketHandler {
        let sender = self.sender.clone();
        Box::new(move |packet| {
            // Worker gone means shutdown already happened
            let _ = sender.send(LogMessage::Packet(packet.clone()));
        })
    }

    pub fn stats(&self) -> DiagnosticsStats {
        self.counters.snapshot()
    }

    /// Log every packet queued so far, then stop the worker
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.sender.send(LogMessage::Shutdown);
        if let Err(e) = worker.join() {
            warn!("Landmark logger panicked: {:?}", e);
        }

        let stats = self.counters.snapshot();
        info!(
            channel = %self.channel,
            packets = stats.packets,
            empty = stats.no_landmarks,
            errors = stats.decode_errors,
            "Landmark logger stopped"
        );
    }
}

impl Drop for LandmarkLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut receiver: mpsc::UnboundedReceiver<LogMessage>, channel: String, counters: Arc<Counters>) {
    debug!(%channel, "Landmark logger started");

    while let Some(LogMessage::Packet(packet)) = receiver.blocking_recv() {
        counters.packets.fetch_add(1, Ordering::SeqCst);

        let lists = match packet.decode_landmark_lists() {
            Ok(lists) => lists,
            Err(e) => {
                counters.decode_errors.fetch_add(1, Ordering::SeqCst);
                warn!(%channel, timestamp = packet.timestamp(), error = %e, "Undecodable landmark packet");
                continue;
            }
        };

        if lists.is_empty() {
            counters.no_landmarks.fetch_add(1, Ordering::SeqCst);
        } else {
            let landmarks: usize = lists.iter().map(|list| list.landmarks.len()).sum();
            counters.lists.fetch_add(lists.len() as u64, Ordering::SeqCst);
            counters.landmarks.fetch_add(landmarks as u64, Ordering::SeqCst);
        }

        log_landmarks(packet.timestamp(), &lists);
    }
}

fn log_landmarks(timestamp: i64, lists: &[LandmarkList]) {
    for line in describe_landmarks(timestamp, lists) {
        info!(target: LANDMARKS_LOG_TARGET, "{}", line);
    }
}
