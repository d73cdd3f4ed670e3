// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the preview pipeline
//!
//! This module provides command-line functionality for:
//! - Running the pipeline headless against a synthetic camera
//! - Validating host metadata

use chrono::Local;
use lookandtell::backends::camera::{CameraSession, SensorRotation, Size, SyntheticCamera};
use lookandtell::backends::permission::{PERMISSION_DENIED, StaticPermission};
use lookandtell::config::PipelineConfig;
use lookandtell::constants::{CAMERA_PERMISSION, CAMERA_PERMISSION_REQUEST_CODE};
use lookandtell::graph::{PassthroughGraph, ProcessingGraph};
use lookandtell::pipeline::{Collaborators, PipelineCoordinator};
use lookandtell::surface::{HeadlessView, MemorySurface, OutputSurface, PreviewView, SurfaceEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Options for a headless run
pub struct RunOptions {
    pub metadata: Option<PathBuf>,
    pub seconds: u64,
    pub view: Size,
    pub rotated: bool,
    pub deny_permission: bool,
}

/// Metadata file given on the command line, or the default location
fn metadata_path(path: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    path.or_else(PipelineConfig::default_metadata_path)
        .ok_or_else(|| "No metadata file given and no config directory found".into())
}

/// Validate metadata and print the resolved configuration
pub fn check_config(metadata: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = metadata_path(metadata)?;
    let config = PipelineConfig::load(&path)?;

    println!("Metadata: {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Run the pipeline headless: synthetic camera, passthrough graph and an
/// in-memory surface
pub fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let path = metadata_path(options.metadata)?;
    let config = PipelineConfig::load(&path)?;
    let landmarks_channel = config.landmarks_channel.clone();

    println!(
        "Starting graph '{}' ({} -> {}) at {}",
        config.graph_id,
        config.input_stream_name,
        config.output_stream_name,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let surface = Arc::new(MemorySurface::new());
    let view = Arc::new(HeadlessView::new());
    let graph_slot: Arc<OnceLock<Arc<PassthroughGraph>>> = Arc::new(OnceLock::new());

    let rotation = if options.rotated {
        SensorRotation::Rotate90
    } else {
        SensorRotation::None
    };
    let permissions = if options.deny_permission {
        StaticPermission::pending()
    } else {
        StaticPermission::granted()
    };

    let factory_slot = Arc::clone(&graph_slot);
    let collaborators = Collaborators::new(
        Box::new(permissions),
        Box::new(move || {
            Box::new(SyntheticCamera::new().with_rotation(rotation)) as Box<dyn CameraSession>
        }),
        Box::new(move |spec, context| {
            let graph = Arc::new(
                PassthroughGraph::new(spec.clone(), context)
                    .with_synthetic_landmarks(landmarks_channel),
            );
            let _ = factory_slot.set(Arc::clone(&graph));
            Ok(graph as Arc<dyn ProcessingGraph>)
        }),
        view.clone(),
    );

    let mut pipeline = PipelineCoordinator::create(config, collaborators)?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    pipeline.on_resume()?;

    if options.deny_permission {
        pipeline.on_request_permissions_result(
            CAMERA_PERMISSION_REQUEST_CODE,
            &[CAMERA_PERMISSION.to_string()],
            &[PERMISSION_DENIED],
        )?;
        println!("Camera permission denied; pipeline is {:?}", pipeline.state());
        pipeline.on_destroy();
        return Ok(());
    }

    let output: Arc<dyn OutputSurface> = surface.clone();
    pipeline.on_surface_event(SurfaceEvent::Created(Arc::downgrade(&output)))?;
    pipeline.on_surface_event(SurfaceEvent::Changed {
        format: 1,
        width: options.view.width,
        height: options.view.height,
    })?;

    println!("Running... (press Ctrl+C to stop early)");
    let half = Duration::from_secs(options.seconds) / 2;
    drive(&mut pipeline, half, &stop_flag)?;

    if !stop_flag.load(Ordering::SeqCst) {
        println!();
        println!("Pausing and resuming");
        pipeline.on_pause()?;
        pipeline.on_resume()?;
        drive(&mut pipeline, half, &stop_flag)?;
    }
    println!();

    pipeline.on_surface_event(SurfaceEvent::Destroyed)?;
    pipeline.on_destroy();

    let gpu = pipeline.gpu_stats();
    println!("Final state: {:?}", pipeline.state());
    println!("View visible: {}", view.is_visible());
    if let Some(geometry) = pipeline.geometry() {
        println!(
            "Geometry: view {}x{} (sensor {}), display {}, converter output {}",
            geometry.surface.width,
            geometry.surface.height,
            geometry.surface.rotation,
            geometry.display,
            geometry.output
        );
    }
    println!(
        "Converters: {} opened, at most {} open at once",
        gpu.converters_opened, gpu.peak_open_converters
    );
    println!(
        "Frames: {} converted, {} discarded, {} presented",
        gpu.frames_converted,
        gpu.frames_discarded,
        surface.presented_count()
    );
    if let Some(graph) = graph_slot.get() {
        let stats = graph.stats();
        println!(
            "Graph: {} processed, {} out of order, {} packets",
            stats.frames_processed, stats.out_of_order, stats.packets_emitted
        );
    }
    if let Some(latency) = surface.last_latency() {
        println!("Last frame latency: {:.2} ms", latency.as_secs_f64() * 1000.0);
    }
    if let Some(diagnostics) = pipeline.diagnostics_stats() {
        println!(
            "Landmark packets: {} ({} empty, {} landmarks, {} undecodable)",
            diagnostics.packets,
            diagnostics.no_landmarks,
            diagnostics.landmarks,
            diagnostics.decode_errors
        );
    }

    Ok(())
}

/// Pump camera notifications for `duration`, printing progress
fn drive(
    pipeline: &mut PipelineCoordinator,
    duration: Duration,
    stop_flag: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    while start.elapsed() < duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        pipeline.dispatch_pending()?;

        let stats = pipeline.gpu_stats();
        print!(
            "\r{:?}: {} frames converted",
            pipeline.state(),
            stats.frames_converted
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}
