// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the pipeline lifecycle

mod common;

use common::{CameraRig, HarnessBuilder, wait_for_state};
use lookandtell::backends::camera::{
    BackendError, CameraFacing, CameraSession, SensorRotation, Size, SyntheticCamera,
};
use lookandtell::backends::permission::{PERMISSION_DENIED, PERMISSION_GRANTED};
use lookandtell::constants::{CAMERA_PERMISSION, CAMERA_PERMISSION_REQUEST_CODE};
use lookandtell::errors::{AppError, ConfigError, GpuError};
use lookandtell::gpu::FrameTexture;
use lookandtell::graph::{GraphSpec, InputSource, PacketHandler, ProcessingGraph, ResultPacket};
use lookandtell::pipeline::{FitAspect, PipelineState};
use lookandtell::surface::{MemorySurface, OutputSurface, PreviewView, SurfaceEvent};
use serde_json::json;
use std::sync::{Arc, Weak};

fn camera_permission() -> Vec<String> {
    vec![CAMERA_PERMISSION.to_string()]
}

#[test]
fn test_view_hidden_until_first_frame() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::AwaitingPermission);
    assert_eq!(rig.factory_calls(), 0);

    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::CameraStarting);
    harness.show_surface(1280, 720).unwrap();
    assert_eq!(harness.pipeline.dispatch_pending().unwrap(), 0);
    assert!(!harness.view.is_visible());

    // Posted from the camera thread, applied on the next dispatch
    rig.deliver_first_frame();
    assert!(!harness.view.is_visible());

    assert_eq!(harness.pipeline.dispatch_pending().unwrap(), 1);
    assert!(harness.view.is_visible());
    assert_eq!(harness.pipeline.state(), PipelineState::Running);
}

#[test]
fn test_rotated_camera_swaps_converter_output() {
    let rig = CameraRig::new(Size::new(1920, 1080), SensorRotation::Rotate90);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1080, 1920).unwrap();

    let geometry = harness.pipeline.geometry().unwrap();
    assert_eq!(geometry.display, Size::new(1920, 1080));
    assert_eq!(geometry.output, Size::new(1080, 1920));
    assert_eq!(geometry.surface.rotation, SensorRotation::Rotate90);
    assert_eq!(
        harness.pipeline.converter_output_size(),
        Some(Size::new(1080, 1920))
    );
}

#[test]
fn test_unrotated_camera_keeps_display_size() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();

    let geometry = harness.pipeline.geometry().unwrap();
    assert_eq!(geometry.display, Size::new(1280, 720));
    assert_eq!(geometry.output, geometry.display);
}

#[test]
fn test_geometry_waits_for_camera_texture() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    harness.show_surface(1280, 720).unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 0);
    assert!(!rig.publish(0), "nothing is attached before the first frame");

    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);
    assert!(rig.publish(1));
}

#[test]
fn test_pause_resume_keeps_one_converter() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();
    let first_converter = harness.pipeline.converter_id().unwrap();
    let first_geometry = harness.pipeline.geometry().unwrap();

    for sequence in 0..3 {
        assert!(rig.publish(sequence));
    }

    harness.pipeline.on_pause().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::Paused);
    assert_eq!(harness.pipeline.converter_id(), None);
    assert_eq!(harness.pipeline.gpu_stats().open_converters, 0);
    assert_eq!(harness.pipeline.gpu_stats().frames_converted, 3);
    assert!(!rig.publish(3), "frames are dropped while paused");

    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::Running);
    let second_converter = harness.pipeline.converter_id().unwrap();
    assert_ne!(first_converter, second_converter);
    assert_eq!(harness.pipeline.geometry(), Some(first_geometry));

    for sequence in 4..6 {
        assert!(rig.publish(sequence));
    }
    harness.pipeline.on_pause().unwrap();
    harness.pipeline.on_resume().unwrap();

    let stats = harness.pipeline.gpu_stats();
    assert_eq!(stats.converters_opened, 3);
    assert_eq!(stats.peak_open_converters, 1);
    assert_eq!(stats.open_converters, 1);
    assert_eq!(stats.frames_converted, 5);

    let graph = harness.graph().stats();
    assert_eq!(graph.frames_processed, 5);
    assert_eq!(graph.out_of_order, 0);

    // The camera is only ever started once
    assert_eq!(rig.factory_calls(), 1);
    assert_eq!(rig.starts(), 1);
}

#[test]
fn test_processed_frames_reach_surface() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(640, 360).unwrap();

    for sequence in 0..4 {
        rig.publish(sequence);
    }
    harness.pipeline.on_pause().unwrap();

    assert_eq!(harness.surface.presented_count(), 4);
    assert_eq!(harness.surface.last_sequence(), Some(3));
    assert_eq!(harness.surface.last_size(), Some(Size::new(640, 360)));
    // flipFramesVertically defaults to true
    assert_eq!(harness.surface.last_flip(), Some(true));
}

#[test]
fn test_empty_packets_logged_as_no_landmarks() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut metadata = common::metadata();
    metadata["verboseDiagnostics"] = json!(true);
    let mut harness = HarnessBuilder::new()
        .metadata(metadata)
        .build(&rig)
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();

    let graph = harness.graph();
    for sequence in 0..5u64 {
        rig.publish(sequence);
        graph.emit_packet(
            "multi_hand_landmarks",
            &ResultPacket::new(sequence as i64, Vec::new()),
        );
    }
    graph.emit_packet(
        "multi_hand_landmarks",
        &ResultPacket::from_landmark_lists(99, &[]),
    );
    // Other channels are not subscribed
    graph.emit_packet("face_landmarks", &ResultPacket::new(100, Vec::new()));

    harness.pipeline.on_destroy();

    let diagnostics = harness.pipeline.diagnostics_stats().unwrap();
    assert_eq!(diagnostics.packets, 6);
    assert_eq!(diagnostics.no_landmarks, 6);
    assert_eq!(diagnostics.decode_errors, 0);
    assert_eq!(harness.pipeline.gpu_stats().frames_converted, 5);
}

#[test]
fn test_diagnostics_off_by_default() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let harness = HarnessBuilder::new().build(&rig).unwrap();
    assert!(harness.pipeline.diagnostics_stats().is_none());
}

#[test]
fn test_missing_key_fails_before_camera_access() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut metadata = common::metadata();
    metadata.as_object_mut().unwrap().remove("graphId");

    let result = HarnessBuilder::new().metadata(metadata).build(&rig);
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::MissingKey("graphId")))
    ));
    assert_eq!(rig.factory_calls(), 0);
    assert_eq!(rig.starts(), 0);
}

#[test]
fn test_camera_facing_and_resolution_forwarded() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();
    harness.pipeline.on_resume().unwrap();
    assert_eq!(rig.facing(), Some(CameraFacing::Back));
    assert_eq!(rig.target_resolution(), None);

    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut metadata = common::metadata();
    metadata["cameraFacingFront"] = json!(true);
    metadata["cameraTargetResolution"] = json!({ "width": 640, "height": 480 });
    let mut harness = HarnessBuilder::new()
        .metadata(metadata)
        .build(&rig)
        .unwrap();
    harness.pipeline.on_resume().unwrap();
    assert_eq!(rig.facing(), Some(CameraFacing::Front));
    assert_eq!(rig.target_resolution(), Some(Size::new(640, 480)));
}

#[test]
fn test_permission_denied_then_granted() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new()
        .permission_pending()
        .build(&rig)
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::AwaitingPermission);

    harness
        .pipeline
        .on_request_permissions_result(
            CAMERA_PERMISSION_REQUEST_CODE,
            &camera_permission(),
            &[PERMISSION_DENIED],
        )
        .unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::AwaitingPermission);
    assert_eq!(rig.factory_calls(), 0);

    harness
        .pipeline
        .on_request_permissions_result(
            CAMERA_PERMISSION_REQUEST_CODE,
            &camera_permission(),
            &[PERMISSION_GRANTED],
        )
        .unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::CameraStarting);
    assert_eq!(rig.starts(), 1);
}

#[test]
fn test_grant_while_paused_starts_on_resume() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new()
        .permission_pending()
        .build(&rig)
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    // The permission prompt suspends the host
    harness.pipeline.on_pause().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::Paused);

    harness
        .pipeline
        .on_request_permissions_result(
            CAMERA_PERMISSION_REQUEST_CODE,
            &camera_permission(),
            &[PERMISSION_GRANTED],
        )
        .unwrap();
    assert_eq!(rig.factory_calls(), 0);

    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::CameraStarting);
    assert_eq!(rig.starts(), 1);
}

#[test]
fn test_first_frame_while_paused() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    harness.show_surface(1280, 720).unwrap();
    harness.pipeline.on_pause().unwrap();

    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    assert!(harness.view.is_visible());
    assert_eq!(harness.pipeline.state(), PipelineState::Paused);
    assert_eq!(harness.pipeline.geometry_recomputations(), 0);

    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.state(), PipelineState::Running);
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);
}

#[test]
fn test_synchronous_start_failure_is_not_retried() {
    let rig = CameraRig::failing(BackendError::DeviceNotFound("back".into()));
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    let result = harness.pipeline.on_resume();
    assert!(matches!(
        result,
        Err(AppError::Camera(BackendError::DeviceNotFound(_)))
    ));
    assert_eq!(harness.pipeline.state(), PipelineState::CameraStarting);

    harness.pipeline.on_pause().unwrap();
    harness.pipeline.on_resume().unwrap();
    assert_eq!(rig.factory_calls(), 1);
    assert_eq!(rig.starts(), 1);
}

#[test]
fn test_asynchronous_start_failure_surfaces_on_dispatch() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();
    harness.pipeline.on_resume().unwrap();

    rig.fail_start(BackendError::StartFailed("sensor busy".into()));
    assert_eq!(
        harness.pipeline.dispatch_pending().unwrap_err().to_string(),
        "Camera error: Camera failed to start: sensor busy"
    );
    assert!(!harness.view.is_visible());
}

#[test]
fn test_surface_destroyed_suppresses_geometry() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);

    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Destroyed)
        .unwrap();
    assert!(!harness.pipeline.surface_bound());
    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Changed {
            format: 1,
            width: 720,
            height: 1280,
        })
        .unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);

    harness.show_surface(720, 1280).unwrap();
    assert!(harness.pipeline.surface_bound());
    assert_eq!(harness.pipeline.geometry_recomputations(), 2);
}

#[test]
fn test_zero_size_change_unbinds_surface() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();
    harness.pipeline.on_resume().unwrap();
    harness.show_surface(1280, 720).unwrap();
    assert!(harness.pipeline.surface_bound());

    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Changed {
            format: 1,
            width: 0,
            height: 720,
        })
        .unwrap();
    assert!(!harness.pipeline.surface_bound());
}

#[test]
fn test_dropped_surface_is_a_noop() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();

    // The windowing system frees the buffer before reporting it
    let surface = std::mem::replace(
        &mut harness.surface,
        Arc::new(MemorySurface::new()),
    );
    drop(surface);

    assert!(rig.publish(0));
    harness.pipeline.on_pause().unwrap();
    assert_eq!(harness.graph().stats().stale_surface_writes, 1);
}

#[test]
fn test_fit_aspect_policy_letterboxes_view() {
    let rig = CameraRig::new(Size::new(1920, 1080), SensorRotation::Rotate90);
    let mut harness = HarnessBuilder::new()
        .view_size_policy(FitAspect::new(Size::new(9, 16)))
        .build(&rig)
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1080, 1080).unwrap();

    let geometry = harness.pipeline.geometry().unwrap();
    assert_eq!(geometry.surface.size(), Size::new(607, 1080));
    assert_eq!(geometry.display, Size::new(1079, 607));
    assert_eq!(geometry.output, Size::new(607, 1079));
}

#[test]
fn test_destroy_mid_frame() {
    let mut harness = HarnessBuilder::new()
        .build_with(Box::new(|| {
            Box::new(
                SyntheticCamera::new()
                    .with_sensor_size(Size::new(64, 48))
                    .with_framerate(0),
            ) as Box<dyn CameraSession>
        }))
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    harness.show_surface(64, 48).unwrap();
    wait_for_state(&mut harness.pipeline, PipelineState::Running);

    // Let frames flow while the camera thread is delivering
    while harness.pipeline.gpu_stats().frames_converted < 10 {
        std::thread::yield_now();
    }

    harness.pipeline.on_destroy();
    assert_eq!(harness.pipeline.state(), PipelineState::Destroyed);
    let recomputations = harness.pipeline.geometry_recomputations();

    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Changed {
            format: 1,
            width: 32,
            height: 24,
        })
        .unwrap();
    harness.pipeline.on_resume().unwrap();
    harness.pipeline.on_pause().unwrap();
    assert_eq!(harness.pipeline.dispatch_pending().unwrap(), 0);

    assert_eq!(harness.pipeline.geometry_recomputations(), recomputations);
    assert_eq!(harness.pipeline.state(), PipelineState::Destroyed);
    assert_eq!(harness.pipeline.gpu_stats().open_converters, 0);
    assert!(!harness.pipeline.surface_bound());
}

#[test]
fn test_new_surface_waits_for_its_own_size() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new().build(&rig).unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);
    harness.pipeline.on_pause().unwrap();

    // Replacement surface reported without the old one being destroyed
    let replacement: Arc<dyn OutputSurface> = Arc::new(MemorySurface::new());
    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Created(Arc::downgrade(&replacement)))
        .unwrap();
    harness.pipeline.on_resume().unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 1);
    assert_eq!(harness.pipeline.converter_output_size(), None);

    harness
        .pipeline
        .on_surface_event(SurfaceEvent::Changed {
            format: 1,
            width: 720,
            height: 1280,
        })
        .unwrap();
    assert_eq!(harness.pipeline.geometry_recomputations(), 2);
    assert_eq!(
        harness.pipeline.converter_output_size(),
        Some(Size::new(720, 405))
    );
}

/// Graph whose frame processing takes the GPU worker down with it
struct CrashingGraph {
    spec: GraphSpec,
}

impl ProcessingGraph for CrashingGraph {
    fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    fn bind_output_surface(&self, _surface: Option<Weak<dyn OutputSurface>>) {}

    fn set_output_flip_vertical(&self, _flip: bool) {}

    fn register_input_source(&self, _source: InputSource) {}

    fn on_packet(&self, _channel: &str, _handler: PacketHandler) {}

    fn process_frame(&self, texture: FrameTexture) {
        panic!("graph crashed on frame {}", texture.sequence);
    }
}

#[test]
fn test_pause_reaches_paused_when_converter_close_fails() {
    let rig = CameraRig::new(Size::new(1280, 720), SensorRotation::None);
    let mut harness = HarnessBuilder::new()
        .graph_factory(Box::new(|spec, _context| {
            Ok(Arc::new(CrashingGraph { spec: spec.clone() }) as Arc<dyn ProcessingGraph>)
        }))
        .build(&rig)
        .unwrap();

    harness.pipeline.on_resume().unwrap();
    rig.deliver_first_frame();
    harness.pipeline.dispatch_pending().unwrap();
    harness.show_surface(1280, 720).unwrap();
    assert!(!rig.publish(0), "the frame is lost with the GPU worker");

    let result = harness.pipeline.on_pause();
    assert!(matches!(result, Err(AppError::Gpu(GpuError::WorkerGone))));
    assert_eq!(harness.pipeline.state(), PipelineState::Paused);
    assert_eq!(harness.pipeline.converter_id(), None);

    harness.pipeline.on_destroy();
    assert_eq!(harness.pipeline.state(), PipelineState::Destroyed);
}
