// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use lookandtell::backends::camera::{
    BackendError, BackendResult, CameraFacing, CameraSession, CameraSessionState, CameraTexture,
    FirstFrameCallback, RawFrame, SensorRotation, Size, StartFailedCallback, fit_display_size,
};
use lookandtell::backends::permission::StaticPermission;
use lookandtell::errors::AppResult;
use lookandtell::graph::{GraphFactory, PassthroughGraph, ProcessingGraph};
use lookandtell::pipeline::{Collaborators, PipelineCoordinator, PipelineState, ViewSizePolicy};
use lookandtell::surface::{HeadlessView, MemorySurface, OutputSurface, SurfaceEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Camera state shared between the test and the session the pipeline owns
pub struct CameraRig {
    sensor: Size,
    rotation: SensorRotation,
    start_error: Option<BackendError>,
    texture: CameraTexture,
    factory_calls: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    facing: Mutex<Option<CameraFacing>>,
    target_resolution: Mutex<Option<Size>>,
    first_frame: Mutex<Option<FirstFrameCallback>>,
    start_failed: Mutex<Option<StartFailedCallback>>,
}

impl CameraRig {
    pub fn new(sensor: Size, rotation: SensorRotation) -> Arc<Self> {
        Arc::new(Self::build(sensor, rotation, None))
    }

    /// `start` itself will return `error`
    pub fn failing(error: BackendError) -> Arc<Self> {
        Arc::new(Self::build(
            Size::new(1280, 720),
            SensorRotation::None,
            Some(error),
        ))
    }

    fn build(sensor: Size, rotation: SensorRotation, start_error: Option<BackendError>) -> Self {
        Self {
            sensor,
            rotation,
            start_error,
            texture: CameraTexture::new(),
            factory_calls: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            facing: Mutex::new(None),
            target_resolution: Mutex::new(None),
            first_frame: Mutex::new(None),
            start_failed: Mutex::new(None),
        }
    }

    pub fn factory_calls(&self) -> usize {
        self.factory_calls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn facing(&self) -> Option<CameraFacing> {
        *self.facing.lock().unwrap()
    }

    pub fn target_resolution(&self) -> Option<Size> {
        *self.target_resolution.lock().unwrap()
    }

    pub fn texture(&self) -> CameraTexture {
        self.texture.clone()
    }

    /// Fire the first-frame notification, as the camera thread would
    pub fn deliver_first_frame(&self) {
        let callback = self.first_frame.lock().unwrap().take();
        let callback = callback.expect("first-frame callback not registered or already fired");
        callback(self.texture.clone());
    }

    /// Fire the asynchronous start-failure notification
    pub fn fail_start(&self, error: BackendError) {
        let callback = self.start_failed.lock().unwrap().take();
        let callback = callback.expect("start-failed callback not registered");
        callback(error);
    }

    /// Write one frame into the camera texture; `false` if it was dropped
    pub fn publish(&self, sequence: u64) -> bool {
        self.texture.publish(RawFrame {
            width: self.sensor.width,
            height: self.sensor.height,
            data: Arc::from(vec![0u8; 16]),
            sequence,
            timestamp_ns: sequence * 33_333_333,
            captured_at: Instant::now(),
        })
    }
}

/// Session handed to the pipeline; everything it sees lands in the rig
pub struct ManualCamera {
    rig: Arc<CameraRig>,
    state: CameraSessionState,
}

impl CameraSession for ManualCamera {
    fn start(&mut self, facing: CameraFacing, target_resolution: Option<Size>) -> BackendResult<()> {
        self.rig.starts.fetch_add(1, Ordering::SeqCst);
        *self.rig.facing.lock().unwrap() = Some(facing);
        *self.rig.target_resolution.lock().unwrap() = target_resolution;

        if let Some(error) = &self.rig.start_error {
            self.state = CameraSessionState::Stopped;
            return Err(error.clone());
        }
        self.state = CameraSessionState::Starting;
        Ok(())
    }

    fn on_first_frame(&mut self, callback: FirstFrameCallback) {
        *self.rig.first_frame.lock().unwrap() = Some(callback);
    }

    fn on_start_failed(&mut self, callback: StartFailedCallback) {
        *self.rig.start_failed.lock().unwrap() = Some(callback);
    }

    fn compute_display_size(&self, view_size: Size) -> Size {
        fit_display_size(self.rig.sensor, view_size, self.is_rotated())
    }

    fn is_rotated(&self) -> bool {
        self.rig.rotation.swaps_dimensions()
    }

    fn sensor_rotation(&self) -> SensorRotation {
        self.rig.rotation
    }

    fn state(&self) -> CameraSessionState {
        self.state
    }

    fn stop(&mut self) {
        self.rig.stops.fetch_add(1, Ordering::SeqCst);
        self.state = CameraSessionState::Stopped;
    }
}

/// A pipeline plus every collaborator a test may want to inspect
pub struct Harness {
    pub pipeline: PipelineCoordinator,
    pub view: Arc<HeadlessView>,
    pub surface: Arc<MemorySurface>,
    pub graph: Arc<OnceLock<Arc<PassthroughGraph>>>,
}

impl Harness {
    pub fn graph(&self) -> Arc<PassthroughGraph> {
        Arc::clone(self.graph.get().expect("graph not constructed"))
    }

    /// Bind the memory surface and report its size
    pub fn show_surface(&mut self, width: u32, height: u32) -> AppResult<()> {
        let output: Arc<dyn OutputSurface> = self.surface.clone();
        self.pipeline
            .on_surface_event(SurfaceEvent::Created(Arc::downgrade(&output)))?;
        self.pipeline.on_surface_event(SurfaceEvent::Changed {
            format: 1,
            width,
            height,
        })
    }
}

pub fn metadata() -> serde_json::Value {
    serde_json::json!({
        "graphId": "hand_tracking_mobile_gpu.binarypb",
        "inputStreamName": "input_video",
        "outputStreamName": "output_video",
    })
}

pub struct HarnessBuilder {
    metadata: serde_json::Value,
    granted: bool,
    policy: Option<Box<dyn FnOnce(Collaborators) -> Collaborators>>,
    graph_factory: Option<GraphFactory>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            metadata: metadata(),
            granted: true,
            policy: None,
            graph_factory: None,
        }
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn permission_pending(mut self) -> Self {
        self.granted = false;
        self
    }

    pub fn view_size_policy(mut self, policy: impl ViewSizePolicy + 'static) -> Self {
        self.policy = Some(Box::new(move |collaborators: Collaborators| {
            collaborators.with_view_size_policy(policy)
        }));
        self
    }

    /// Replace the passthrough graph; [`Harness::graph`] is then unavailable
    pub fn graph_factory(mut self, factory: GraphFactory) -> Self {
        self.graph_factory = Some(factory);
        self
    }

    /// Build against the manual camera behind `rig`
    pub fn build(self, rig: &Arc<CameraRig>) -> AppResult<Harness> {
        let rig = Arc::clone(rig);
        self.build_with(Box::new(move || {
            rig.factory_calls.fetch_add(1, Ordering::SeqCst);
            Box::new(ManualCamera {
                rig: Arc::clone(&rig),
                state: CameraSessionState::Uninitialized,
            }) as Box<dyn CameraSession>
        }))
    }

    /// Build against any camera factory
    pub fn build_with(
        self,
        camera_factory: Box<dyn FnMut() -> Box<dyn CameraSession>>,
    ) -> AppResult<Harness> {
        let view = Arc::new(HeadlessView::new());
        let surface = Arc::new(MemorySurface::new());
        let graph: Arc<OnceLock<Arc<PassthroughGraph>>> = Arc::new(OnceLock::new());

        let permissions = if self.granted {
            StaticPermission::granted()
        } else {
            StaticPermission::pending()
        };

        let slot = Arc::clone(&graph);
        let graph_factory = self.graph_factory.unwrap_or_else(|| {
            Box::new(move |spec, context| {
                let built = Arc::new(PassthroughGraph::new(spec.clone(), context));
                let _ = slot.set(Arc::clone(&built));
                Ok(built as Arc<dyn ProcessingGraph>)
            })
        });
        let mut collaborators = Collaborators::new(
            Box::new(permissions),
            camera_factory,
            graph_factory,
            view.clone(),
        );
        if let Some(policy) = self.policy {
            collaborators = policy(collaborators);
        }

        let pipeline = PipelineCoordinator::from_metadata(&self.metadata, collaborators)?;
        Ok(Harness {
            pipeline,
            view,
            surface,
            graph,
        })
    }
}

/// Dispatch camera notifications until `state` is reached
pub fn wait_for_state(pipeline: &mut PipelineCoordinator, state: PipelineState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.state() != state {
        pipeline.dispatch_pending().unwrap();
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {:?}, still {:?}",
            state,
            pipeline.state()
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}
