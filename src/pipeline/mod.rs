// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline coordinator
//!
//! Drives the camera → converter → graph → surface pipeline through the host's
//! lifecycle. All methods run on the host thread; camera notifications are
//! queued into an inbox and applied by [`PipelineCoordinator::dispatch_pending`].
//!
//! ```text
//! Created ─► AwaitingPermission ─► CameraStarting ─► Running
//!                  │                     │              │
//!                  └─────────────────────┴──────────────┴─► Paused ─► (resume)
//!
//! any state ─► Destroyed
//! ```
//!
//! The camera is started at most once. Every resume opens a fresh texture
//! converter and attaches it to the camera texture that already exists, so
//! at most one converter is open at a time.

pub mod diagnostics;
pub mod geometry;

pub use diagnostics::{DiagnosticsStats, LandmarkLogger, describe_landmarks};
pub use geometry::{FitAspect, IdentityViewSize, ResolvedGeometry, ViewSizePolicy};

use crate::backends::camera::{BackendError, CameraFactory, CameraSession, CameraTexture, Size};
use crate::backends::permission::PermissionCollaborator;
use crate::config::PipelineConfig;
use crate::errors::{AppError, AppResult};
use crate::gpu::{ConverterId, GpuContextManager, GpuStatsSnapshot, TextureConverter};
use crate::graph::{GraphFactory, ProcessingGraph};
use crate::surface::{PreviewView, SurfaceBinding, SurfaceEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Lifecycle state of a [`PipelineCoordinator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// GPU context and graph exist; no camera access yet
    Created,
    /// Waiting for the camera permission to be granted
    AwaitingPermission,
    /// Camera started, first frame not seen yet
    CameraStarting,
    Running,
    /// Suspended by the host; the converter is closed
    Paused,
    /// Terminal
    Destroyed,
}

/// Notifications posted by the camera's delivery thread
enum CameraEvent {
    FirstFrame(CameraTexture),
    StartFailed(BackendError),
}

/// Host-provided pieces the coordinator is built from
pub struct Collaborators {
    pub permissions: Box<dyn PermissionCollaborator>,
    pub camera_factory: CameraFactory,
    pub graph_factory: GraphFactory,
    pub preview_view: Arc<dyn PreviewView>,
    pub view_size_policy: Box<dyn ViewSizePolicy>,
}

impl Collaborators {
    pub fn new(
        permissions: Box<dyn PermissionCollaborator>,
        camera_factory: CameraFactory,
        graph_factory: GraphFactory,
        preview_view: Arc<dyn PreviewView>,
    ) -> Self {
        Self {
            permissions,
            camera_factory,
            graph_factory,
            preview_view,
            view_size_policy: Box::new(IdentityViewSize),
        }
    }

    pub fn with_view_size_policy(mut self, policy: impl ViewSizePolicy + 'static) -> Self {
        self.view_size_policy = Box::new(policy);
        self
    }
}

pub struct PipelineCoordinator {
    id: Uuid,
    config: PipelineConfig,
    state: PipelineState,
    gpu: GpuContextManager,
    graph: Arc<dyn ProcessingGraph>,
    permissions: Box<dyn PermissionCollaborator>,
    camera_factory: CameraFactory,
    camera: Option<Box<dyn CameraSession>>,
    camera_texture: Option<CameraTexture>,
    converter: Option<TextureConverter>,
    preview_view: Arc<dyn PreviewView>,
    surface: SurfaceBinding,
    view_size_policy: Box<dyn ViewSizePolicy>,
    /// Last view size reported by a live surface
    view_size: Option<Size>,
    geometry: Option<ResolvedGeometry>,
    geometry_passes: u64,
    diagnostics: Option<LandmarkLogger>,
    events_tx: mpsc::UnboundedSender<CameraEvent>,
    events_rx: mpsc::UnboundedReceiver<CameraEvent>,
}

impl PipelineCoordinator {
    /// Build the GPU context and graph, then ask for camera permission
    ///
    /// No camera is touched here. The pipeline ends in
    /// [`PipelineState::AwaitingPermission`] until it is resumed.
    pub fn create(config: PipelineConfig, collaborators: Collaborators) -> AppResult<Self> {
        let Collaborators {
            mut permissions,
            camera_factory,
            graph_factory,
            preview_view,
            view_size_policy,
        } = collaborators;

        let id = Uuid::new_v4();
        let gpu = GpuContextManager::new()?;
        let graph =
            graph_factory(&config.graph_spec(), gpu.native_context()).map_err(AppError::Graph)?;
        graph.set_output_flip_vertical(config.flip_frames_vertically);

        let diagnostics = if config.verbose_diagnostics {
            let logger = LandmarkLogger::spawn(config.landmarks_channel.clone())
                .map_err(|e| AppError::Diagnostics(e.to_string()))?;
            graph.on_packet(logger.channel(), logger.handler());
            Some(logger)
        } else {
            None
        };

        preview_view.set_visible(false);

        info!(
            pipeline = %id,
            graph = %config.graph_id,
            facing = %config.camera_facing,
            verbose = config.verbose_diagnostics,
            "Pipeline created"
        );

        permissions.check_and_request();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut pipeline = Self {
            id,
            config,
            state: PipelineState::Created,
            gpu,
            graph,
            permissions,
            camera_factory,
            camera: None,
            camera_texture: None,
            converter: None,
            preview_view,
            surface: SurfaceBinding::default(),
            view_size_policy,
            view_size: None,
            geometry: None,
            geometry_passes: 0,
            diagnostics,
            events_tx,
            events_rx,
        };

        pipeline.set_state(PipelineState::AwaitingPermission);
        Ok(pipeline)
    }

    /// Resolve the configuration from host metadata and create the pipeline
    pub fn from_metadata(
        metadata: &serde_json::Value,
        collaborators: Collaborators,
    ) -> AppResult<Self> {
        let config = PipelineConfig::from_metadata(metadata)?;
        Self::create(config, collaborators)
    }

    /// Host resumed: open a new converter and bring the camera up
    pub fn on_resume(&mut self) -> AppResult<()> {
        if self.state == PipelineState::Destroyed {
            return Ok(());
        }
        if self.converter.is_some() {
            debug!(pipeline = %self.id, "Resume while already active ignored");
            return Ok(());
        }

        let converter = TextureConverter::open(
            self.gpu.handle(),
            self.config.converter_flip_frames_vertically,
            Arc::clone(&self.graph),
        )?;
        self.graph.register_input_source(converter.input_source());
        self.converter = Some(converter);

        self.advance()
    }

    /// Host suspended: close the converter and wait for the GPU to release it
    pub fn on_pause(&mut self) -> AppResult<()> {
        match self.state {
            PipelineState::AwaitingPermission
            | PipelineState::CameraStarting
            | PipelineState::Running => {}
            _ => return Ok(()),
        }

        let closed = match self.converter.take() {
            Some(mut converter) => converter.close().map(|_| ()),
            None => Ok(()),
        };
        self.set_state(PipelineState::Paused);
        closed.map_err(AppError::from)
    }

    /// Forward a permission result and start the camera once granted
    pub fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[i32],
    ) -> AppResult<()> {
        if self.state == PipelineState::Destroyed {
            return Ok(());
        }

        self.permissions
            .on_request_permissions_result(request_code, permissions, grant_results);

        if self.state == PipelineState::AwaitingPermission
            && self.converter.is_some()
            && self.permissions.is_granted()
        {
            self.start_camera()?;
        }
        Ok(())
    }

    /// Apply camera notifications queued since the last call
    ///
    /// Returns the number of notifications applied. An asynchronous camera
    /// start failure is returned as an error; it is not retried.
    pub fn dispatch_pending(&mut self) -> AppResult<usize> {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            applied += 1;
            if self.state == PipelineState::Destroyed {
                continue;
            }

            match event {
                CameraEvent::FirstFrame(texture) => self.on_first_frame(texture)?,
                CameraEvent::StartFailed(e) => {
                    warn!(pipeline = %self.id, error = %e, "Camera failed to start");
                    return Err(AppError::Camera(e));
                }
            }
        }
        Ok(applied)
    }

    /// Apply a display surface lifecycle notification
    pub fn on_surface_event(&mut self, event: SurfaceEvent) -> AppResult<()> {
        if self.state == PipelineState::Destroyed {
            trace!(?event, "Surface event after destroy ignored");
            return Ok(());
        }

        match event {
            SurfaceEvent::Created(surface) => {
                debug!(pipeline = %self.id, "Display surface created");
                // A new surface has no size until its first change
                self.view_size = None;
                self.surface.bind(surface.clone());
                self.graph.bind_output_surface(Some(surface));
                Ok(())
            }
            SurfaceEvent::Changed { width, height, .. } if width == 0 || height == 0 => {
                debug!(pipeline = %self.id, "Display surface collapsed to zero size");
                self.unbind_surface();
                Ok(())
            }
            SurfaceEvent::Changed {
                format,
                width,
                height,
            } => {
                if !self.surface.is_bound() {
                    debug!(width, height, "Change for an unbound surface ignored");
                    return Ok(());
                }
                let view = self.view_size_policy.view_size(Size::new(width, height));
                debug!(format, %view, "Display surface changed");
                self.view_size = Some(view);
                self.apply_geometry()
            }
            SurfaceEvent::Destroyed => {
                debug!(pipeline = %self.id, "Display surface destroyed");
                self.unbind_surface();
                Ok(())
            }
        }
    }

    /// Tear everything down; later calls are no-ops
    pub fn on_destroy(&mut self) {
        if self.state == PipelineState::Destroyed {
            return;
        }

        if let Some(mut converter) = self.converter.take()
            && let Err(e) = converter.close()
        {
            warn!(pipeline = %self.id, error = %e, "Failed to close converter");
        }
        if let Some(mut camera) = self.camera.take() {
            camera.stop();
        }
        self.camera_texture = None;
        self.unbind_surface();
        self.gpu.shutdown();
        if let Some(diagnostics) = self.diagnostics.as_mut() {
            diagnostics.shutdown();
        }
        while self.events_rx.try_recv().is_ok() {}

        self.set_state(PipelineState::Destroyed);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gpu_stats(&self) -> GpuStatsSnapshot {
        self.gpu.stats()
    }

    /// `None` unless verbose diagnostics are enabled
    pub fn diagnostics_stats(&self) -> Option<DiagnosticsStats> {
        self.diagnostics.as_ref().map(LandmarkLogger::stats)
    }

    /// Most recently applied geometry
    pub fn geometry(&self) -> Option<ResolvedGeometry> {
        self.geometry
    }

    /// Number of geometry passes applied to a converter
    pub fn geometry_recomputations(&self) -> u64 {
        self.geometry_passes
    }

    pub fn surface_bound(&self) -> bool {
        self.surface.is_bound()
    }

    pub fn camera_started(&self) -> bool {
        self.camera.is_some()
    }

    pub fn converter_id(&self) -> Option<ConverterId> {
        self.converter.as_ref().map(TextureConverter::id)
    }

    pub fn converter_output_size(&self) -> Option<Size> {
        self.converter.as_ref().and_then(TextureConverter::output_size)
    }

    /// Move to the furthest state reachable with what exists so far
    fn advance(&mut self) -> AppResult<()> {
        if self.camera_texture.is_some() {
            self.apply_geometry()?;
            self.set_state(PipelineState::Running);
        } else if self.camera.is_some() {
            self.set_state(PipelineState::CameraStarting);
        } else if self.permissions.is_granted() {
            self.start_camera()?;
        } else {
            self.set_state(PipelineState::AwaitingPermission);
        }
        Ok(())
    }

    fn start_camera(&mut self) -> AppResult<()> {
        if self.camera.is_some() {
            return Ok(());
        }

        let mut camera = (self.camera_factory)();
        let first_frame = self.events_tx.clone();
        camera.on_first_frame(Box::new(move |texture| {
            let _ = first_frame.send(CameraEvent::FirstFrame(texture));
        }));
        let start_failed = self.events_tx.clone();
        camera.on_start_failed(Box::new(move |e| {
            let _ = start_failed.send(CameraEvent::StartFailed(e));
        }));

        let result = camera.start(self.config.camera_facing, self.config.target_resolution);
        self.camera = Some(camera);
        self.set_state(PipelineState::CameraStarting);

        result.map_err(|e| {
            warn!(pipeline = %self.id, error = %e, "Camera start rejected");
            AppError::Camera(e)
        })
    }

    fn on_first_frame(&mut self, texture: CameraTexture) -> AppResult<()> {
        info!(pipeline = %self.id, texture = texture.id(), "Camera delivered first frame");
        self.camera_texture = Some(texture);
        self.preview_view.set_visible(true);

        if self.state == PipelineState::CameraStarting {
            self.apply_geometry()?;
            self.set_state(PipelineState::Running);
        }
        Ok(())
    }

    /// Retarget the converter to the current view size, if everything needed
    /// is in place; otherwise the pass runs once it is
    fn apply_geometry(&mut self) -> AppResult<()> {
        let (Some(view), Some(camera), Some(texture), Some(converter)) = (
            self.view_size,
            self.camera.as_deref(),
            self.camera_texture.as_ref(),
            self.converter.as_mut(),
        ) else {
            trace!(pipeline = %self.id, "Geometry pass deferred");
            return Ok(());
        };

        let resolved = geometry::resolve(camera, view);
        if resolved.output.is_empty() {
            warn!(%view, display = %resolved.display, "Camera produced an empty display size");
            return Ok(());
        }

        converter.set_surface_texture(texture, resolved.output)?;
        debug!(
            pipeline = %self.id,
            %view,
            display = %resolved.display,
            output = %resolved.output,
            rotation = %resolved.surface.rotation,
            "Converter geometry applied"
        );

        self.geometry = Some(resolved);
        self.geometry_passes += 1;
        Ok(())
    }

    fn unbind_surface(&mut self) {
        self.surface.clear();
        self.graph.bind_output_surface(None);
        self.view_size = None;
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state != state {
            info!(pipeline = %self.id, from = ?self.state, to = ?state, "Pipeline state changed");
            self.state = state;
        }
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        self.on_destroy();
    }
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("converter", &self.converter_id())
            .field("surface", &self.surface)
            .field("geometry", &self.geometry)
            .finish()
    }
}
