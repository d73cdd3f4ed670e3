// SPDX-License-Identifier: GPL-3.0-only

//! Surface geometry resolution
//!
//! Maps the pixel size reported for the display surface to the size the
//! texture converter should produce:
//!
//! ```text
//! surface size ─► ViewSizePolicy ─► view size
//! view size ─► CameraSession::compute_display_size ─► display size
//! display size ─► swap if the sensor is rotated ─► converter output
//! ```

use crate::backends::camera::{CameraSession, Size};
use crate::surface::SurfaceGeometry;

/// Chooses the view size from the surface's reported pixel size
pub trait ViewSizePolicy: Send {
    fn view_size(&self, surface: Size) -> Size;
}

/// Uses the surface size unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityViewSize;

impl ViewSizePolicy for IdentityViewSize {
    fn view_size(&self, surface: Size) -> Size {
        surface
    }
}

/// Letterboxes the view to a fixed aspect ratio inside the surface
#[derive(Debug, Clone, Copy)]
pub struct FitAspect {
    aspect: Size,
}

impl FitAspect {
    /// `aspect` is a width:height ratio, e.g. `Size::new(9, 16)`
    pub fn new(aspect: Size) -> Self {
        Self { aspect }
    }
}

impl ViewSizePolicy for FitAspect {
    fn view_size(&self, surface: Size) -> Size {
        if self.aspect.is_empty() || surface.is_empty() {
            return surface;
        }

        // Compare w/h ratios with integer cross-multiplication
        let surface_wide = surface.width as u64 * self.aspect.height as u64;
        let aspect_wide = self.aspect.width as u64 * surface.height as u64;

        if surface_wide > aspect_wide {
            let width = surface.height as u64 * self.aspect.width as u64 / self.aspect.height as u64;
            Size::new(width as u32, surface.height)
        } else {
            let height = surface.width as u64 * self.aspect.height as u64 / self.aspect.width as u64;
            Size::new(surface.width, height as u32)
        }
    }
}

/// Converter output for a display size: swapped when the camera is rotated
pub fn resolve_output_size(display: Size, rotated: bool) -> Size {
    if rotated { display.swapped() } else { display }
}

/// Outcome of one geometry pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGeometry {
    /// View size after the policy, with the sensor rotation
    pub surface: SurfaceGeometry,
    /// Camera display size, in sensor orientation
    pub display: Size,
    /// Size the converter renders at
    pub output: Size,
}

/// Run the full resolution for one view size
pub fn resolve(camera: &dyn CameraSession, view: Size) -> ResolvedGeometry {
    let display = camera.compute_display_size(view);
    let output = resolve_output_size(display, camera.is_rotated());
    ResolvedGeometry {
        surface: SurfaceGeometry {
            width: view.width,
            height: view.height,
            rotation: camera.sensor_rotation(),
        },
        display,
        output,
    }
}
