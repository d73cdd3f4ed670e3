// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission collaborator
//!
//! The permission prompt itself lives outside the pipeline. The coordinator
//! asks once at creation, polls [`PermissionCollaborator::is_granted`] on
//! resume, and forwards the host's raw permission-result parameters verbatim.

use crate::constants::CAMERA_PERMISSION;
use tracing::{debug, info};

/// Grant result value for a granted permission
pub const PERMISSION_GRANTED: i32 = 0;

/// Grant result value for a denied permission
pub const PERMISSION_DENIED: i32 = -1;

pub trait PermissionCollaborator: Send {
    /// Check the permission and prompt the user if it is missing
    fn check_and_request(&mut self);

    fn is_granted(&self) -> bool;

    /// Raw result of a permission request, exactly as the host received it
    fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[i32],
    );
}

/// Permission state held in memory
///
/// Grants when a result arrives that lists the camera permission as granted.
#[derive(Debug, Clone, Default)]
pub struct StaticPermission {
    granted: bool,
    requests: u32,
}

impl StaticPermission {
    /// Permission already granted before the pipeline starts
    pub fn granted() -> Self {
        Self {
            granted: true,
            requests: 0,
        }
    }

    /// Permission not granted until a result grants it
    pub fn pending() -> Self {
        Self::default()
    }

    /// Number of prompts shown so far
    pub fn request_count(&self) -> u32 {
        self.requests
    }
}

impl PermissionCollaborator for StaticPermission {
    fn check_and_request(&mut self) {
        if self.granted {
            debug!("Camera permission already granted");
            return;
        }
        self.requests += 1;
        info!(requests = self.requests, "Requesting camera permission");
    }

    fn is_granted(&self) -> bool {
        self.granted
    }

    fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[i32],
    ) {
        let camera_granted = permissions
            .iter()
            .zip(grant_results)
            .any(|(name, result)| name == CAMERA_PERMISSION && *result == PERMISSION_GRANTED);

        info!(request_code, granted = camera_granted, "Camera permission result");
        self.granted = self.granted || camera_granted;
    }
}
