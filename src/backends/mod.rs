// SPDX-License-Identifier: GPL-3.0-only

//! Collaborators at the hardware and host boundary
//!
//! - [`camera`]: camera session trait, camera texture slot, synthetic camera
//! - [`permission`]: camera permission collaborator

pub mod camera;
pub mod permission;
