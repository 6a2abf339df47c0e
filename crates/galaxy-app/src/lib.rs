//! Galaxy viewer application.
//!
//! Window creation, event handling, orbit camera controls and the frame loop
//! that feeds LOD updates into the layered compositor.

pub mod frame_stats;
pub mod orbit_controls;
pub mod platform;
pub mod window;

pub use window::{AppError, GalaxyApp, run};
