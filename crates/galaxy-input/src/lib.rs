//! Pointer input for the galaxy viewer's orbit camera.

pub mod pointer;

pub use pointer::{PointerFrame, PointerState};
