//! Procedurally placed stars and haze sprites.

use galaxy_render::DrawableId;
use glam::Vec3;

/// What an object is. Decides its layer and how LOD treats it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// A star of the given category in the star-type table.
    Star { type_index: usize },
    /// A diffuse gas sprite.
    Haze,
}

/// Index of an object inside its [`Galaxy`](crate::Galaxy).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub usize);

/// A placed object and its per-frame visual state.
#[derive(Clone, Debug, PartialEq)]
pub struct CelestialObject {
    position: Vec3,
    pub kind: ObjectKind,
    /// Star size from the type table, or the randomised haze size.
    pub base_size: f32,
    /// Scene handle while attached. Not owned; the scene owns the drawable.
    pub render: Option<DrawableId>,
    pub scale: f32,
    pub opacity: f32,
}

impl CelestialObject {
    pub fn new(position: Vec3, kind: ObjectKind, base_size: f32) -> Self {
        Self {
            position,
            kind,
            base_size,
            render: None,
            scale: base_size,
            opacity: 1.0,
        }
    }

    /// Fixed at creation.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_attached(&self) -> bool {
        self.render.is_some()
    }
}
