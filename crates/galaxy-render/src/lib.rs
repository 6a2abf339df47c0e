//! Layered sprite rendering: render layers, camera, scene store, single-flight
//! texture loading, the bloom/overlay/base compositor and its wgpu backend.

pub mod backend;
pub mod bloom;
pub mod camera;
pub mod composite;
pub mod compositor;
pub mod gpu;
pub mod layer;
pub mod offscreen;
pub mod scene;
pub mod sprite;
pub mod targets;
pub mod texture;
pub mod texture_cache;

pub use backend::GpuBackend;
pub use bloom::{BloomConfig, BloomFilter};
pub use camera::{Camera, CameraUniform};
pub use composite::CompositePass;
pub use compositor::{
    CompositionPass, ControlIntegration, FrameOutcome, LayeredCompositor, RenderBackend,
};
pub use gpu::{AcquireError, RenderContext, RenderContextError, init_render_context_blocking};
pub use layer::{LayerMask, RenderLayer};
pub use scene::{
    DrawableId, DrawableStore, SceneGraph, SpriteDesc, TextureKey, linear_rgb_from_hex,
};
pub use sprite::{Fog, SpriteBatcher};
pub use targets::{Extent, TargetExtents, TargetId};
pub use texture::{SpriteTextures, TextureError};
pub use texture_cache::{
    ImageData, LoadState, ResourceError, ResourceLoader, SingleFlightCache, TextureCache,
    ThreadImageLoader,
};
