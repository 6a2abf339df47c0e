//! Scene graph capability and the sprite drawable store behind it.
//!
//! The space crate only sees [`SceneGraph`]; the renderer reads the
//! [`DrawableStore`] directly when it builds per-layer instance data.

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::layer::{LayerMask, RenderLayer};

/// Non-owning handle to a drawable. Stale handles are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableId {
    index: u32,
    generation: u32,
}

impl DrawableId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Interned sprite texture, issued by [`SceneGraph::register_texture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureKey(u32);

impl TextureKey {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Everything needed to create a billboard sprite.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteDesc {
    pub position: Vec3,
    /// Fixed for the lifetime of the drawable.
    pub layer: RenderLayer,
    /// Linear RGB tint.
    pub color: [f32; 3],
    pub scale: f32,
    pub opacity: f32,
    pub texture: TextureKey,
}

/// Convert a `0xRRGGBB` sRGB color to linear RGB.
pub fn linear_rgb_from_hex(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

/// Minimal scene interface used by whoever populates the scene.
pub trait SceneGraph {
    /// Intern a texture path. Registering the same path again returns the
    /// same key.
    fn register_texture(&mut self, path: &Path) -> TextureKey;

    /// Insert a drawable and return its handle.
    fn add_drawable(&mut self, desc: SpriteDesc) -> DrawableId;

    /// Remove a drawable. Returns `false` if the handle was stale.
    fn remove_drawable(&mut self, id: DrawableId) -> bool;

    /// Set the per-frame visual state. Returns `false` if the handle was stale.
    fn update_drawable(&mut self, id: DrawableId, scale: f32, opacity: f32) -> bool;
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    sprite: Option<SpriteDesc>,
}

/// Slot arena of sprites with a free list, plus the textures they use.
#[derive(Debug, Default)]
pub struct DrawableStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    textures: Vec<PathBuf>,
}

impl DrawableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live drawables.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Look up a live drawable.
    pub fn get(&self, id: DrawableId) -> Option<&SpriteDesc> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.sprite.as_ref())
    }

    /// Live drawables whose layer passes `mask`, in insertion-slot order.
    pub fn visible(&self, mask: LayerMask) -> impl Iterator<Item = &SpriteDesc> {
        self.slots
            .iter()
            .filter_map(|slot| slot.sprite.as_ref())
            .filter(move |sprite| mask.contains(sprite.layer))
    }

    /// Registered textures in key order.
    pub fn textures(&self) -> impl Iterator<Item = (TextureKey, &Path)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(index, path)| (TextureKey(index as u32), path.as_path()))
    }

    /// Count of live drawables on `layer`.
    pub fn count_on(&self, layer: RenderLayer) -> usize {
        self.visible(LayerMask::only(layer)).count()
    }

    fn slot_mut(&mut self, id: DrawableId) -> Option<&mut SpriteDesc> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.sprite.as_mut())
    }
}

impl SceneGraph for DrawableStore {
    fn register_texture(&mut self, path: &Path) -> TextureKey {
        if let Some(index) = self.textures.iter().position(|p| p == path) {
            return TextureKey(index as u32);
        }
        self.textures.push(path.to_path_buf());
        TextureKey(self.textures.len() as u32 - 1)
    }

    fn add_drawable(&mut self, desc: SpriteDesc) -> DrawableId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.sprite = Some(desc);
            return DrawableId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            sprite: Some(desc),
        });
        DrawableId {
            index,
            generation: 0,
        }
    }

    fn remove_drawable(&mut self, id: DrawableId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return false;
        };
        if slot.generation != id.generation || slot.sprite.is_none() {
            return false;
        }
        slot.sprite = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    fn update_drawable(&mut self, id: DrawableId, scale: f32, opacity: f32) -> bool {
        match self.slot_mut(id) {
            Some(sprite) => {
                sprite.scale = scale;
                sprite.opacity = opacity;
                true
            }
            None => false,
        }
    }
}
