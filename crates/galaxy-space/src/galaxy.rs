//! The galaxy aggregate: every placed object plus the scene handles that
//! draw them.

use std::path::{Path, PathBuf};

use galaxy_config::Config;
use galaxy_render::{SceneGraph, SpriteDesc, TextureKey, linear_rgb_from_hex};
use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::ConfigurationError;
use crate::lod::{LodParams, LodScaler};
use crate::object::{CelestialObject, ObjectId, ObjectKind};
use crate::placement::{Recipe, SpiralGalaxyLaw, place};
use crate::star_types::StarTypeTable;

/// Tint shared by all haze sprites.
pub const HAZE_COLOR: u32 = 0x0082ff;

/// Upper bound on haze sprites per star.
pub const MAX_HAZE_RATIO: f32 = 1.0;

/// Upper bound on generated stars.
pub const MAX_STAR_COUNT: u32 = 1_000_000;

/// Stars and haze of one procedurally generated galaxy.
///
/// Objects live in one `Vec`, stars first, and are addressed by [`ObjectId`].
pub struct Galaxy {
    objects: Vec<CelestialObject>,
    star_count: usize,
    star_types: StarTypeTable,
    lod: LodScaler,
    star_texture: PathBuf,
    haze_texture: PathBuf,
}

impl Galaxy {
    /// Generate a galaxy from configuration. Deterministic for a given seed.
    pub fn build(config: &Config) -> Result<Self, ConfigurationError> {
        let star_types = StarTypeTable::from_config(&config.star_types)?;
        let params = LodParams::from_config(&config.lod)?;
        let law = SpiralGalaxyLaw::from_config(&config.galaxy)?;

        let haze_ratio = config.galaxy.haze_ratio;
        if !(0.0..=MAX_HAZE_RATIO).contains(&haze_ratio) {
            return Err(ConfigurationError::OutOfRange {
                name: "galaxy.haze_ratio",
                value: haze_ratio,
                min: 0.0,
                max: MAX_HAZE_RATIO,
            });
        }
        if config.galaxy.star_count > MAX_STAR_COUNT {
            return Err(ConfigurationError::OutOfRange {
                name: "galaxy.star_count",
                value: config.galaxy.star_count as f32,
                min: 1.0,
                max: MAX_STAR_COUNT as f32,
            });
        }

        let star_count = config.galaxy.star_count as usize;
        let haze_count = (star_count as f32 * haze_ratio).round() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(config.galaxy.seed);

        let mut objects = place(Recipe::Stars(&star_types), star_count, &law, &mut rng)?;
        if haze_count > 0 {
            objects.extend(place(
                Recipe::Haze {
                    min: params.haze_min,
                    max: params.haze_max,
                    opacity: params.haze_opacity,
                },
                haze_count,
                &law,
                &mut rng,
            )?);
        }

        log::info!(
            "Built galaxy: {star_count} stars, {haze_count} haze sprites (seed {})",
            config.galaxy.seed
        );

        Ok(Self {
            objects,
            star_count,
            star_types,
            lod: LodScaler::new(params),
            star_texture: PathBuf::from(&config.assets.star_sprite),
            haze_texture: PathBuf::from(&config.assets.haze_sprite),
        })
    }

    /// Sprite textures the galaxy draws with.
    pub fn texture_paths(&self) -> [&Path; 2] {
        [self.star_texture.as_path(), self.haze_texture.as_path()]
    }

    /// Add a drawable for every object not yet in the scene.
    /// Returns how many were added.
    pub fn attach<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> usize {
        let star = scene.register_texture(&self.star_texture);
        let haze = scene.register_texture(&self.haze_texture);
        let mut added = 0;
        for index in 0..self.objects.len() {
            if self.objects[index].is_attached() {
                continue;
            }
            let desc = self.sprite_desc(&self.objects[index], star, haze);
            self.objects[index].render = Some(scene.add_drawable(desc));
            added += 1;
        }
        log::debug!("Attached {added} galaxy drawables");
        added
    }

    /// Recompute LOD against `camera` and push the results to the scene.
    pub fn update<S: SceneGraph + ?Sized>(&mut self, camera: Vec3, scene: &mut S) {
        self.lod.update_all(&mut self.objects, camera);
        for (index, object) in self.objects.iter_mut().enumerate() {
            let Some(id) = object.render else {
                continue;
            };
            if !scene.update_drawable(id, object.scale, object.opacity) {
                log::warn!("Object {index} lost its drawable, detaching it");
                object.render = None;
            }
        }
    }

    /// Remove every drawable from the scene. Returns how many were removed.
    pub fn detach<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> usize {
        let removed = self
            .objects
            .iter_mut()
            .filter_map(|object| object.render.take())
            .filter(|id| scene.remove_drawable(*id))
            .count();
        log::debug!("Detached {removed} galaxy drawables");
        removed
    }

    pub fn objects(&self) -> &[CelestialObject] {
        &self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&CelestialObject> {
        self.objects.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn star_count(&self) -> usize {
        self.star_count
    }

    pub fn haze_count(&self) -> usize {
        self.objects.len() - self.star_count
    }

    pub fn star_types(&self) -> &StarTypeTable {
        &self.star_types
    }

    pub fn lod(&self) -> &LodScaler {
        &self.lod
    }

    fn sprite_desc(
        &self,
        object: &CelestialObject,
        star: TextureKey,
        haze: TextureKey,
    ) -> SpriteDesc {
        let (color, texture) = match object.kind {
            ObjectKind::Star { type_index } => (
                self.star_types
                    .get(type_index)
                    .map_or([1.0; 3], |t| t.color),
                star,
            ),
            ObjectKind::Haze => (linear_rgb_from_hex(HAZE_COLOR), haze),
        };
        SpriteDesc {
            position: object.position(),
            layer: object.kind.layer(),
            color,
            scale: object.scale,
            opacity: object.opacity,
            texture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxy_render::{DrawableStore, RenderLayer};

    fn config(stars: u32) -> Config {
        let mut config = Config::default();
        config.galaxy.star_count = stars;
        config
    }

    #[test]
    fn test_build_counts() {
        let galaxy = Galaxy::build(&config(400)).unwrap();
        assert_eq!(galaxy.star_count(), 400);
        assert_eq!(galaxy.haze_count(), 200);
        assert_eq!(galaxy.len(), 600);
        assert!(
            galaxy.objects()[..400]
                .iter()
                .all(|o| matches!(o.kind, ObjectKind::Star { .. }))
        );
        assert!(
            galaxy.objects()[400..]
                .iter()
                .all(|o| o.kind == ObjectKind::Haze)
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = Galaxy::build(&config(100)).unwrap();
        let b = Galaxy::build(&config(100)).unwrap();
        assert_eq!(a.objects(), b.objects());
    }

    #[test]
    fn test_build_fails_fast() {
        assert!(matches!(
            Galaxy::build(&config(0)),
            Err(ConfigurationError::ZeroCount)
        ));

        let mut bad_types = config(10);
        bad_types.star_types.types.clear();
        assert!(matches!(
            Galaxy::build(&bad_types),
            Err(ConfigurationError::EmptyStarTypes)
        ));

        let mut bad_ratio = config(10);
        bad_ratio.galaxy.haze_ratio = -1.0;
        assert!(Galaxy::build(&bad_ratio).is_err());
    }

    #[test]
    fn test_oversized_counts_are_rejected() {
        for ratio in [1e30, f32::INFINITY, f32::NAN, MAX_HAZE_RATIO + 0.5] {
            let mut huge = config(10);
            huge.galaxy.haze_ratio = ratio;
            assert!(
                matches!(
                    Galaxy::build(&huge),
                    Err(ConfigurationError::OutOfRange {
                        name: "galaxy.haze_ratio",
                        ..
                    })
                ),
                "ratio {ratio}"
            );
        }

        assert!(matches!(
            Galaxy::build(&config(u32::MAX)),
            Err(ConfigurationError::OutOfRange {
                name: "galaxy.star_count",
                ..
            })
        ));
    }

    #[test]
    fn test_full_haze_ratio_is_accepted() {
        let mut full = config(30);
        full.galaxy.haze_ratio = MAX_HAZE_RATIO;
        let galaxy = Galaxy::build(&full).unwrap();
        assert_eq!(galaxy.haze_count(), 30);
    }

    #[test]
    fn test_no_haze_when_ratio_zero() {
        let mut config = config(50);
        config.galaxy.haze_ratio = 0.0;
        let galaxy = Galaxy::build(&config).unwrap();
        assert_eq!(galaxy.haze_count(), 0);
    }

    #[test]
    fn test_attach_assigns_layers() {
        let mut galaxy = Galaxy::build(&config(100)).unwrap();
        let mut scene = DrawableStore::new();
        assert_eq!(galaxy.attach(&mut scene), 150);
        assert_eq!(scene.count_on(RenderLayer::Bloom), 100);
        assert_eq!(scene.count_on(RenderLayer::Base), 50);
        assert_eq!(scene.count_on(RenderLayer::Overlay), 0);

        for object in galaxy.objects() {
            let sprite = scene.get(object.render.unwrap()).unwrap();
            assert_eq!(sprite.layer, object.kind.layer());
            assert_eq!(sprite.position, object.position());
        }
        let registered: Vec<_> = scene.textures().collect();
        let [star_tex, haze_tex] = galaxy.texture_paths();
        assert_eq!(registered.len(), 2);
        let texture_of = |index: usize| {
            let key = scene
                .get(galaxy.objects()[index].render.unwrap())
                .unwrap()
                .texture;
            registered[key.index()].1
        };
        assert_eq!(texture_of(0), star_tex);
        assert_eq!(texture_of(120), haze_tex);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut galaxy = Galaxy::build(&config(20)).unwrap();
        let mut scene = DrawableStore::new();
        galaxy.attach(&mut scene);
        assert_eq!(galaxy.attach(&mut scene), 0);
        assert_eq!(scene.len(), 30);
    }

    #[test]
    fn test_update_pushes_lod_to_scene() {
        let mut galaxy = Galaxy::build(&config(50)).unwrap();
        let mut scene = DrawableStore::new();
        galaxy.attach(&mut scene);

        let camera = Vec3::new(0.0, 0.0, 2000.0);
        galaxy.update(camera, &mut scene);

        let lod = *galaxy.lod();
        for object in galaxy.objects() {
            let expected = lod.sample(object, camera);
            let sprite = scene.get(object.render.unwrap()).unwrap();
            assert_eq!(sprite.scale, expected.scale);
            assert_eq!(sprite.opacity, expected.opacity);
            let params = lod.params();
            match object.kind {
                ObjectKind::Star { .. } => {
                    assert!((params.star_min..=params.star_max).contains(&sprite.scale));
                }
                ObjectKind::Haze => {
                    assert!((0.0..=params.haze_opacity).contains(&sprite.opacity));
                }
            }
        }
    }

    #[test]
    fn test_update_drops_stale_handles() {
        let mut galaxy = Galaxy::build(&config(4)).unwrap();
        let mut scene = DrawableStore::new();
        galaxy.attach(&mut scene);
        let first = galaxy.objects()[0].render.unwrap();
        assert!(scene.remove_drawable(first));

        galaxy.update(Vec3::ZERO, &mut scene);
        assert!(galaxy.get(ObjectId(0)).unwrap().render.is_none());
        assert!(galaxy.get(ObjectId(1)).unwrap().render.is_some());
    }

    #[test]
    fn test_detach_removes_everything() {
        let mut galaxy = Galaxy::build(&config(40)).unwrap();
        let mut scene = DrawableStore::new();
        galaxy.attach(&mut scene);
        assert_eq!(galaxy.detach(&mut scene), 60);
        assert!(scene.is_empty());
        assert!(galaxy.objects().iter().all(|o| !o.is_attached()));
        assert_eq!(galaxy.detach(&mut scene), 0);
    }
}
