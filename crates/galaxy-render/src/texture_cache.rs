//! Single-flight asynchronous resource loading.
//!
//! Each key maps to one [`Shared`] future. Every request for a key that is
//! already loading attaches to that future instead of starting a second load.
//! The frame loop never blocks: it polls with [`LoadState`] and skips whatever
//! is still pending.

use std::borrow::Borrow;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use rustc_hash::FxHashMap;

/// Errors produced while loading a resource. Cloneable so every waiter on a
/// shared load receives the same error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to read '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to decode '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    #[error("loader for '{path}' stopped before replying")]
    LoaderDropped { path: PathBuf },
}

/// Decoded RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    /// Procedural soft round sprite, used when a texture cannot be loaded.
    ///
    /// White, with alpha falling off quadratically from the center to zero at
    /// the inscribed circle.
    pub fn radial_falloff(size: u32) -> Self {
        let size = size.max(1);
        let center = (size as f32 - 1.0) * 0.5;
        let radius = (size as f32 * 0.5).max(f32::EPSILON);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let t = ((dx * dx + dy * dy).sqrt() / radius).min(1.0);
                let alpha = (1.0 - t) * (1.0 - t);
                rgba.extend_from_slice(&[255, 255, 255, (alpha * 255.0).round() as u8]);
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, Result<Arc<V>, ResourceError>>>;

/// Non-blocking view of a cached load.
#[derive(Debug)]
pub enum LoadState<V> {
    /// Never requested.
    Missing,
    /// Requested and still in flight.
    Pending,
    Ready(Arc<V>),
    Failed(ResourceError),
}

/// Map of keys to shared in-flight or completed loads.
pub struct SingleFlightCache<K, V> {
    entries: FxHashMap<K, SharedLoad<V>>,
}

impl<K, V> Default for SingleFlightCache<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the load for `key`, starting it with `start` only if none exists.
    pub fn get_or_load<F>(&mut self, key: K, start: F) -> SharedLoad<V>
    where
        F: FnOnce() -> BoxFuture<'static, Result<V, ResourceError>>,
    {
        self.entries
            .entry(key)
            .or_insert_with(|| start().map(|result| result.map(Arc::new)).boxed().shared())
            .clone()
    }

    /// Poll the load for `key` once without blocking.
    pub fn poll<Q>(&self, key: &Q) -> LoadState<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(load) = self.entries.get(key) else {
            return LoadState::Missing;
        };
        match load.clone().now_or_never() {
            None => LoadState::Pending,
            Some(Ok(value)) => LoadState::Ready(value),
            Some(Err(err)) => LoadState::Failed(err),
        }
    }

    /// Number of keys ever requested.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of decoded images.
pub trait ResourceLoader {
    fn load(&self, path: &Path) -> BoxFuture<'static, Result<ImageData, ResourceError>>;
}

/// Decodes image files on a dedicated background thread per request.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadImageLoader;

impl ResourceLoader for ThreadImageLoader {
    fn load(&self, path: &Path) -> BoxFuture<'static, Result<ImageData, ResourceError>> {
        let path = path.to_path_buf();
        let (tx, rx) = oneshot::channel();
        let thread_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || {
                let _ = tx.send(decode_file(&thread_path));
            });

        if let Err(err) = spawned {
            let error = ResourceError::Io {
                path,
                message: err.to_string(),
            };
            return futures::future::ready(Err(error)).boxed();
        }

        async move {
            rx.await
                .unwrap_or_else(|_| Err(ResourceError::LoaderDropped { path }))
        }
        .boxed()
    }
}

fn decode_file(path: &Path) -> Result<ImageData, ResourceError> {
    let bytes = std::fs::read(path).map_err(|e| ResourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let image = image::load_from_memory(&bytes).map_err(|e| ResourceError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let rgba = image.to_rgba8();
    log::debug!(
        "Decoded '{}' ({}x{})",
        path.display(),
        rgba.width(),
        rgba.height()
    );
    Ok(ImageData {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Texture cache keyed by file path.
pub type TextureCache = SingleFlightCache<PathBuf, ImageData>;

/// Start (or join) the load of `path` on `loader`.
pub fn request_texture(cache: &mut TextureCache, loader: &impl ResourceLoader, path: &Path) {
    cache.get_or_load(path.to_path_buf(), || loader.load(path));
}
