//! Bounded LRU cache for rendered shader tiles.
//!
//! Sweep gradients are rasterized into a surface-sized pixmap and image shadows need
//! a solid-color silhouette of the image; both are expensive enough to keep around
//! between the shadow pass and the primary pass of one draw, and across draws.

use super::handles::{ImageId, ShaderId};
use std::collections::HashMap;
use std::rc::Rc;
use tiny_skia::Pixmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TileKey {
    /// A sweep gradient rendered for one surface size under one total matrix.
    Sweep {
        shader: ShaderId,
        width: u32,
        height: u32,
        /// Bit patterns of the shader-to-device transform.
        matrix: [u32; 6],
    },
    /// An image with every pixel replaced by a color scaled by its alpha.
    Silhouette { image: ImageId, color: [u32; 4] },
}

impl TileKey {
    fn refers_to_shader(&self, id: ShaderId) -> bool {
        matches!(self, TileKey::Sweep { shader, .. } if *shader == id)
    }

    fn refers_to_image(&self, id: ImageId) -> bool {
        matches!(self, TileKey::Silhouette { image, .. } if *image == id)
    }
}

pub(crate) fn transform_bits(ts: &tiny_skia::Transform) -> [u32; 6] {
    [ts.sx, ts.ky, ts.kx, ts.sy, ts.tx, ts.ty].map(f32::to_bits)
}

#[derive(Debug)]
struct TileCacheEntry {
    pixmap: Rc<Pixmap>,
    size_bytes: usize,
    last_used: u64,
}

#[derive(Debug)]
pub(crate) struct TileCache {
    max_bytes: usize,
    total_bytes: usize,
    clock: u64,
    entries: HashMap<TileKey, TileCacheEntry>,
}

impl TileCache {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            total_bytes: 0,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn next_tick(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }

    pub(crate) fn get_or_insert(
        &mut self,
        key: TileKey,
        create: impl FnOnce() -> Option<Pixmap>,
    ) -> Option<Rc<Pixmap>> {
        if self.entries.contains_key(&key) {
            let tick = self.next_tick();
            let entry = self.entries.get_mut(&key)?;
            entry.last_used = tick;
            return Some(Rc::clone(&entry.pixmap));
        }

        let pixmap = Rc::new(create()?);
        let size_bytes = pixmap.data().len();

        // An oversize tile is handed out but never pinned
        if size_bytes > self.max_bytes {
            return Some(pixmap);
        }

        let tick = self.next_tick();
        self.total_bytes += size_bytes;
        self.entries.insert(
            key,
            TileCacheEntry {
                pixmap: Rc::clone(&pixmap),
                size_bytes,
                last_used: tick,
            },
        );

        self.evict_to_budget();

        Some(pixmap)
    }

    /// Drop every tile rendered from `shader`.
    pub(crate) fn forget_shader(&mut self, shader: ShaderId) {
        self.remove_where(|key| key.refers_to_shader(shader));
    }

    /// Drop every tile rendered from `image`.
    pub(crate) fn forget_image(&mut self, image: ImageId) {
        self.remove_where(|key| key.refers_to_image(image));
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&TileKey) -> bool) {
        let mut freed = 0;
        self.entries.retain(|key, entry| {
            let drop = pred(key);
            if drop {
                freed += entry.size_bytes;
            }
            !drop
        });
        self.total_bytes = self.total_bytes.saturating_sub(freed);
    }

    fn evict_to_budget(&mut self) {
        while self.total_bytes > self.max_bytes {
            let lru_key = self
                .entries
                .iter()
                .min_by_key(|(_key, entry)| entry.last_used)
                .map(|(key, _entry)| *key);

            let Some(key) = lru_key else {
                break;
            };

            if let Some(entry) = self.entries.remove(&key) {
                self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::handles::{HandleTable, ImageKind, ShaderKind};

    fn sweep_key(shader: ShaderId, width: u32) -> TileKey {
        TileKey::Sweep {
            shader,
            width,
            height: 1,
            matrix: transform_bits(&tiny_skia::Transform::identity()),
        }
    }

    #[test]
    fn test_cache_hit_reuses_pixmap() {
        let mut shaders: HandleTable<ShaderKind, ()> = HandleTable::new();
        let id = shaders.insert(());
        let mut cache = TileCache::new(1024);
        let first = cache.get_or_insert(sweep_key(id, 4), || Pixmap::new(4, 1)).unwrap();
        let second = cache
            .get_or_insert(sweep_key(id, 4), || panic!("should hit"))
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut shaders: HandleTable<ShaderKind, ()> = HandleTable::new();
        let id = shaders.insert(());
        // Each 4x1 pixmap is 16 bytes
        let mut cache = TileCache::new(32);
        cache.get_or_insert(sweep_key(id, 4), || Pixmap::new(4, 1));
        cache.get_or_insert(TileKey::Sweep {
            shader: id,
            width: 4,
            height: 1,
            matrix: [1; 6],
        }, || Pixmap::new(4, 1));
        // Touch the first so the second is the LRU
        cache.get_or_insert(sweep_key(id, 4), || None);
        cache.get_or_insert(sweep_key(id, 5), || Pixmap::new(4, 1));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_bytes(), 32);
        assert!(cache.get_or_insert(sweep_key(id, 4), || None).is_some());
    }

    #[test]
    fn test_oversize_tile_not_retained() {
        let mut images: HandleTable<ImageKind, ()> = HandleTable::new();
        let image = images.insert(());
        let mut cache = TileCache::new(8);
        let key = TileKey::Silhouette {
            image,
            color: [0; 4],
        };
        assert!(cache.get_or_insert(key, || Pixmap::new(4, 4)).is_some());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_forget_removes_matching_tiles() {
        let mut shaders: HandleTable<ShaderKind, ()> = HandleTable::new();
        let mut images: HandleTable<ImageKind, ()> = HandleTable::new();
        let a = shaders.insert(());
        let b = shaders.insert(());
        let image = images.insert(());
        let mut cache = TileCache::new(1024);
        cache.get_or_insert(sweep_key(a, 1), || Pixmap::new(1, 1));
        cache.get_or_insert(sweep_key(b, 1), || Pixmap::new(1, 1));
        cache.get_or_insert(
            TileKey::Silhouette {
                image,
                color: [0; 4],
            },
            || Pixmap::new(1, 1),
        );

        cache.forget_shader(a);
        assert_eq!(cache.len(), 2);
        cache.forget_image(image);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 4);
    }
}
