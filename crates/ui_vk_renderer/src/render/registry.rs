//! Generation-checked geometry and texture handles
//!
//! Handles are `slotmap` keys. A released handle never resolves again, even
//! after its slot has been reused, so stale handles are detected instead of
//! aliasing someone else's resource.

use slotmap::{new_key_type, SlotMap};

use super::memory::MemoryRegion;

new_key_type! {
    /// Compiled geometry living in the shared pool buffer
    pub struct GeometryHandle;

    /// Uploaded texture
    pub struct TextureHandle;
}

/// Pool regions and draw parameters behind a [`GeometryHandle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryRecord {
    pub(crate) vertices: MemoryRegion,
    pub(crate) indices: MemoryRegion,
    pub(crate) uniforms: Option<MemoryRegion>,
    pub(crate) index_count: u32,
    pub(crate) texture: Option<TextureHandle>,
}

impl GeometryRecord {
    /// Every pool region the record owns
    pub fn regions(&self) -> impl Iterator<Item = MemoryRegion> {
        [Some(self.vertices), Some(self.indices), self.uniforms].into_iter().flatten()
    }

    /// Number of indices drawn
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Texture bound at compile time
    pub const fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }
}

/// GPU texture behind a [`TextureHandle`]
///
/// The descriptor is created on first draw and cached for the texture's life.
#[derive(Debug)]
pub struct TextureRecord<T, D> {
    pub(crate) texture: T,
    pub(crate) descriptor: Option<D>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl<T, D> TextureRecord<T, D> {
    /// Texel dimensions
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Owner of every live geometry and texture record
#[derive(Debug)]
pub struct ResourceRegistry<T, D> {
    pub(crate) geometries: SlotMap<GeometryHandle, GeometryRecord>,
    pub(crate) textures: SlotMap<TextureHandle, TextureRecord<T, D>>,
}

impl<T, D> Default for ResourceRegistry<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D> ResourceRegistry<T, D> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            geometries: SlotMap::with_key(),
            textures: SlotMap::with_key(),
        }
    }

    /// Register compiled geometry
    pub fn insert_geometry(&mut self, record: GeometryRecord) -> GeometryHandle {
        self.geometries.insert(record)
    }

    /// Register an uploaded texture
    pub fn insert_texture(&mut self, texture: T, width: u32, height: u32) -> TextureHandle {
        self.textures.insert(TextureRecord {
            texture,
            descriptor: None,
            width,
            height,
        })
    }

    /// Look up live geometry
    pub fn geometry(&self, handle: GeometryHandle) -> Option<&GeometryRecord> {
        self.geometries.get(handle)
    }

    /// Look up a live texture
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureRecord<T, D>> {
        self.textures.get(handle)
    }

    /// Unregister geometry, handing its record to the caller for retirement
    pub fn remove_geometry(&mut self, handle: GeometryHandle) -> Option<GeometryRecord> {
        self.geometries.remove(handle)
    }

    /// Unregister a texture, handing its record to the caller for retirement
    pub fn remove_texture(&mut self, handle: TextureHandle) -> Option<TextureRecord<T, D>> {
        self.textures.remove(handle)
    }

    /// Empty the registry, returning everything still alive
    pub fn drain(&mut self) -> (Vec<GeometryRecord>, Vec<TextureRecord<T, D>>) {
        (
            self.geometries.drain().map(|(_, record)| record).collect(),
            self.textures.drain().map(|(_, record)| record).collect(),
        )
    }

    /// Live geometry count
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Live texture count
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::memory::MemoryPool;

    fn record(pool: &mut MemoryPool) -> GeometryRecord {
        GeometryRecord {
            vertices: pool.allocate(80).expect("Should allocate"),
            indices: pool.allocate(24).expect("Should allocate"),
            uniforms: None,
            index_count: 6,
            texture: None,
        }
    }

    #[test]
    fn test_released_handle_stays_stale_after_slot_reuse() {
        let mut pool = MemoryPool::new(4096, 64).expect("Should create pool");
        let mut registry: ResourceRegistry<u32, u32> = ResourceRegistry::new();

        let first = registry.insert_geometry(record(&mut pool));
        assert!(registry.remove_geometry(first).is_some());

        let second = registry.insert_geometry(record(&mut pool));
        assert_ne!(first, second);
        assert!(registry.geometry(first).is_none());
        assert!(registry.remove_geometry(first).is_none());
        assert_eq!(registry.geometry(second).map(GeometryRecord::index_count), Some(6));
    }

    #[test]
    fn test_geometry_regions_include_uniforms_when_present() {
        let mut pool = MemoryPool::new(4096, 64).expect("Should create pool");
        let mut geometry = record(&mut pool);
        assert_eq!(geometry.regions().count(), 2);

        geometry.uniforms = Some(pool.allocate(80).expect("Should allocate"));
        assert_eq!(geometry.regions().count(), 3);
    }

    #[test]
    fn test_drain_returns_everything_alive() {
        let mut registry: ResourceRegistry<&str, u32> = ResourceRegistry::new();
        let texture = registry.insert_texture("atlas", 64, 32);
        registry.insert_texture("icon", 16, 16);

        assert_eq!(registry.texture(texture).map(TextureRecord::dimensions), Some((64, 32)));
        let (geometries, textures) = registry.drain();
        assert!(geometries.is_empty());
        assert_eq!(textures.len(), 2);
        assert_eq!(registry.texture_count(), 0);
    }
}
