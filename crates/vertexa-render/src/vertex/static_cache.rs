//! Converted attribute data cached alongside a source buffer.

use vertexa_core::alloc::{HashMap, HashSet};
use vertexa_test_utils::{GpuBuffer, RenderContext};

use super::{
    attribute::AttributeShape,
    buffer::{VertexBuffer, align_up},
    serial::Serial,
};
use crate::error::VertexDataError;

/// Backing store holding every shape converted from one source buffer.
///
/// The store is sized once, at the first store after reservations, and never
/// grows. A shape that did not fit into that sizing needs a new cache.
#[derive(Debug, Default)]
pub struct StaticVertexCache {
    buffer: Option<VertexBuffer>,
    entries: HashMap<AttributeShape, u64>,
    pending: HashSet<AttributeShape>,
    reserved_space: u64,
    write_position: u64,
}

impl StaticVertexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the backing store, 0 until the first store.
    pub fn buffer_size(&self) -> u64 {
        self.buffer.as_ref().map_or(0, VertexBuffer::size)
    }

    pub fn is_populated(&self) -> bool {
        self.buffer_size() != 0
    }

    /// Offset of the converted data for `shape`, if it has been stored.
    pub fn lookup(&self, shape: &AttributeShape) -> Option<u64> {
        self.entries.get(shape).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reserve `bytes` for `shape`.
    ///
    /// Only counts while the store is unallocated, and only once per shape.
    pub fn reserve(&mut self, shape: AttributeShape, bytes: u64) -> Result<(), VertexDataError> {
        if self.is_populated() || self.entries.contains_key(&shape) || !self.pending.insert(shape) {
            return Ok(());
        }

        let aligned = align_up(bytes).ok_or(VertexDataError::Overflow("static cache reservation"))?;
        self.reserved_space = self
            .reserved_space
            .checked_add(aligned)
            .ok_or(VertexDataError::Overflow("static cache reservation"))?;
        Ok(())
    }

    /// Allocate `len` bytes for a new entry and return their offset and a
    /// writable view. The entry becomes visible through [`Self::record`].
    pub fn allocate(
        &mut self,
        ctx: &dyn RenderContext,
        len: u64,
    ) -> Result<(u64, &mut [u8]), VertexDataError> {
        let aligned = align_up(len).ok_or(VertexDataError::Overflow("static cache store"))?;

        let buffer = match &mut self.buffer {
            Some(buffer) => buffer,
            slot => {
                if self.reserved_space == 0 {
                    return Err(VertexDataError::InvalidState(
                        "static cache store without a reservation",
                    ));
                }
                let size = std::mem::take(&mut self.reserved_space);
                slot.insert(VertexBuffer::new(ctx, size, "Vertexa Static Vertex Cache")?)
            }
        };

        let end = self
            .write_position
            .checked_add(aligned)
            .ok_or(VertexDataError::Overflow("static cache offset"))?;
        if end > buffer.size() {
            return Err(VertexDataError::OutOfMemory {
                requested: end,
                limit: buffer.size(),
            });
        }

        let offset = self.write_position;
        self.write_position = end;
        let view = buffer.map_range(offset, len)?;
        Ok((offset, view))
    }

    /// Make a stored shape available to [`Self::lookup`].
    pub fn record(&mut self, shape: AttributeShape, offset: u64) {
        self.pending.remove(&shape);
        self.entries.insert(shape, offset);
    }

    pub fn hint_unmap(&mut self, ctx: &dyn RenderContext) {
        if let Some(buffer) = &mut self.buffer {
            buffer.hint_unmap(ctx);
        }
    }

    /// Drop reservations that no store consumed.
    pub fn cancel_reservation(&mut self) {
        if !self.is_populated() {
            self.reserved_space = 0;
        }
        self.pending.clear();
    }

    pub fn is_mapped(&self) -> bool {
        self.buffer.as_ref().is_some_and(VertexBuffer::is_mapped)
    }

    pub fn reserved_space(&self) -> u64 {
        self.reserved_space
    }

    pub fn gpu_buffer(&self) -> Option<&GpuBuffer> {
        self.buffer.as_ref().map(VertexBuffer::gpu_buffer)
    }

    pub fn serial(&self) -> Serial {
        self.buffer.as_ref().map_or(Serial::NONE, VertexBuffer::serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::attribute::{ComponentType, VertexAttribute};
    use vertexa_test_utils::MockRenderContext;

    fn shape(components: u8) -> AttributeShape {
        VertexAttribute::client(vec![0u8; 0], ComponentType::Float, components).shape()
    }

    #[test]
    fn test_sized_once_by_reservations() {
        let ctx = MockRenderContext::new();
        let mut cache = StaticVertexCache::new();
        cache.reserve(shape(2), 40).unwrap();
        cache.reserve(shape(3), 60).unwrap();
        assert_eq!(cache.reserved_space(), 48 + 64);

        let (offset, view) = cache.allocate(&ctx, 40).unwrap();
        view.fill(1);
        cache.record(shape(2), offset);
        let (offset, _) = cache.allocate(&ctx, 60).unwrap();
        cache.record(shape(3), offset);

        assert_eq!(cache.buffer_size(), 112);
        assert_eq!(cache.lookup(&shape(2)), Some(0));
        assert_eq!(cache.lookup(&shape(3)), Some(48));
        assert_eq!(ctx.count_buffer_creates(), 1);
    }

    #[test]
    fn test_duplicate_shape_reserves_once() {
        let mut cache = StaticVertexCache::new();
        cache.reserve(shape(4), 64).unwrap();
        cache.reserve(shape(4), 64).unwrap();
        assert_eq!(cache.reserved_space(), 64);
    }

    #[test]
    fn test_store_without_reservation_fails() {
        let ctx = MockRenderContext::new();
        let mut cache = StaticVertexCache::new();
        let err = cache.allocate(&ctx, 16).unwrap_err();
        assert!(matches!(err, VertexDataError::InvalidState(_)));
    }

    #[test]
    fn test_never_grows() {
        let ctx = MockRenderContext::new();
        let mut cache = StaticVertexCache::new();
        cache.reserve(shape(1), 16).unwrap();
        cache.allocate(&ctx, 16).unwrap();

        // Populated caches ignore further reservations
        cache.reserve(shape(2), 32).unwrap();
        assert_eq!(cache.reserved_space(), 0);
        let err = cache.allocate(&ctx, 32).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(ctx.count_buffer_creates(), 1);
    }

    #[test]
    fn test_unmap_flushes_once() {
        let ctx = MockRenderContext::new();
        let mut cache = StaticVertexCache::new();
        cache.reserve(shape(1), 8).unwrap();
        cache.allocate(&ctx, 8).unwrap().1.fill(5);
        assert!(cache.is_mapped());

        cache.hint_unmap(&ctx);
        assert!(!cache.is_mapped());
        assert_eq!(ctx.count_buffer_writes(), 1);
        let contents = ctx.buffer_contents(cache.gpu_buffer().unwrap());
        assert_eq!(&contents[..8], &[5; 8]);
    }
}
