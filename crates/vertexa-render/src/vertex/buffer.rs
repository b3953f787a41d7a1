//! Device vertex buffers with a CPU shadow and a deferred flush.

use std::ops::Range;

use vertexa_core::profiling::profile_function;
use vertexa_test_utils::{GpuBuffer, RenderContext};

use super::serial::Serial;
use crate::error::VertexDataError;

/// Alignment of every reservation and store.
pub const VERTEX_BUFFER_ALIGNMENT: u64 = 16;

static_assertions::const_assert_eq!(VERTEX_BUFFER_ALIGNMENT % wgpu::COPY_BUFFER_ALIGNMENT, 0);

/// Round `value` up to [`VERTEX_BUFFER_ALIGNMENT`], or `None` on overflow.
pub fn align_up(value: u64) -> Option<u64> {
    value.checked_next_multiple_of(VERTEX_BUFFER_ALIGNMENT)
}

/// A device buffer plus the bytes written to it since creation.
///
/// Writes land in the shadow and extend the mapped range; nothing reaches the
/// device until [`VertexBuffer::hint_unmap`] uploads that range in one write.
pub struct VertexBuffer {
    buffer: GpuBuffer,
    shadow: Vec<u8>,
    mapped: Option<Range<u64>>,
    serial: Serial,
    label: &'static str,
}

impl VertexBuffer {
    /// Create a buffer of at least `size` bytes.
    pub fn new(
        ctx: &dyn RenderContext,
        size: u64,
        label: &'static str,
    ) -> Result<Self, VertexDataError> {
        let (buffer, size) = Self::allocate(ctx, size, label)?;
        Ok(Self {
            buffer,
            shadow: vec![0; size as usize],
            mapped: None,
            serial: Serial::issue(),
            label,
        })
    }

    fn allocate(
        ctx: &dyn RenderContext,
        size: u64,
        label: &'static str,
    ) -> Result<(GpuBuffer, u64), VertexDataError> {
        let size = align_up(size.max(1)).ok_or(VertexDataError::Overflow("vertex buffer size"))?;
        let limit = ctx.max_buffer_size();
        if size > limit {
            tracing::warn!("{}: allocation of {} bytes exceeds limit {}", label, size, limit);
            return Err(VertexDataError::OutOfMemory {
                requested: size,
                limit,
            });
        }

        let buffer = ctx.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        tracing::debug!("{}: allocated {} bytes", label, size);
        Ok((buffer, size))
    }

    /// Replace the device buffer with a fresh one of `size` bytes.
    ///
    /// Pending writes are flushed to the old buffer first so draws already
    /// recorded against it keep their data.
    pub fn reallocate(&mut self, ctx: &dyn RenderContext, size: u64) -> Result<(), VertexDataError> {
        profile_function!();
        self.hint_unmap(ctx);

        let (buffer, size) = Self::allocate(ctx, size, self.label)?;
        self.buffer = buffer;
        self.shadow = vec![0; size as usize];
        self.serial = Serial::issue();
        Ok(())
    }

    /// Get a writable view of `len` bytes at `offset`, marking them mapped.
    pub fn map_range(&mut self, offset: u64, len: u64) -> Result<&mut [u8], VertexDataError> {
        let end = offset
            .checked_add(len)
            .ok_or(VertexDataError::Overflow("mapped range"))?;
        if end > self.size() {
            return Err(VertexDataError::OutOfMemory {
                requested: end,
                limit: self.size(),
            });
        }

        if len > 0 {
            self.mapped = Some(match self.mapped.take() {
                Some(range) => range.start.min(offset)..range.end.max(end),
                None => offset..end,
            });
        }
        Ok(&mut self.shadow[offset as usize..end as usize])
    }

    /// Upload the mapped range, if any.
    pub fn hint_unmap(&mut self, ctx: &dyn RenderContext) {
        let Some(range) = self.mapped.take() else {
            return;
        };

        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let start = range.start / align * align;
        let end = range.end.next_multiple_of(align).min(self.size());
        tracing::trace!("{}: flushing bytes {}..{}", self.label, start, end);
        ctx.write_buffer(&self.buffer, start, &self.shadow[start as usize..end as usize]);
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn size(&self) -> u64 {
        self.shadow.len() as u64
    }

    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn gpu_buffer(&self) -> &GpuBuffer {
        &self.buffer
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("label", &self.label)
            .field("size", &self.size())
            .field("serial", &self.serial)
            .field("mapped", &self.mapped)
            .finish()
    }
}

/// Shared scratch buffer that translated data is appended to.
///
/// Callers reserve space for a whole draw before storing anything. The first
/// store after the reservations grows or discards the buffer once, so every
/// later store of the same draw fits without another reallocation.
#[derive(Debug)]
pub struct StreamingVertexBuffer {
    buffer: VertexBuffer,
    write_position: u64,
    reserved_space: u64,
}

impl StreamingVertexBuffer {
    pub fn new(
        ctx: &dyn RenderContext,
        initial_size: u64,
        label: &'static str,
    ) -> Result<Self, VertexDataError> {
        Ok(Self {
            buffer: VertexBuffer::new(ctx, initial_size, label)?,
            write_position: 0,
            reserved_space: 0,
        })
    }

    /// Reserve `bytes` (rounded up to 16) for upcoming stores.
    pub fn reserve(&mut self, bytes: u64) -> Result<(), VertexDataError> {
        let aligned = align_up(bytes).ok_or(VertexDataError::Overflow("streaming reservation"))?;
        self.reserved_space = self
            .reserved_space
            .checked_add(aligned)
            .ok_or(VertexDataError::Overflow("streaming reservation"))?;
        Ok(())
    }

    /// Reserve room for `count` elements of `element_size` bytes.
    pub fn reserve_elements(&mut self, element_size: u32, count: u32) -> Result<(), VertexDataError> {
        let bytes = (element_size as u64)
            .checked_mul(count as u64)
            .ok_or(VertexDataError::Overflow("streaming reservation"))?;
        self.reserve(bytes)
    }

    fn commit_reservation(&mut self, ctx: &dyn RenderContext) -> Result<(), VertexDataError> {
        let reserved = std::mem::take(&mut self.reserved_space);
        let capacity = self.buffer.size();

        if reserved > capacity {
            let grown = reserved.max(capacity.saturating_mul(3) / 2);
            tracing::debug!(
                "Growing streaming buffer from {} to {} bytes",
                capacity,
                grown
            );
            self.buffer.reallocate(ctx, grown)?;
            self.write_position = 0;
        } else {
            let end = self
                .write_position
                .checked_add(reserved)
                .ok_or(VertexDataError::Overflow("streaming write position"))?;
            if end > capacity {
                tracing::debug!("Discarding streaming buffer ({} bytes)", capacity);
                self.buffer.reallocate(ctx, capacity)?;
                self.write_position = 0;
            }
        }
        Ok(())
    }

    /// Append `len` bytes and return their offset with a writable view.
    pub fn allocate(
        &mut self,
        ctx: &dyn RenderContext,
        len: u64,
    ) -> Result<(u64, &mut [u8]), VertexDataError> {
        let aligned = align_up(len).ok_or(VertexDataError::Overflow("streaming store size"))?;
        if self.reserved_space > 0 {
            self.commit_reservation(ctx)?;
        }

        let fits = self
            .write_position
            .checked_add(aligned)
            .is_some_and(|end| end <= self.buffer.size());
        if !fits {
            // Under-reserved store; make room for this store alone
            self.reserved_space = aligned;
            self.commit_reservation(ctx)?;
        }

        let offset = self.write_position;
        self.write_position += aligned;
        let view = self.buffer.map_range(offset, len)?;
        Ok((offset, view))
    }

    /// Append `data` and return its offset.
    pub fn store(&mut self, ctx: &dyn RenderContext, data: &[u8]) -> Result<u64, VertexDataError> {
        let (offset, view) = self.allocate(ctx, data.len() as u64)?;
        view.copy_from_slice(data);
        Ok(offset)
    }

    pub fn hint_unmap(&mut self, ctx: &dyn RenderContext) {
        self.buffer.hint_unmap(ctx);
    }

    /// Drop reservations that no store consumed.
    pub fn cancel_reservation(&mut self) {
        self.reserved_space = 0;
    }

    pub fn is_mapped(&self) -> bool {
        self.buffer.is_mapped()
    }

    pub fn reserved_space(&self) -> u64 {
        self.reserved_space
    }

    pub fn write_position(&self) -> u64 {
        self.write_position
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn serial(&self) -> Serial {
        self.buffer.serial()
    }

    pub fn gpu_buffer(&self) -> &GpuBuffer {
        self.buffer.gpu_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertexa_test_utils::MockRenderContext;

    #[test]
    fn test_writes_are_deferred_until_unmap() {
        let ctx = MockRenderContext::new();
        let mut buffer = VertexBuffer::new(&ctx, 64, "test").unwrap();

        buffer.map_range(16, 3).unwrap().copy_from_slice(&[1, 2, 3]);
        buffer.map_range(4, 4).unwrap().copy_from_slice(&[9, 9, 9, 9]);
        assert!(buffer.is_mapped());
        assert_eq!(ctx.count_buffer_writes(), 0);

        buffer.hint_unmap(&ctx);
        assert!(!buffer.is_mapped());
        assert_eq!(ctx.count_buffer_writes(), 1);

        let contents = ctx.buffer_contents(buffer.gpu_buffer());
        assert_eq!(&contents[4..8], &[9, 9, 9, 9]);
        assert_eq!(&contents[16..19], &[1, 2, 3]);

        // Nothing new to flush
        buffer.hint_unmap(&ctx);
        assert_eq!(ctx.count_buffer_writes(), 1);
    }

    #[test]
    fn test_allocation_limit() {
        let ctx = MockRenderContext::with_max_buffer_size(256);
        assert!(VertexBuffer::new(&ctx, 256, "test").is_ok());
        let err = VertexBuffer::new(&ctx, 257, "test").unwrap_err();
        assert_eq!(
            err,
            VertexDataError::OutOfMemory {
                requested: 272,
                limit: 256
            }
        );
    }

    #[test]
    fn test_map_range_out_of_bounds() {
        let ctx = MockRenderContext::new();
        let mut buffer = VertexBuffer::new(&ctx, 32, "test").unwrap();
        assert!(buffer.map_range(30, 4).is_err());
        assert!(buffer.map_range(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_stores_are_aligned() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 256, "test").unwrap();
        stream.reserve(3).unwrap();
        stream.reserve(20).unwrap();
        assert_eq!(stream.reserved_space(), 16 + 32);

        assert_eq!(stream.store(&ctx, &[1, 2, 3]).unwrap(), 0);
        assert_eq!(stream.store(&ctx, &[0; 20]).unwrap(), 16);
        assert_eq!(stream.write_position(), 48);
    }

    #[test]
    fn test_growth_happens_once_per_reservation() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 64, "test").unwrap();
        let first_serial = stream.serial();

        stream.reserve(80).unwrap();
        stream.reserve(80).unwrap();
        stream.store(&ctx, &[0; 80]).unwrap();
        stream.store(&ctx, &[0; 80]).unwrap();

        // One initial allocation, one growth
        assert_eq!(ctx.count_buffer_creates(), 2);
        assert_eq!(stream.size(), 160);
        assert_ne!(stream.serial(), first_serial);
    }

    #[test]
    fn test_growth_uses_three_halves() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 1024, "test").unwrap();
        stream.reserve(1040).unwrap();
        stream.store(&ctx, &[0; 16]).unwrap();
        assert_eq!(stream.size(), 1536);
        assert_eq!(stream.write_position(), 16);
    }

    #[test]
    fn test_discard_when_full() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 64, "test").unwrap();

        stream.reserve(48).unwrap();
        stream.store(&ctx, &[0; 48]).unwrap();
        let serial = stream.serial();

        stream.reserve(32).unwrap();
        assert_eq!(stream.store(&ctx, &[0; 32]).unwrap(), 0);
        assert_ne!(stream.serial(), serial);
        assert_eq!(stream.size(), 64);
    }

    #[test]
    fn test_reallocation_flushes_pending_writes() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 32, "test").unwrap();
        let old = stream.gpu_buffer().clone();

        stream.store(&ctx, &[7; 32]).unwrap();
        stream.reserve(64).unwrap();
        stream.store(&ctx, &[1; 64]).unwrap();

        assert_eq!(ctx.buffer_contents(&old), vec![7; 32]);
    }

    #[test]
    fn test_reservation_overflow() {
        let ctx = MockRenderContext::new();
        let mut stream = StreamingVertexBuffer::new(&ctx, 32, "test").unwrap();
        stream.reserve(u64::MAX - 64).unwrap();
        let err = stream.reserve(u64::MAX - 64).unwrap_err();
        assert!(err.is_out_of_memory());
        assert!(stream.reserve(u64::MAX).is_err());
    }
}
