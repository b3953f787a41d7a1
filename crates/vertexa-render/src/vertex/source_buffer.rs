//! Application-owned vertex data that attributes read from.

use parking_lot::Mutex;
use vertexa_test_utils::{GpuBuffer, RenderContext};

use super::{
    attribute::VertexAttribute, conversion::direct_storage_possible, serial::Serial,
    static_cache::StaticVertexCache,
};
use crate::{config::PromotionPolicy, error::VertexDataError};

/// How the application expects to update a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BufferUsageHint {
    /// Written once, drawn many times. Gets a static cache right away.
    #[default]
    Static,
    Dynamic,
    Stream,
}

/// Device copy of the raw source bytes, used for direct binding.
#[derive(Debug)]
struct DeviceMirror {
    buffer: GpuBuffer,
    serial: Serial,
}

#[derive(Debug)]
struct SourceBufferInner {
    data: Vec<u8>,
    usage: BufferUsageHint,
    serial: Serial,
    static_cache: Option<StaticVertexCache>,
    mirror: Option<DeviceMirror>,
    unmodified_data_use: u64,
}

impl SourceBufferInner {
    fn data_changed(&mut self) {
        self.serial = Serial::issue();

        if self.static_cache.as_ref().is_some_and(StaticVertexCache::is_populated) {
            tracing::debug!("Invalidating static vertex cache");
            self.static_cache = None;
            if self.usage == BufferUsageHint::Static {
                self.static_cache = Some(StaticVertexCache::new());
            }
        }
        self.unmodified_data_use = 0;
    }
}

/// A buffer of vertex data shared between the application and the vertex
/// data manager.
///
/// Holds the system-memory bytes used for conversion, an optional
/// [`StaticVertexCache`] of converted shapes, and a device mirror for
/// attributes that bind the bytes unchanged.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vertexa_render::{BufferUsageHint, SourceBuffer};
///
/// let positions = [0.0f32, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0];
/// let buffer = Arc::new(SourceBuffer::from_slice(&positions, BufferUsageHint::Static));
/// assert_eq!(buffer.byte_size(), 36);
/// ```
pub struct SourceBuffer {
    inner: Mutex<SourceBufferInner>,
}

impl SourceBuffer {
    pub fn new(data: impl Into<Vec<u8>>, usage: BufferUsageHint) -> Self {
        let static_cache = (usage == BufferUsageHint::Static).then(StaticVertexCache::new);
        Self {
            inner: Mutex::new(SourceBufferInner {
                data: data.into(),
                usage,
                serial: Serial::issue(),
                static_cache,
                mirror: None,
                unmodified_data_use: 0,
            }),
        }
    }

    /// Create a buffer from any plain-old-data slice.
    pub fn from_slice<T: bytemuck::Pod>(data: &[T], usage: BufferUsageHint) -> Self {
        Self::new(bytemuck::cast_slice::<T, u8>(data).to_vec(), usage)
    }

    pub fn byte_size(&self) -> u64 {
        self.inner.lock().data.len() as u64
    }

    /// Serial of the current contents. Changes on every update.
    pub fn serial(&self) -> Serial {
        self.inner.lock().serial
    }

    pub fn usage(&self) -> BufferUsageHint {
        self.inner.lock().usage
    }

    /// Replace the contents and usage hint.
    pub fn set_data(&self, data: impl Into<Vec<u8>>, usage: BufferUsageHint) {
        let mut inner = self.inner.lock();
        inner.data = data.into();
        inner.mirror = None;
        if inner.usage != usage {
            inner.usage = usage;
            inner.static_cache = (usage == BufferUsageHint::Static).then(StaticVertexCache::new);
        }
        inner.data_changed();
    }

    /// Overwrite `data.len()` bytes starting at `offset`.
    pub fn set_sub_data(&self, offset: u64, data: &[u8]) -> Result<(), VertexDataError> {
        let mut inner = self.inner.lock();
        let available = inner.data.len() as u64;
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(VertexDataError::Overflow("sub data range"))?;
        if end > available {
            return Err(VertexDataError::SourceOutOfRange {
                required: end,
                available,
            });
        }

        inner.data[offset as usize..end as usize].copy_from_slice(data);
        inner.data_changed();
        Ok(())
    }

    pub fn has_static_cache(&self) -> bool {
        self.inner.lock().static_cache.is_some()
    }

    /// Number of shapes the static cache holds.
    pub fn static_cache_entries(&self) -> usize {
        self.inner.lock().static_cache.as_ref().map_or(0, StaticVertexCache::len)
    }

    /// Bytes converted from this buffer since it last changed, while it had
    /// no static cache.
    pub fn unmodified_data_use(&self) -> u64 {
        self.inner.lock().unmodified_data_use
    }

    /// Prepare the static cache for `attrib` and report whether one exists.
    ///
    /// A populated cache that lacks the attribute's shape cannot grow, so it is
    /// replaced by an empty one unless the attribute binds directly, given the
    /// device's `max_stride`.
    pub fn static_cache_for(&self, attrib: &VertexAttribute, max_stride: u32) -> bool {
        let mut inner = self.inner.lock();
        let Some(cache) = &inner.static_cache else {
            return false;
        };

        let shape = attrib.shape();
        if cache.is_populated()
            && cache.lookup(&shape).is_none()
            && !direct_storage_possible(attrib, max_stride)
        {
            tracing::debug!("Static vertex cache lacks {:?}, rebuilding", shape);
            inner.static_cache = Some(StaticVertexCache::new());
        }
        true
    }

    /// Run `f` with the static cache and the source bytes, if a cache exists.
    pub fn with_static_cache<R>(&self, f: impl FnOnce(&mut StaticVertexCache, &[u8]) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let SourceBufferInner {
            data, static_cache, ..
        } = &mut *inner;
        static_cache.as_mut().map(|cache| f(cache, data))
    }

    /// Run `f` with the source bytes.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.inner.lock().data)
    }

    /// Device buffer holding the raw bytes, uploaded when stale.
    pub fn device_buffer(&self, ctx: &dyn RenderContext) -> Result<(GpuBuffer, Serial), VertexDataError> {
        let mut inner = self.inner.lock();
        if let Some(mirror) = &inner.mirror
            && mirror.serial == inner.serial
        {
            return Ok((mirror.buffer.clone(), mirror.serial));
        }

        // Uploads must cover whole 4-byte words
        let size = (inner.data.len() as u64)
            .max(1)
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let limit = ctx.max_buffer_size();
        if size > limit {
            return Err(VertexDataError::OutOfMemory {
                requested: size,
                limit,
            });
        }

        let buffer = match inner.mirror.take() {
            Some(mirror) if mirror.buffer.size() == size => mirror.buffer,
            _ => ctx.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Vertexa Source Buffer"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };

        let mut upload = inner.data.clone();
        upload.resize(size as usize, 0);
        ctx.write_buffer(&buffer, 0, &upload);
        tracing::trace!("Uploaded {} bytes of source data", size);

        let serial = inner.serial;
        inner.mirror = Some(DeviceMirror {
            buffer: buffer.clone(),
            serial,
        });
        Ok((buffer, serial))
    }

    /// Account for `bytes` converted from this buffer by a draw.
    ///
    /// Creates a static cache once the unmodified use passes the policy's
    /// threshold.
    pub fn promote_static_usage(&self, bytes: u64, policy: &PromotionPolicy) {
        let mut inner = self.inner.lock();
        if inner.static_cache.is_some() {
            return;
        }

        inner.unmodified_data_use = inner.unmodified_data_use.saturating_add(bytes);
        let threshold = policy.threshold(inner.data.len() as u64);
        if inner.unmodified_data_use > threshold {
            tracing::debug!(
                "Promoting source buffer to a static cache after {} bytes of reuse",
                inner.unmodified_data_use
            );
            inner.static_cache = Some(StaticVertexCache::new());
        }
    }
}

impl std::fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SourceBuffer")
            .field("byte_size", &inner.data.len())
            .field("usage", &inner.usage)
            .field("serial", &inner.serial)
            .field("has_static_cache", &inner.static_cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::attribute::ComponentType;
    use std::sync::Arc;
    use vertexa_test_utils::MockRenderContext;

    #[test]
    fn test_usage_hint_controls_initial_cache() {
        assert!(SourceBuffer::new(vec![0u8; 16], BufferUsageHint::Static).has_static_cache());
        assert!(!SourceBuffer::new(vec![0u8; 16], BufferUsageHint::Dynamic).has_static_cache());
    }

    #[test]
    fn test_sub_data_changes_serial() {
        let buffer = SourceBuffer::new(vec![0u8; 16], BufferUsageHint::Dynamic);
        let before = buffer.serial();
        buffer.set_sub_data(4, &[1, 2, 3, 4]).unwrap();
        assert_ne!(buffer.serial(), before);
        buffer.with_data(|data| assert_eq!(&data[4..8], &[1, 2, 3, 4]));
    }

    #[test]
    fn test_sub_data_out_of_range() {
        let buffer = SourceBuffer::new(vec![0u8; 16], BufferUsageHint::Dynamic);
        let err = buffer.set_sub_data(14, &[0; 4]).unwrap_err();
        assert_eq!(
            err,
            VertexDataError::SourceOutOfRange {
                required: 18,
                available: 16
            }
        );
    }

    #[test]
    fn test_promotion_threshold() {
        let buffer = SourceBuffer::new(vec![0u8; 100], BufferUsageHint::Dynamic);
        let policy = PromotionPolicy::default();

        buffer.promote_static_usage(300, &policy);
        assert!(!buffer.has_static_cache());
        assert_eq!(buffer.unmodified_data_use(), 300);

        buffer.promote_static_usage(1, &policy);
        assert!(buffer.has_static_cache());
    }

    #[test]
    fn test_update_resets_reuse_counter() {
        let buffer = SourceBuffer::new(vec![0u8; 100], BufferUsageHint::Dynamic);
        buffer.promote_static_usage(250, &PromotionPolicy::default());
        buffer.set_sub_data(0, &[1]).unwrap();
        assert_eq!(buffer.unmodified_data_use(), 0);
    }

    #[test]
    fn test_populated_cache_invalidated_on_update() {
        let ctx = MockRenderContext::new();
        let buffer = SourceBuffer::new(vec![0u8; 64], BufferUsageHint::Static);
        let attrib = VertexAttribute::client(vec![0u8; 0], ComponentType::Short, 2);

        buffer.with_static_cache(|cache, _| {
            cache.reserve(attrib.shape(), 32).unwrap();
            let (offset, _) = cache.allocate(&ctx, 32).unwrap();
            cache.record(attrib.shape(), offset);
        });
        assert_eq!(buffer.static_cache_entries(), 1);

        buffer.set_sub_data(0, &[1, 2]).unwrap();
        // Static usage gets a fresh, empty cache
        assert!(buffer.has_static_cache());
        assert_eq!(buffer.static_cache_entries(), 0);
    }

    #[test]
    fn test_device_mirror_reuploads_after_change() {
        let ctx = MockRenderContext::new();
        let buffer = Arc::new(SourceBuffer::new(vec![1u8, 2, 3, 4, 5, 6], BufferUsageHint::Dynamic));

        let (gpu, serial) = buffer.device_buffer(&ctx).unwrap();
        assert_eq!(gpu.size(), 8);
        assert_eq!(serial, buffer.serial());
        assert_eq!(ctx.buffer_contents(&gpu), vec![1, 2, 3, 4, 5, 6, 0, 0]);

        // Unchanged contents are not uploaded again
        buffer.device_buffer(&ctx).unwrap();
        assert_eq!(ctx.count_buffer_writes(), 1);

        buffer.set_sub_data(0, &[9]).unwrap();
        let (gpu2, serial2) = buffer.device_buffer(&ctx).unwrap();
        assert_ne!(serial2, serial);
        assert_eq!(ctx.buffer_contents(&gpu2)[0], 9);
        assert_eq!(ctx.count_buffer_creates(), 1);
    }
}
