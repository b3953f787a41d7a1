//! Trait abstracting GPU buffer operations.
//!
//! The vertex data pipeline only ever creates buffers and writes into them,
//! so the seam is deliberately narrow.

use crate::gpu_types::GpuBuffer;
use wgpu::BufferDescriptor;

/// Trait abstracting GPU buffer creation and uploads.
///
/// # Lifetime Considerations
///
/// This trait does NOT use lifetimes because:
/// 1. All returned types are owned (not borrowed from Device)
/// 2. GPU resources use reference counting internally
/// 3. Resources live until dropped
///
/// This makes the trait object-safe and easy to mock.
///
/// # Example
///
/// ```rust,no_run
/// use vertexa_test_utils::RenderContext;
/// use wgpu::{BufferDescriptor, BufferUsages};
///
/// fn upload(ctx: &dyn RenderContext, data: &[u8]) {
///     let desc = BufferDescriptor {
///         label: None,
///         size: data.len() as u64,
///         usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
///         mapped_at_creation: false,
///     };
///     if desc.size <= ctx.max_buffer_size() {
///         let buffer = ctx.create_buffer(&desc);
///         ctx.write_buffer(&buffer, 0, data);
///     }
/// }
/// ```
pub trait RenderContext: Send + Sync {
    /// Largest buffer, in bytes, the device accepts.
    ///
    /// Callers check this before [`create_buffer`](Self::create_buffer);
    /// creating a larger buffer is a device validation error.
    fn max_buffer_size(&self) -> u64;

    /// Widest vertex buffer stride, in bytes, a pipeline can bind.
    fn max_vertex_buffer_array_stride(&self) -> u32;

    /// Create a GPU buffer.
    ///
    /// Returns an owned `GpuBuffer` which can be either real or mock.
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer;

    /// Write data to a buffer.
    ///
    /// For real buffers, this maps to `queue.write_buffer()`. `offset` and
    /// `data.len()` must be multiples of [`wgpu::COPY_BUFFER_ALIGNMENT`].
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);
}
