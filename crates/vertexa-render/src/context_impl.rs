//! Implementation of RenderContext trait for GraphicsContext.
//!
//! This allows GraphicsContext to be used polymorphically with the
//! RenderContext trait, enabling testing with MockRenderContext.

use crate::context::GraphicsContext;
use vertexa_test_utils::{GpuBuffer, RenderContext};
use wgpu::BufferDescriptor;

impl RenderContext for GraphicsContext {
    fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn max_vertex_buffer_array_stride(&self) -> u32 {
        self.device.limits().max_vertex_buffer_array_stride
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer {
        let buffer = self.device.create_buffer(desc);
        GpuBuffer::from_wgpu(buffer)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let wgpu_buffer = buffer.as_wgpu();
        self.queue.write_buffer(wgpu_buffer, offset, data);
    }
}
