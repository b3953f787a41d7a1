//! Mock implementation of RenderContext for testing.
//!
//! This module provides a mock GPU context that records operations
//! without actually interacting with the GPU.

use crate::{gpu_types::GpuBuffer, render_context::RenderContext};
use parking_lot::Mutex;
use wgpu::*;

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    CreateBuffer {
        buffer_id: usize,
        size: u64,
        usage: BufferUsages,
    },
    WriteBuffer {
        buffer_id: usize,
        offset: u64,
        size: usize,
    },
}

/// Mock buffers stored in the context.
#[derive(Debug, Clone)]
struct MockBuffer {
    usage: BufferUsages,
    /// Bytes written so far, so tests can read uploads back.
    data: Vec<u8>,
}

/// Mock implementation of RenderContext for testing.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// Methods take `&self` but need to mutate internal state (record calls).
/// `parking_lot::Mutex` keeps the mock `Send + Sync` as the trait requires.
///
/// # Example
///
/// ```rust
/// use vertexa_test_utils::{MockRenderContext, RenderContext};
/// use wgpu::*;
///
/// let mock = MockRenderContext::new();
///
/// let buffer = mock.create_buffer(&BufferDescriptor {
///     label: None,
///     size: 1024,
///     usage: BufferUsages::VERTEX,
///     mapped_at_creation: false,
/// });
///
/// assert!(buffer.is_mock());
/// assert_eq!(mock.count_buffer_creates(), 1);
/// ```
pub struct MockRenderContext {
    /// Recorded calls for verification
    calls: Mutex<Vec<RenderCall>>,

    /// Mock buffers (we don't create real GPU buffers)
    buffers: Mutex<Vec<MockBuffer>>,

    /// Reported device limits
    max_buffer_size: u64,
    max_vertex_buffer_array_stride: u32,
}

impl MockRenderContext {
    /// Create a new mock render context with wgpu's default buffer limit.
    pub fn new() -> Self {
        Self::with_max_buffer_size(Limits::default().max_buffer_size)
    }

    /// Create a mock context that reports a custom `max_buffer_size`.
    ///
    /// Useful to provoke allocation failures.
    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
            max_buffer_size,
            max_vertex_buffer_array_stride: Limits::default().max_vertex_buffer_array_stride,
        }
    }

    /// Report a custom `max_vertex_buffer_array_stride`.
    pub fn with_max_vertex_buffer_array_stride(mut self, stride: u32) -> Self {
        self.max_vertex_buffer_array_stride = stride;
        self
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// Count buffer creations.
    pub fn count_buffer_creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::CreateBuffer { .. }))
            .count()
    }

    /// Count buffer write operations.
    pub fn count_buffer_writes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::WriteBuffer { .. }))
            .count()
    }

    /// Count write operations that targeted one buffer.
    pub fn count_writes_to(&self, buffer: &GpuBuffer) -> usize {
        let Some(id) = buffer.mock_id() else {
            return 0;
        };
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::WriteBuffer { buffer_id, .. } if *buffer_id == id))
            .count()
    }

    /// Usage flags a buffer was created with.
    pub fn buffer_usage(&self, buffer: &GpuBuffer) -> Option<BufferUsages> {
        let id = buffer.mock_id()?;
        self.buffers.lock().get(id).map(|b| b.usage)
    }

    /// Everything written into a mock buffer so far.
    ///
    /// Bytes never written read back as zero.
    pub fn buffer_contents(&self, buffer: &GpuBuffer) -> Vec<u8> {
        buffer
            .mock_id()
            .and_then(|id| self.buffers.lock().get(id).map(|b| b.data.clone()))
            .unwrap_or_default()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for MockRenderContext {
    fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    fn max_vertex_buffer_array_stride(&self) -> u32 {
        self.max_vertex_buffer_array_stride
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer {
        let mut buffers = self.buffers.lock();
        let id = buffers.len();

        buffers.push(MockBuffer {
            usage: desc.usage,
            data: vec![0; desc.size as usize],
        });

        self.calls.lock().push(RenderCall::CreateBuffer {
            buffer_id: id,
            size: desc.size,
            usage: desc.usage,
        });

        GpuBuffer::mock(id, desc.size)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let Some(buffer_id) = buffer.mock_id() else {
            return;
        };

        assert!(
            offset % COPY_BUFFER_ALIGNMENT == 0 && data.len() as u64 % COPY_BUFFER_ALIGNMENT == 0,
            "Unaligned write: offset {} size {}",
            offset,
            data.len()
        );

        if let Some(mock) = self.buffers.lock().get_mut(buffer_id) {
            let start = offset as usize;
            let end = start + data.len();
            assert!(
                end <= mock.data.len(),
                "Write of {} bytes at {} overflows buffer {} of {} bytes",
                data.len(),
                offset,
                buffer_id,
                mock.data.len()
            );
            mock.data[start..end].copy_from_slice(data);
        }

        self.calls.lock().push(RenderCall::WriteBuffer {
            buffer_id,
            offset,
            size: data.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_buffer(mock: &MockRenderContext, size: u64) -> GpuBuffer {
        mock.create_buffer(&BufferDescriptor {
            label: Some("test_buffer"),
            size,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    #[test]
    fn test_mock_buffer_creation() {
        let mock = MockRenderContext::new();
        let buffer = vertex_buffer(&mock, 1024);

        assert!(buffer.is_mock());
        assert_eq!(buffer.size(), 1024);
        assert_eq!(mock.count_buffer_creates(), 1);
        assert_eq!(
            mock.buffer_usage(&buffer),
            Some(BufferUsages::VERTEX | BufferUsages::COPY_DST)
        );
    }

    #[test]
    fn test_mock_buffer_write_keeps_contents() {
        let mock = MockRenderContext::new();
        let buffer = vertex_buffer(&mock, 16);

        mock.write_buffer(&buffer, 4, &[9, 8, 7, 6]);

        assert_eq!(mock.count_buffer_writes(), 1);
        assert_eq!(mock.count_writes_to(&buffer), 1);
        assert_eq!(
            mock.buffer_contents(&buffer),
            vec![0, 0, 0, 0, 9, 8, 7, 6, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    #[should_panic(expected = "Unaligned write")]
    fn test_mock_rejects_unaligned_write() {
        let mock = MockRenderContext::new();
        let buffer = vertex_buffer(&mock, 16);
        mock.write_buffer(&buffer, 2, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_custom_limits() {
        let mock = MockRenderContext::with_max_buffer_size(64).with_max_vertex_buffer_array_stride(256);
        assert_eq!(mock.max_buffer_size(), 64);
        assert_eq!(mock.max_vertex_buffer_array_stride(), 256);
        assert_eq!(
            MockRenderContext::new().max_vertex_buffer_array_stride(),
            Limits::default().max_vertex_buffer_array_stride
        );
    }

    #[test]
    fn test_clear_calls() {
        let mock = MockRenderContext::new();
        vertex_buffer(&mock, 1024);

        assert_eq!(mock.call_count(), 1);

        mock.clear_calls();
        assert_eq!(mock.call_count(), 0);
    }
}
