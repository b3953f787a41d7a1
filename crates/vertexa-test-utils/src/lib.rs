//! Test utilities for Vertexa.
//!
//! This crate provides the seam between the vertex data pipeline and the GPU:
//! a small [`RenderContext`] trait, an owned [`GpuBuffer`] wrapper, and (with
//! the `mock` feature) a recording mock context.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use vertexa_test_utils::{MockRenderContext, RenderContext};
//! use wgpu::*;
//!
//! let mock = MockRenderContext::new();
//!
//! let buffer = mock.create_buffer(&BufferDescriptor {
//!     label: Some("streaming"),
//!     size: 1024,
//!     usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
//!     mapped_at_creation: false,
//! });
//! mock.write_buffer(&buffer, 0, &[1, 2, 3, 4]);
//!
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert_eq!(&mock.buffer_contents(&buffer)[..4], &[1, 2, 3, 4]);
//! # }
//! ```
//!
//! # Design Philosophy
//!
//! ## 1. No Lifetimes
//!
//! Buffers are owned and reference counted internally, so translated vertex
//! attributes can carry them without borrowing from the device.
//!
//! ## 2. Interior Mutability
//!
//! The mock uses `Mutex` so `&self` methods can record calls.
//!
//! ## 3. Object Safety
//!
//! `RenderContext` is object-safe; the vertex data manager holds an
//! `Arc<dyn RenderContext>`.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

// Re-export main types at crate root
pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
