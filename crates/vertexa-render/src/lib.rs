//! Vertexa Render
//!
//! Translates vertex attribute state into device-ready vertex buffer regions
//! on top of wgpu.
//!
//! The device is reached through the [`RenderContext`] trait, implemented by
//! [`GraphicsContext`] for real GPUs and by `MockRenderContext` (feature
//! `mock` of `vertexa-test-utils`) for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vertexa_render::{
//!     BufferUsageHint, ComponentType, GraphicsContext, SourceBuffer, VertexArrayState,
//!     VertexAttribute, VertexDataManager,
//! };
//!
//! let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
//! let mut manager = VertexDataManager::new(ctx);
//!
//! let colors = Arc::new(SourceBuffer::from_slice(&[255u8; 36], BufferUsageHint::Dynamic));
//! let mut state = VertexArrayState::new();
//! state.set_attribute(0, VertexAttribute::buffer(colors, ComponentType::UnsignedByte, 3).normalized());
//!
//! let translated = manager.prepare_vertex_data(&state, 0, 12, 0).unwrap();
//! let color = &translated[0];
//! println!("bind {:?} at offset {} stride {}", color.buffer, color.offset, color.stride);
//! ```

mod config;
mod context;
mod context_impl;
mod error;
pub mod vertex;

pub use config::*;
pub use context::*;
pub use error::*;
pub use vertex::*;

// Re-export the device seam so users don't need vertexa-test-utils for it
pub use vertexa_test_utils::{GpuBuffer, RenderContext};

pub use wgpu;
