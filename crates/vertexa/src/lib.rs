//! Vertexa - vertex attribute translation for wgpu
//!
//! Vertexa turns per-draw vertex attribute descriptions (stride, offset,
//! component format, divisor, source buffer or client memory) into vertex
//! buffer regions a wgpu render pass can bind:
//!
//! - **Direct binding** of source buffers whose data is already bindable
//! - **Static caches** of converted data, kept with the source buffer until it changes
//! - **Streaming** of converted data through a shared, growable scratch buffer
//! - **Current values** for disabled attributes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vertexa::prelude::*;
//!
//! vertexa::core::logging::init();
//!
//! let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
//! let mut manager = VertexDataManager::new(ctx);
//!
//! let positions = Arc::new(SourceBuffer::from_slice(&[0.0f32; 9], BufferUsageHint::Static));
//! let mut state = VertexArrayState::new();
//! state.set_attribute(0, VertexAttribute::buffer(positions, ComponentType::Float, 3));
//!
//! let translated = manager.prepare_vertex_data(&state, 0, 3, 0).expect("translation failed");
//! assert_eq!(translated[0].kind, TranslationKind::Direct);
//! ```

// Re-export core types
pub use vertexa_core as core;

pub use vertexa_test_utils::{GpuBuffer, RenderContext};

// Re-export sub-crates based on features
#[cfg(feature = "render")]
pub use vertexa_render as render;

#[cfg(feature = "mock")]
pub use vertexa_test_utils::MockRenderContext;

/// Prelude module for convenient imports
pub mod prelude {
    pub use vertexa_test_utils::{GpuBuffer, RenderContext};

    #[cfg(feature = "render")]
    pub use vertexa_render::{
        BufferUsageHint, ComponentType, CurrentValue, CurrentValueType, DrawState,
        GraphicsContext, GraphicsContextDescriptor, PromotionPolicy, SourceBuffer,
        TranslatedAttribute, TranslationKind, VertexArrayState, VertexAttribute,
        VertexDataConfig, VertexDataError, VertexDataManager,
    };
}
