//! Translates a few draws against the mock device and logs where each
//! attribute ended up.
//!
//! Run with: `RUST_LOG=debug cargo run -p vertexa --example translate_draw --features mock`

use std::sync::Arc;

use vertexa::MockRenderContext;
use vertexa::core::profiling::{ProfilingBackend, init_profiling, new_frame, profile_scope};
use vertexa::prelude::*;

fn main() {
    vertexa::core::logging::init();
    init_profiling(ProfilingBackend::InProcess);

    let ctx = Arc::new(MockRenderContext::new());
    let mut manager = VertexDataManager::new(ctx.clone());

    // Float positions bind directly; packed u8 colors need padding to Unorm8x4
    let positions: Vec<f32> = (0..30).map(|i| i as f32 * 0.1).collect();
    let positions = Arc::new(SourceBuffer::from_slice(&positions, BufferUsageHint::Static));
    let colors = Arc::new(SourceBuffer::from_slice(&[200u8; 30], BufferUsageHint::Dynamic));

    let mut state = VertexArrayState::new();
    state.set_attribute(0, VertexAttribute::buffer(positions, ComponentType::Float, 3));
    state.set_attribute(
        1,
        VertexAttribute::buffer(colors, ComponentType::UnsignedByte, 3).normalized(),
    );
    state.set_active(2, true);
    state.set_current_value(2, CurrentValue::Float([1.0, 0.5, 0.25, 1.0]));

    for frame in 0..6 {
        new_frame();
        profile_scope!("frame");

        match manager.prepare_vertex_data(&state, 0, 10, 0) {
            Ok(translated) => {
                for (slot, attribute) in translated.iter().enumerate().filter(|(_, t)| t.active) {
                    tracing::info!(
                        "frame {} slot {}: {:?} format {:?} stride {} offset {}",
                        frame,
                        slot,
                        attribute.kind,
                        attribute.format,
                        attribute.stride,
                        attribute.offset
                    );
                }
            }
            Err(err) => tracing::error!("frame {}: {}", frame, err),
        }
    }

    tracing::info!(
        "{} buffers created, {} uploads",
        ctx.count_buffer_creates(),
        ctx.count_buffer_writes()
    );
}
