//! Vertex attribute translation.
//!
//! [`VertexDataManager`] turns the attribute state of a draw into buffer
//! regions that can be bound as vertex buffers. Attribute data reaches the
//! device in one of three ways:
//!
//! - **Direct**: the source buffer already holds data in a bindable format and
//!   alignment, so its device mirror is bound as is.
//! - **Static cache**: the source buffer keeps a [`StaticVertexCache`] of
//!   converted shapes, filled once and reused until the buffer changes.
//! - **Streaming**: the data is converted into a shared
//!   [`StreamingVertexBuffer`] every draw.
//!
//! Disabled attributes are fed from per-slot current value buffers.

mod attribute;
mod buffer;
mod conversion;
mod current_value;
mod manager;
mod serial;
mod source_buffer;
mod state;
mod static_cache;

pub use attribute::{
    AttributeShape, AttributeSource, ComponentType, MAX_VERTEX_ATTRIBS, VertexAttribute,
    elements_in_buffer, first_vertex_index, streaming_element_count,
};
pub use buffer::{StreamingVertexBuffer, VERTEX_BUFFER_ALIGNMENT, VertexBuffer};
pub use conversion::{OutputFormat, direct_storage_possible, output_format};
pub use current_value::{CurrentValue, CurrentValueType};
pub use manager::{TranslatedAttribute, TranslatedAttributes, TranslationKind, VertexDataManager};
pub use serial::Serial;
pub use source_buffer::{BufferUsageHint, SourceBuffer};
pub use state::{DrawState, VertexArrayState};
pub use static_cache::StaticVertexCache;
