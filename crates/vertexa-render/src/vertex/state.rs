//! Per-draw attribute state consumed by the vertex data manager.

use super::{
    attribute::{MAX_VERTEX_ATTRIBS, VertexAttribute},
    current_value::CurrentValue,
};

/// Read access to the attribute state of one draw.
///
/// Slots outside `0..MAX_VERTEX_ATTRIBS` are never queried.
pub trait DrawState {
    fn vertex_attribute(&self, slot: usize) -> &VertexAttribute;

    /// Constant used while the slot's attribute is disabled.
    fn current_value(&self, slot: usize) -> CurrentValue;

    /// Whether the bound program reads this slot.
    fn is_slot_active(&self, slot: usize) -> bool;
}

/// A plain array-backed [`DrawState`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vertexa_render::{BufferUsageHint, ComponentType, SourceBuffer, VertexArrayState, VertexAttribute};
///
/// let buffer = Arc::new(SourceBuffer::new(vec![0u8; 96], BufferUsageHint::Static));
/// let mut state = VertexArrayState::new();
/// state.set_attribute(0, VertexAttribute::buffer(buffer, ComponentType::Float, 3));
/// state.set_current_value(1, [1.0, 0.0, 0.0, 1.0].into());
/// state.set_active(1, true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VertexArrayState {
    attributes: [VertexAttribute; MAX_VERTEX_ATTRIBS],
    current_values: [CurrentValue; MAX_VERTEX_ATTRIBS],
    active: [bool; MAX_VERTEX_ATTRIBS],
}

impl VertexArrayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attribute of `slot` and mark the slot active.
    ///
    /// # Panics
    /// Panics if `slot >= MAX_VERTEX_ATTRIBS`.
    pub fn set_attribute(&mut self, slot: usize, attribute: VertexAttribute) -> &mut Self {
        self.attributes[slot] = attribute;
        self.active[slot] = true;
        self
    }

    pub fn attribute_mut(&mut self, slot: usize) -> &mut VertexAttribute {
        &mut self.attributes[slot]
    }

    pub fn set_current_value(&mut self, slot: usize, value: CurrentValue) -> &mut Self {
        self.current_values[slot] = value;
        self
    }

    pub fn set_enabled(&mut self, slot: usize, enabled: bool) -> &mut Self {
        self.attributes[slot].enabled = enabled;
        self
    }

    pub fn set_active(&mut self, slot: usize, active: bool) -> &mut Self {
        self.active[slot] = active;
        self
    }
}

impl DrawState for VertexArrayState {
    fn vertex_attribute(&self, slot: usize) -> &VertexAttribute {
        &self.attributes[slot]
    }

    fn current_value(&self, slot: usize) -> CurrentValue {
        self.current_values[slot]
    }

    fn is_slot_active(&self, slot: usize) -> bool {
        self.active[slot]
    }
}
