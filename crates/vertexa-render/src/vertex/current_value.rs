//! Constant values for disabled attribute slots.

use vertexa_test_utils::{GpuBuffer, RenderContext};

use super::{buffer::StreamingVertexBuffer, serial::Serial};
use crate::error::VertexDataError;

/// Component type of a current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CurrentValueType {
    #[default]
    Float,
    Int,
    UnsignedInt,
}

/// The constant an attribute slot supplies while its array is disabled.
///
/// Compared bitwise, so a NaN constant equals itself and never forces a
/// re-upload.
#[derive(Debug, Clone, Copy)]
pub enum CurrentValue {
    Float([f32; 4]),
    Int([i32; 4]),
    UnsignedInt([u32; 4]),
}

impl Default for CurrentValue {
    fn default() -> Self {
        Self::Float([0.0, 0.0, 0.0, 1.0])
    }
}

impl CurrentValue {
    pub fn value_type(&self) -> CurrentValueType {
        match self {
            Self::Float(_) => CurrentValueType::Float,
            Self::Int(_) => CurrentValueType::Int,
            Self::UnsignedInt(_) => CurrentValueType::UnsignedInt,
        }
    }

    /// The 16 bytes uploaded for this value.
    pub fn to_bytes(&self) -> [u8; 16] {
        match self {
            Self::Float(v) => bytemuck::cast(*v),
            Self::Int(v) => bytemuck::cast(*v),
            Self::UnsignedInt(v) => bytemuck::cast(*v),
        }
    }

    pub fn vertex_format(&self) -> wgpu::VertexFormat {
        match self {
            Self::Float(_) => wgpu::VertexFormat::Float32x4,
            Self::Int(_) => wgpu::VertexFormat::Sint32x4,
            Self::UnsignedInt(_) => wgpu::VertexFormat::Uint32x4,
        }
    }
}

impl PartialEq for CurrentValue {
    fn eq(&self, other: &Self) -> bool {
        self.value_type() == other.value_type() && self.to_bytes() == other.to_bytes()
    }
}

impl Eq for CurrentValue {}

impl From<[f32; 4]> for CurrentValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Float(value)
    }
}

impl From<glam::Vec4> for CurrentValue {
    fn from(value: glam::Vec4) -> Self {
        Self::Float(value.to_array())
    }
}

impl From<glam::IVec4> for CurrentValue {
    fn from(value: glam::IVec4) -> Self {
        Self::Int(value.to_array())
    }
}

impl From<glam::UVec4> for CurrentValue {
    fn from(value: glam::UVec4) -> Self {
        Self::UnsignedInt(value.to_array())
    }
}

/// Where a slot's current value lives on the device.
#[derive(Debug, Clone)]
pub(crate) struct StoredCurrentValue {
    pub buffer: GpuBuffer,
    pub serial: Serial,
    pub offset: u64,
}

/// Per-slot cache of the last uploaded current value.
#[derive(Default)]
pub(crate) struct CurrentValueSlot {
    value: Option<CurrentValue>,
    offset: u64,
    buffer: Option<StreamingVertexBuffer>,
}

impl CurrentValueSlot {
    /// Upload `value` unless it matches the cached one.
    pub fn store(
        &mut self,
        ctx: &dyn RenderContext,
        value: CurrentValue,
        buffer_size: u64,
    ) -> Result<StoredCurrentValue, VertexDataError> {
        let buffer = match &mut self.buffer {
            Some(buffer) => buffer,
            slot => slot.insert(StreamingVertexBuffer::new(
                ctx,
                buffer_size,
                "Vertexa Current Value Buffer",
            )?),
        };

        if self.value != Some(value) {
            let bytes = value.to_bytes();
            buffer.reserve(bytes.len() as u64)?;
            self.offset = buffer.store(ctx, &bytes)?;
            self.value = Some(value);
        }

        Ok(StoredCurrentValue {
            buffer: buffer.gpu_buffer().clone(),
            serial: buffer.serial(),
            offset: self.offset,
        })
    }

    pub fn is_mapped(&self) -> bool {
        self.buffer.as_ref().is_some_and(StreamingVertexBuffer::is_mapped)
    }

    pub fn hint_unmap(&mut self, ctx: &dyn RenderContext) {
        if let Some(buffer) = &mut self.buffer {
            buffer.hint_unmap(ctx);
            buffer.cancel_reservation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_origin() {
        assert_eq!(
            CurrentValue::default(),
            CurrentValue::Float([0.0, 0.0, 0.0, 1.0])
        );
    }

    #[test]
    fn test_bitwise_equality() {
        let nan = CurrentValue::Float([f32::NAN, 0.0, 0.0, 1.0]);
        assert_eq!(nan, nan);

        // -0.0 == 0.0 numerically but not bitwise
        assert_ne!(
            CurrentValue::Float([0.0; 4]),
            CurrentValue::Float([-0.0, 0.0, 0.0, 0.0])
        );

        // Same bits, different type
        assert_ne!(CurrentValue::Int([1; 4]), CurrentValue::UnsignedInt([1; 4]));
    }

    #[test]
    fn test_formats() {
        assert_eq!(
            CurrentValue::from(glam::IVec4::ONE).vertex_format(),
            wgpu::VertexFormat::Sint32x4
        );
        assert_eq!(
            CurrentValue::from(glam::UVec4::ZERO).value_type(),
            CurrentValueType::UnsignedInt
        );
        assert_eq!(
            CurrentValue::from(glam::Vec4::ONE).to_bytes()[..4],
            1.0f32.to_le_bytes()
        );
    }
}
