//! Output format selection and CPU-side attribute conversion.

use wgpu::VertexFormat;

use super::attribute::{AttributeShape, ComponentType, VertexAttribute};
use crate::error::VertexDataError;

/// Alignment wgpu requires of vertex buffer strides and offsets.
const VERTEX_ALIGNMENT: u32 = 4;

/// Device representation chosen for an attribute shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub format: VertexFormat,
    /// Components in the output; differs from the source when padded.
    pub components: u8,
    /// Whether the bytes must be rewritten on the CPU before upload.
    pub cpu_conversion: bool,
}

impl OutputFormat {
    /// Bytes one output element occupies in a translated stream.
    ///
    /// Rounded up to 4 since vertex strides must be 4-byte aligned.
    pub fn element_size(&self) -> u32 {
        (self.format.size() as u32).next_multiple_of(VERTEX_ALIGNMENT)
    }
}

fn float32(components: u8) -> VertexFormat {
    match components {
        1 => VertexFormat::Float32,
        2 => VertexFormat::Float32x2,
        3 => VertexFormat::Float32x3,
        _ => VertexFormat::Float32x4,
    }
}

fn sint32(components: u8) -> VertexFormat {
    match components {
        1 => VertexFormat::Sint32,
        2 => VertexFormat::Sint32x2,
        3 => VertexFormat::Sint32x3,
        _ => VertexFormat::Sint32x4,
    }
}

fn uint32(components: u8) -> VertexFormat {
    match components {
        1 => VertexFormat::Uint32,
        2 => VertexFormat::Uint32x2,
        3 => VertexFormat::Uint32x3,
        _ => VertexFormat::Uint32x4,
    }
}

/// Select the output format for an attribute shape.
pub fn output_format(shape: &AttributeShape) -> OutputFormat {
    let n = shape.components;
    // 8 and 16 bit formats only come in 2 and 4 component widths
    let padded = if n <= 2 { 2 } else { 4 };
    let small = |pair: VertexFormat, quad: VertexFormat| OutputFormat {
        format: if padded == 2 { pair } else { quad },
        components: padded,
        cpu_conversion: padded != n,
    };
    let unchanged = |format: VertexFormat| OutputFormat {
        format,
        components: n,
        cpu_conversion: false,
    };
    let to_float = OutputFormat {
        format: float32(n),
        components: n,
        cpu_conversion: true,
    };

    use ComponentType as T;
    use VertexFormat as F;
    match shape.component_type {
        T::Float => unchanged(float32(n)),
        T::HalfFloat => small(F::Float16x2, F::Float16x4),
        T::Byte if shape.pure_integer => small(F::Sint8x2, F::Sint8x4),
        T::Byte if shape.normalized => small(F::Snorm8x2, F::Snorm8x4),
        T::UnsignedByte if shape.pure_integer => small(F::Uint8x2, F::Uint8x4),
        T::UnsignedByte if shape.normalized => small(F::Unorm8x2, F::Unorm8x4),
        T::Short if shape.pure_integer => small(F::Sint16x2, F::Sint16x4),
        T::Short if shape.normalized => small(F::Snorm16x2, F::Snorm16x4),
        T::UnsignedShort if shape.pure_integer => small(F::Uint16x2, F::Uint16x4),
        T::UnsignedShort if shape.normalized => small(F::Unorm16x2, F::Unorm16x4),
        T::Int if shape.pure_integer => unchanged(sint32(n)),
        T::UnsignedInt if shape.pure_integer => unchanged(uint32(n)),
        _ => to_float,
    }
}

/// Whether an attribute can be bound straight from its source buffer.
///
/// `max_stride` is the device's `max_vertex_buffer_array_stride`; wider
/// strides cannot be bound and must be repacked.
pub fn direct_storage_possible(attrib: &VertexAttribute, max_stride: u32) -> bool {
    if attrib.source_buffer().is_none() || attrib.effective_stride() > max_stride {
        return false;
    }

    let output = output_format(&attrib.shape());
    if output.cpu_conversion {
        return false;
    }

    let alignment = if attrib.component_type == ComponentType::Float {
        VERTEX_ALIGNMENT
    } else {
        output.element_size().min(VERTEX_ALIGNMENT)
    };
    attrib.effective_stride() % alignment == 0 && attrib.offset % alignment as u64 == 0
}

/// Check that `count` elements starting at `first_byte` lie inside `source`.
pub fn check_source_range(
    shape: &AttributeShape,
    source_len: usize,
    first_byte: u64,
    count: u32,
) -> Result<(), VertexDataError> {
    if count == 0 {
        return Ok(());
    }

    let required = (count as u64 - 1)
        .checked_mul(shape.stride as u64)
        .and_then(|span| span.checked_add(first_byte))
        .and_then(|last| last.checked_add(shape.type_size() as u64))
        .ok_or(VertexDataError::Overflow("source read range"))?;

    if required > source_len as u64 {
        return Err(VertexDataError::SourceOutOfRange {
            required,
            available: source_len as u64,
        });
    }
    Ok(())
}

/// Convert `count` elements of `shape` from `source` into `dst`.
///
/// Elements are read at `first_byte + i * stride` and written tightly at
/// `output.element_size()` bytes each.
pub fn convert_elements(
    shape: &AttributeShape,
    output: &OutputFormat,
    source: &[u8],
    first_byte: u64,
    count: u32,
    dst: &mut [u8],
) -> Result<(), VertexDataError> {
    check_source_range(shape, source.len(), first_byte, count)?;

    let out_size = output.element_size() as usize;
    let needed = out_size * count as usize;
    if dst.len() < needed {
        return Err(VertexDataError::InvalidState(
            "conversion destination smaller than its element range",
        ));
    }

    let type_size = shape.type_size() as usize;
    let stride = shape.stride as usize;
    let first = first_byte as usize;

    for (i, out) in dst[..needed].chunks_exact_mut(out_size).enumerate() {
        let start = first + i * stride;
        let element = &source[start..start + type_size];

        if !output.cpu_conversion {
            out[..type_size].copy_from_slice(element);
            out[type_size..].fill(0);
        } else if output.components != shape.components {
            pad_element(shape, output, element, out);
        } else {
            widen_to_float(shape, element, out);
        }
    }
    Ok(())
}

/// Copy the source components and fill the missing ones with (0, 0, 0, 1).
fn pad_element(shape: &AttributeShape, output: &OutputFormat, element: &[u8], out: &mut [u8]) {
    let size = shape.component_type.size() as usize;
    let copied = shape.components as usize * size;
    out[..copied].copy_from_slice(element);
    out[copied..].fill(0);

    if output.components == 4 && shape.components < 4 {
        let one = one_bits(shape);
        out[3 * size..4 * size].copy_from_slice(&one.to_le_bytes()[..size]);
    }
}

/// Bit pattern of 1.0 in the padded output representation.
fn one_bits(shape: &AttributeShape) -> u32 {
    use ComponentType as T;
    match shape.component_type {
        T::HalfFloat => 0x3C00,
        _ if shape.pure_integer => 1,
        T::Byte => 0x7F,
        T::UnsignedByte => 0xFF,
        T::Short => 0x7FFF,
        T::UnsignedShort => 0xFFFF,
        _ => 1,
    }
}

fn widen_to_float(shape: &AttributeShape, element: &[u8], out: &mut [u8]) {
    let size = shape.component_type.size() as usize;
    for (c, bytes) in element.chunks_exact(size).enumerate() {
        let value = read_component(shape, bytes);
        out[c * 4..c * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

fn read_component(shape: &AttributeShape, b: &[u8]) -> f32 {
    use ComponentType as T;
    let normalized = shape.normalized;
    match shape.component_type {
        T::Byte => {
            let v = b[0] as i8 as f32;
            if normalized { (v / 127.0).max(-1.0) } else { v }
        }
        T::UnsignedByte => {
            let v = b[0] as f32;
            if normalized { v / 255.0 } else { v }
        }
        T::Short => {
            let v = i16::from_le_bytes([b[0], b[1]]) as f32;
            if normalized { (v / 32767.0).max(-1.0) } else { v }
        }
        T::UnsignedShort => {
            let v = u16::from_le_bytes([b[0], b[1]]) as f32;
            if normalized { v / 65535.0 } else { v }
        }
        T::Int => {
            let v = i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64;
            if normalized {
                (v / i32::MAX as f64).max(-1.0) as f32
            } else {
                v as f32
            }
        }
        T::UnsignedInt => {
            let v = u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64;
            if normalized {
                (v / u32::MAX as f64) as f32
            } else {
                v as f32
            }
        }
        T::Fixed => (i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64 / 65536.0) as f32,
        T::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        // Half floats are never widened, only padded
        T::HalfFloat => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(component_type: ComponentType, components: u8) -> AttributeShape {
        VertexAttribute::client(vec![0u8; 0], component_type, components).shape()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_format_table() {
        let f = |t, n| output_format(&shape(t, n));
        assert_eq!(f(ComponentType::Float, 3).format, VertexFormat::Float32x3);
        assert!(!f(ComponentType::Float, 3).cpu_conversion);
        assert_eq!(f(ComponentType::HalfFloat, 2).format, VertexFormat::Float16x2);
        assert_eq!(f(ComponentType::HalfFloat, 3).format, VertexFormat::Float16x4);
        assert!(f(ComponentType::HalfFloat, 3).cpu_conversion);
        assert_eq!(f(ComponentType::Short, 2).format, VertexFormat::Float32x2);
        assert!(f(ComponentType::Short, 2).cpu_conversion);
        assert_eq!(f(ComponentType::Fixed, 1).format, VertexFormat::Float32);

        let normalized = VertexAttribute::client(vec![0u8; 0], ComponentType::UnsignedByte, 4)
            .normalized()
            .shape();
        assert_eq!(output_format(&normalized).format, VertexFormat::Unorm8x4);
        assert!(!output_format(&normalized).cpu_conversion);

        let integer = VertexAttribute::client(vec![0u8; 0], ComponentType::Int, 3)
            .pure_integer()
            .shape();
        assert_eq!(output_format(&integer).format, VertexFormat::Sint32x3);

        let normalized_int = VertexAttribute::client(vec![0u8; 0], ComponentType::Int, 2)
            .normalized()
            .shape();
        assert_eq!(output_format(&normalized_int).format, VertexFormat::Float32x2);
        assert!(output_format(&normalized_int).cpu_conversion);
    }

    #[test]
    fn test_element_size_is_four_byte_aligned() {
        let pair = VertexAttribute::client(vec![0u8; 0], ComponentType::UnsignedByte, 2)
            .normalized()
            .shape();
        assert_eq!(output_format(&pair).element_size(), 4);
        assert_eq!(output_format(&shape(ComponentType::Float, 3)).element_size(), 12);
    }

    #[test]
    fn test_widen_shorts() {
        let s = shape(ComponentType::Short, 2);
        let out = output_format(&s);
        let source: Vec<u8> = [-3i16, 7, 100, -100]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut dst = vec![0u8; 16];
        convert_elements(&s, &out, &source, 0, 2, &mut dst).unwrap();
        assert_eq!(floats(&dst), vec![-3.0, 7.0, 100.0, -100.0]);
    }

    #[test]
    fn test_normalized_int_clamps() {
        let s = VertexAttribute::client(vec![0u8; 0], ComponentType::Int, 2)
            .normalized()
            .shape();
        let out = output_format(&s);
        let source: Vec<u8> = [i32::MIN, i32::MAX]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut dst = vec![0u8; 8];
        convert_elements(&s, &out, &source, 0, 1, &mut dst).unwrap();
        assert_eq!(floats(&dst), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_fixed_point() {
        let s = shape(ComponentType::Fixed, 1);
        let out = output_format(&s);
        let source = (3 * 65536 + 32768i32).to_le_bytes();
        let mut dst = vec![0u8; 4];
        convert_elements(&s, &out, &source, 0, 1, &mut dst).unwrap();
        assert_eq!(floats(&dst), vec![3.5]);
    }

    #[test]
    fn test_pad_normalized_bytes() {
        let s = VertexAttribute::client(vec![0u8; 0], ComponentType::UnsignedByte, 3)
            .normalized()
            .shape();
        let out = output_format(&s);
        assert_eq!(out.format, VertexFormat::Unorm8x4);
        let mut dst = vec![0u8; 4];
        convert_elements(&s, &out, &[10, 20, 30], 0, 1, &mut dst).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 0xFF]);
    }

    #[test]
    fn test_pad_half_float_single_component() {
        let s = shape(ComponentType::HalfFloat, 1);
        let out = output_format(&s);
        assert_eq!(out.format, VertexFormat::Float16x2);
        let mut dst = vec![0xAAu8; 4];
        convert_elements(&s, &out, &[0x00, 0x3C], 0, 1, &mut dst).unwrap();
        // y is zero; there is no w in a two-component output
        assert_eq!(dst, vec![0x00, 0x3C, 0, 0]);
    }

    #[test]
    fn test_pad_three_halves_sets_w_to_one() {
        let s = shape(ComponentType::HalfFloat, 3);
        let out = output_format(&s);
        let mut dst = vec![0u8; 8];
        convert_elements(&s, &out, &[1, 0, 2, 0, 3, 0], 0, 1, &mut dst).unwrap();
        assert_eq!(dst, vec![1, 0, 2, 0, 3, 0, 0x00, 0x3C]);
    }

    #[test]
    fn test_strided_copy() {
        let s = VertexAttribute::client(vec![0u8; 0], ComponentType::Float, 1)
            .with_stride(8)
            .shape();
        let out = output_format(&s);
        let source: Vec<u8> = [1.0f32, 9.0, 2.0, 9.0, 3.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut dst = vec![0u8; 8];
        convert_elements(&s, &out, &source, 8, 2, &mut dst).unwrap();
        assert_eq!(floats(&dst), vec![2.0, 3.0]);
    }

    #[test]
    fn test_out_of_range_read() {
        let s = shape(ComponentType::Float, 3);
        let out = output_format(&s);
        let mut dst = vec![0u8; 24];
        let err = convert_elements(&s, &out, &[0u8; 20], 0, 2, &mut dst).unwrap_err();
        assert_eq!(
            err,
            VertexDataError::SourceOutOfRange {
                required: 24,
                available: 20
            }
        );
    }

    #[test]
    fn test_direct_storage_alignment() {
        use crate::vertex::source_buffer::{BufferUsageHint, SourceBuffer};
        use std::sync::Arc;

        let buffer = Arc::new(SourceBuffer::new(vec![0u8; 64], BufferUsageHint::Static));
        let max_stride = wgpu::Limits::default().max_vertex_buffer_array_stride;
        let aligned = VertexAttribute::buffer(buffer.clone(), ComponentType::Float, 3);
        assert!(direct_storage_possible(&aligned, max_stride));
        assert!(!direct_storage_possible(&aligned.clone().with_offset(2), max_stride));
        assert!(!direct_storage_possible(&aligned.clone().with_stride(14), max_stride));

        // Aligned, but wider than the device binds
        assert!(direct_storage_possible(&aligned.clone().with_stride(2048), max_stride));
        assert!(!direct_storage_possible(&aligned.clone().with_stride(2048), 1024));

        let shorts = VertexAttribute::buffer(buffer.clone(), ComponentType::Short, 2);
        assert!(!direct_storage_possible(&shorts, max_stride));

        let client = VertexAttribute::client(vec![0u8; 12], ComponentType::Float, 3);
        assert!(!direct_storage_possible(&client, max_stride));
    }
}
