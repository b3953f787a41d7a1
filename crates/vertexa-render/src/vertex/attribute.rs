//! Vertex attribute descriptors and element-count math.

use std::sync::Arc;

use super::source_buffer::SourceBuffer;

/// Number of attribute slots a draw can use.
pub const MAX_VERTEX_ATTRIBS: usize = 16;

/// Scalar type of one attribute component as stored in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
    /// 16.16 signed fixed point
    Fixed,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort | Self::HalfFloat => 2,
            Self::Int | Self::UnsignedInt | Self::Float | Self::Fixed => 4,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::HalfFloat | Self::Float)
    }
}

/// Where an attribute reads its data from.
#[derive(Debug, Clone)]
pub enum AttributeSource {
    /// A shared source buffer.
    Buffer(Arc<SourceBuffer>),
    /// Raw client memory supplied with the draw.
    Client(Arc<[u8]>),
}

impl Default for AttributeSource {
    fn default() -> Self {
        Self::Client(Arc::from(Vec::new()))
    }
}

/// Describes how one attribute slot reads its elements.
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub enabled: bool,
    pub component_type: ComponentType,
    /// Components per element, 1 to 4.
    pub components: u8,
    pub normalized: bool,
    pub pure_integer: bool,
    /// Byte stride between elements, 0 for tightly packed.
    pub stride: u32,
    /// Byte offset of the first element.
    pub offset: u64,
    /// Advance once per `divisor` instances, 0 for per-vertex data.
    pub divisor: u32,
    pub source: AttributeSource,
}

impl Default for VertexAttribute {
    fn default() -> Self {
        Self {
            enabled: false,
            component_type: ComponentType::Float,
            components: 4,
            normalized: false,
            pure_integer: false,
            stride: 0,
            offset: 0,
            divisor: 0,
            source: AttributeSource::default(),
        }
    }
}

impl VertexAttribute {
    /// Create an enabled attribute reading from `buffer`.
    ///
    /// `components` is clamped to 1..=4.
    pub fn buffer(
        buffer: Arc<SourceBuffer>,
        component_type: ComponentType,
        components: u8,
    ) -> Self {
        Self {
            enabled: true,
            component_type,
            components: components.clamp(1, 4),
            source: AttributeSource::Buffer(buffer),
            ..Default::default()
        }
    }

    /// Create an enabled attribute reading from client memory.
    pub fn client(data: impl Into<Arc<[u8]>>, component_type: ComponentType, components: u8) -> Self {
        Self {
            enabled: true,
            component_type,
            components: components.clamp(1, 4),
            source: AttributeSource::Client(data.into()),
            ..Default::default()
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn pure_integer(mut self) -> Self {
        self.pure_integer = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Size of one source element in bytes.
    pub fn type_size(&self) -> u32 {
        self.component_type.size() * self.components as u32
    }

    /// The API stride, or the element size when the attribute is tightly packed.
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.type_size()
        } else {
            self.stride
        }
    }

    /// The source buffer, if the attribute has one.
    pub fn source_buffer(&self) -> Option<&Arc<SourceBuffer>> {
        match &self.source {
            AttributeSource::Buffer(buffer) => Some(buffer),
            AttributeSource::Client(_) => None,
        }
    }

    /// Key under which a static cache stores this attribute's conversion.
    pub fn shape(&self) -> AttributeShape {
        let stride = self.effective_stride();
        AttributeShape {
            component_type: self.component_type,
            components: self.components,
            normalized: self.normalized,
            pure_integer: self.pure_integer,
            stride,
            offset_in_stride: if stride == 0 {
                0
            } else {
                (self.offset % stride as u64) as u32
            },
        }
    }
}

/// Everything that determines the converted bytes of an attribute, except
/// which element it starts at.
///
/// Two attributes with equal shapes over the same buffer produce identical
/// converted data, so they can share a static cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeShape {
    pub component_type: ComponentType,
    pub components: u8,
    pub normalized: bool,
    pub pure_integer: bool,
    pub stride: u32,
    pub offset_in_stride: u32,
}

impl AttributeShape {
    pub fn type_size(&self) -> u32 {
        self.component_type.size() * self.components as u32
    }
}

/// Number of whole elements of `attrib` a buffer of `byte_size` bytes holds,
/// counting from the first element at `offset % stride`.
///
/// Sizes beyond `i32::MAX` are clamped and the arithmetic saturates, so the
/// result never wraps.
pub fn elements_in_buffer(attrib: &VertexAttribute, byte_size: u64) -> u32 {
    let stride = attrib.effective_stride() as u64;
    if stride == 0 {
        return 0;
    }

    let size = byte_size.min(i32::MAX as u64);
    let slack = stride.saturating_sub(attrib.type_size() as u64);
    let count = (size + slack).saturating_sub(attrib.offset % stride) / stride;
    count.min(u32::MAX as u64) as u32
}

/// Number of elements a streamed attribute needs for one draw.
///
/// Instanced attributes need one element per `divisor` instances, rounded up.
pub fn streaming_element_count(
    attrib: &VertexAttribute,
    vertex_count: u32,
    instance_count: u32,
) -> u32 {
    if instance_count > 0 && attrib.divisor > 0 {
        instance_count.div_ceil(attrib.divisor)
    } else {
        vertex_count
    }
}

/// Index of the first element a draw reads.
///
/// Instanced attributes always start at element 0.
pub fn first_vertex_index(attrib: &VertexAttribute, start: u32, instance_count: u32) -> u32 {
    if instance_count > 0 && attrib.divisor > 0 {
        0
    } else {
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float3() -> VertexAttribute {
        VertexAttribute::client(vec![0u8; 0], ComponentType::Float, 3)
    }

    #[test]
    fn test_effective_stride() {
        assert_eq!(float3().effective_stride(), 12);
        assert_eq!(float3().with_stride(32).effective_stride(), 32);
        assert_eq!(
            VertexAttribute::client(vec![0u8; 0], ComponentType::UnsignedByte, 3).type_size(),
            3
        );
    }

    #[test]
    fn test_components_are_clamped() {
        let attrib = VertexAttribute::client(vec![0u8; 0], ComponentType::Short, 9);
        assert_eq!(attrib.components, 4);
        let attrib = VertexAttribute::client(vec![0u8; 0], ComponentType::Short, 0);
        assert_eq!(attrib.components, 1);
    }

    #[test]
    fn test_elements_in_buffer_exact_fit() {
        let attrib = float3().with_stride(16).with_offset(4);
        for n in 0..10u64 {
            assert_eq!(elements_in_buffer(&attrib, n * 16 + 4), n as u32);
        }
    }

    #[test]
    fn test_elements_in_buffer_counts_trailing_partial_stride() {
        // The last element only needs its own 12 bytes, not a whole 16-byte stride.
        let attrib = float3().with_stride(16);
        assert_eq!(elements_in_buffer(&attrib, 16 + 12), 2);
        assert_eq!(elements_in_buffer(&attrib, 16 + 11), 1);
    }

    #[test]
    fn test_elements_in_buffer_monotonic() {
        let attrib = float3().with_stride(20).with_offset(8);
        let mut previous = 0;
        for size in 0..400 {
            let count = elements_in_buffer(&attrib, size);
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn test_elements_in_buffer_clamps_huge_sizes() {
        let attrib = VertexAttribute::client(vec![0u8; 0], ComponentType::UnsignedByte, 1);
        assert_eq!(elements_in_buffer(&attrib, u64::MAX), i32::MAX as u32);
    }

    #[test]
    fn test_elements_in_buffer_offset_past_end() {
        let attrib = float3().with_offset(8);
        assert_eq!(elements_in_buffer(&attrib, 4), 0);
    }

    #[test]
    fn test_streaming_element_count() {
        let per_vertex = float3();
        assert_eq!(streaming_element_count(&per_vertex, 10, 0), 10);
        assert_eq!(streaming_element_count(&per_vertex, 10, 7), 10);

        let instanced = float3().with_divisor(3);
        assert_eq!(streaming_element_count(&instanced, 10, 7), 3);
        assert_eq!(streaming_element_count(&instanced, 10, 6), 2);
        assert_eq!(streaming_element_count(&instanced, 10, 0), 10);

        for instances in 1..50u32 {
            for divisor in 1..8u32 {
                let attrib = float3().with_divisor(divisor);
                let expected = (instances + divisor - 1) / divisor;
                assert_eq!(streaming_element_count(&attrib, 4, instances), expected);
            }
        }
    }

    #[test]
    fn test_first_vertex_index() {
        assert_eq!(first_vertex_index(&float3(), 5, 0), 5);
        assert_eq!(first_vertex_index(&float3(), 5, 2), 5);
        assert_eq!(first_vertex_index(&float3().with_divisor(1), 5, 2), 0);
        assert_eq!(first_vertex_index(&float3().with_divisor(1), 5, 0), 5);
    }

    #[test]
    fn test_shape_uses_offset_modulo_stride() {
        let a = float3().with_stride(16).with_offset(4);
        let b = float3().with_stride(16).with_offset(36);
        let c = float3().with_stride(16).with_offset(8);
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), c.shape());
    }
}
