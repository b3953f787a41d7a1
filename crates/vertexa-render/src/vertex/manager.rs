//! Per-draw translation of vertex attributes into bindable buffer regions.

use std::sync::Arc;

use vertexa_core::profiling::{profile_function, profile_scope};
use vertexa_test_utils::{GpuBuffer, RenderContext};

use super::{
    attribute::{
        MAX_VERTEX_ATTRIBS, AttributeSource, VertexAttribute, elements_in_buffer,
        first_vertex_index, streaming_element_count,
    },
    buffer::StreamingVertexBuffer,
    conversion::{check_source_range, convert_elements, direct_storage_possible, output_format},
    current_value::{CurrentValue, CurrentValueSlot, CurrentValueType},
    serial::Serial,
    source_buffer::SourceBuffer,
    state::DrawState,
};
use crate::{config::VertexDataConfig, error::VertexDataError};

/// How a translated attribute reaches the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TranslationKind {
    /// The slot is not read by the program.
    #[default]
    Inactive,
    /// Bound straight from the source buffer.
    Direct,
    /// Served from the source buffer's static cache.
    StaticCache,
    /// Converted into the shared streaming buffer.
    Streaming,
    /// A disabled attribute's constant value.
    CurrentValue,
}

/// One slot of [`VertexDataManager::prepare_vertex_data`]'s output.
#[derive(Debug, Clone, Default)]
pub struct TranslatedAttribute {
    pub active: bool,
    pub kind: TranslationKind,
    /// Device buffer to bind.
    pub buffer: Option<GpuBuffer>,
    /// Source buffer bound directly, for direct storage.
    pub storage: Option<Arc<SourceBuffer>>,
    /// Content generation of `buffer` at translation time.
    pub serial: Serial,
    pub format: Option<wgpu::VertexFormat>,
    pub stride: u32,
    pub offset: u64,
    pub divisor: u32,
    pub attribute: Option<VertexAttribute>,
    pub current_value_type: CurrentValueType,
}

impl TranslatedAttribute {
    /// Vertex step mode matching this slot's divisor.
    pub fn step_mode(&self) -> wgpu::VertexStepMode {
        if self.divisor > 0 {
            wgpu::VertexStepMode::Instance
        } else {
            wgpu::VertexStepMode::Vertex
        }
    }
}

/// Result of one [`VertexDataManager::prepare_vertex_data`] call.
pub type TranslatedAttributes = [TranslatedAttribute; MAX_VERTEX_ATTRIBS];

/// Where an enabled attribute's data goes this draw.
enum Destination<'a> {
    Direct(&'a Arc<SourceBuffer>),
    Static(&'a Arc<SourceBuffer>),
    Streaming,
}

impl<'a> Destination<'a> {
    fn select(attrib: &'a VertexAttribute, max_stride: u32) -> Self {
        match attrib.source_buffer() {
            Some(buffer) if direct_storage_possible(attrib, max_stride) => Self::Direct(buffer),
            // A source holding no whole element leaves nothing to cache
            Some(buffer)
                if buffer.has_static_cache()
                    && elements_in_buffer(attrib, buffer.byte_size()) > 0 =>
            {
                Self::Static(buffer)
            }
            _ => Self::Streaming,
        }
    }
}

fn check_element_size(attrib: &VertexAttribute) -> Result<(), VertexDataError> {
    if attrib.type_size() == 0 || attrib.components > 4 {
        return Err(VertexDataError::InvalidState(
            "attribute components must be between 1 and 4",
        ));
    }
    Ok(())
}

/// Draw parameters shared by every slot.
#[derive(Debug, Clone, Copy)]
struct DrawRange {
    start: u32,
    count: u32,
    instances: u32,
}

/// Buffers touched by the draw in flight.
#[derive(Default)]
struct Batch {
    static_sources: Vec<Arc<SourceBuffer>>,
}

impl Batch {
    fn touch(&mut self, source: &Arc<SourceBuffer>) {
        if !self.static_sources.iter().any(|s| Arc::ptr_eq(s, source)) {
            self.static_sources.push(source.clone());
        }
    }
}

/// Translates attribute state into device-ready buffer regions.
///
/// Per draw and per attribute, the manager decides between binding the source
/// buffer directly, reusing the source's static cache, or converting into a
/// shared streaming buffer. Space for every attribute is reserved before any
/// data is written.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vertexa_render::{
///     BufferUsageHint, ComponentType, SourceBuffer, TranslationKind, VertexArrayState,
///     VertexAttribute, VertexDataManager,
/// };
/// use vertexa_test_utils::MockRenderContext;
///
/// let ctx = Arc::new(MockRenderContext::new());
/// let mut manager = VertexDataManager::new(ctx);
///
/// let positions = Arc::new(SourceBuffer::from_slice(&[0.0f32; 30], BufferUsageHint::Static));
/// let mut state = VertexArrayState::new();
/// state.set_attribute(0, VertexAttribute::buffer(positions, ComponentType::Float, 3));
///
/// let translated = manager.prepare_vertex_data(&state, 5, 5, 0).unwrap();
/// assert_eq!(translated[0].kind, TranslationKind::Direct);
/// assert_eq!(translated[0].offset, 60);
/// ```
pub struct VertexDataManager {
    context: Arc<dyn RenderContext>,
    config: VertexDataConfig,
    streaming: Option<StreamingVertexBuffer>,
    current_values: [CurrentValueSlot; MAX_VERTEX_ATTRIBS],
    batch: Option<Batch>,
}

impl VertexDataManager {
    pub fn new(context: Arc<dyn RenderContext>) -> Self {
        Self::with_config(context, VertexDataConfig::default())
    }

    /// Create a manager with custom buffer sizes and promotion policy.
    ///
    /// A streaming buffer that cannot be allocated is logged; every later
    /// draw then fails with [`VertexDataError::InvalidState`].
    pub fn with_config(context: Arc<dyn RenderContext>, config: VertexDataConfig) -> Self {
        let streaming = match StreamingVertexBuffer::new(
            context.as_ref(),
            config.initial_streaming_buffer_size,
            "Vertexa Streaming Vertex Buffer",
        ) {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                tracing::error!("Failed to allocate the streaming vertex buffer: {}", err);
                None
            }
        };

        Self {
            context,
            config,
            streaming,
            current_values: Default::default(),
            batch: None,
        }
    }

    pub fn config(&self) -> &VertexDataConfig {
        &self.config
    }

    /// Whether the streaming buffer exists, i.e. draws can be translated.
    pub fn is_ready(&self) -> bool {
        self.streaming.is_some()
    }

    /// Whether any buffer owned by the manager has unflushed writes.
    pub fn has_mapped_buffers(&self) -> bool {
        self.streaming.as_ref().is_some_and(StreamingVertexBuffer::is_mapped)
            || self.current_values.iter().any(CurrentValueSlot::is_mapped)
    }

    /// Translate every attribute slot for a draw of `count` vertices starting
    /// at `start`, with `instances` instances (0 for a non-instanced draw).
    ///
    /// On error no buffer is left mapped and the manager stays usable.
    pub fn prepare_vertex_data(
        &mut self,
        state: &dyn DrawState,
        start: u32,
        count: u32,
        instances: u32,
    ) -> Result<TranslatedAttributes, VertexDataError> {
        profile_function!();
        if self.streaming.is_none() {
            return Err(VertexDataError::InvalidState(
                "streaming vertex buffer is unavailable",
            ));
        }

        let range = DrawRange {
            start,
            count,
            instances,
        };
        tracing::trace!(
            "Preparing vertex data: start {}, count {}, instances {}",
            start,
            count,
            instances
        );

        self.begin_batch();
        let result = self.translate(state, range);
        // Flushes and drops reservations on the error path too
        self.end_batch();

        let translated = result.map_err(|(slot, err)| {
            tracing::warn!("Failed to translate vertex attribute {}: {}", slot, err);
            err
        })?;

        for slot in 0..MAX_VERTEX_ATTRIBS {
            let attrib = state.vertex_attribute(slot);
            if translated[slot].active
                && attrib.enabled
                && let Some(buffer) = attrib.source_buffer()
            {
                let bytes = count as u64 * attrib.type_size() as u64;
                buffer.promote_static_usage(bytes, &self.config.promotion);
            }
        }

        Ok(translated)
    }

    /// Prime, reserve and store every slot. Errors carry the failing slot.
    fn translate(
        &mut self,
        state: &dyn DrawState,
        range: DrawRange,
    ) -> Result<TranslatedAttributes, (usize, VertexDataError)> {
        let max_stride = self.context.max_vertex_buffer_array_stride();
        let mut translated: TranslatedAttributes = Default::default();

        // Cache priming may replace a static cache, so it runs before any
        // destination is decided.
        for (slot, out) in translated.iter_mut().enumerate() {
            out.active = state.is_slot_active(slot);
            let attrib = state.vertex_attribute(slot);
            if out.active
                && attrib.enabled
                && let Some(buffer) = attrib.source_buffer()
            {
                buffer.static_cache_for(attrib, max_stride);
            }
        }

        for slot in 0..MAX_VERTEX_ATTRIBS {
            let attrib = state.vertex_attribute(slot);
            if !translated[slot].active || !attrib.enabled {
                continue;
            }
            self.reserve_space(attrib, range).map_err(|err| (slot, err))?;
        }

        for slot in 0..MAX_VERTEX_ATTRIBS {
            if !translated[slot].active {
                continue;
            }
            let attrib = state.vertex_attribute(slot);
            translated[slot] = if attrib.enabled {
                self.store_attribute(attrib, state.current_value(slot).value_type(), range)
            } else {
                self.store_current_value(slot, attrib, state.current_value(slot))
            }
            .map_err(|err| (slot, err))?;
        }

        Ok(translated)
    }

    fn begin_batch(&mut self) {
        if self.batch.is_some() {
            tracing::warn!("Vertex data batch started while another was open");
            self.end_batch();
        }
        self.batch = Some(Batch::default());
    }

    /// Flush every buffer written during the batch and drop unconsumed
    /// reservations.
    fn end_batch(&mut self) {
        profile_scope!("end_batch");
        let batch = self.batch.take().unwrap_or_default();
        let ctx = self.context.as_ref();

        if let Some(streaming) = &mut self.streaming {
            streaming.hint_unmap(ctx);
            streaming.cancel_reservation();
        }
        for slot in &mut self.current_values {
            slot.hint_unmap(ctx);
        }
        for source in &batch.static_sources {
            source.with_static_cache(|cache, _| {
                cache.hint_unmap(ctx);
                cache.cancel_reservation();
            });
        }
    }

    fn batch(&mut self) -> &mut Batch {
        self.batch.get_or_insert_with(Batch::default)
    }

    fn reserve_space(
        &mut self,
        attrib: &VertexAttribute,
        range: DrawRange,
    ) -> Result<(), VertexDataError> {
        check_element_size(attrib)?;
        let shape = attrib.shape();
        let element_size = output_format(&shape).element_size();

        match Destination::select(attrib, self.context.max_vertex_buffer_array_stride()) {
            Destination::Direct(_) => Ok(()),
            Destination::Static(buffer) => {
                self.batch().touch(buffer);
                buffer
                    .with_static_cache(|cache, data| {
                        if cache.lookup(&shape).is_some() {
                            return Ok(());
                        }
                        let total = elements_in_buffer(attrib, data.len() as u64);
                        let bytes = element_size as u64 * total as u64;
                        cache.reserve(shape, bytes)
                    })
                    .unwrap_or(Ok(()))
            }
            Destination::Streaming => {
                let total = streaming_element_count(attrib, range.count, range.instances);
                match &mut self.streaming {
                    Some(streaming) => streaming.reserve_elements(element_size, total),
                    None => Err(VertexDataError::InvalidState(
                        "streaming vertex buffer is unavailable",
                    )),
                }
            }
        }
    }

    fn store_attribute(
        &mut self,
        attrib: &VertexAttribute,
        current_value_type: CurrentValueType,
        range: DrawRange,
    ) -> Result<TranslatedAttribute, VertexDataError> {
        check_element_size(attrib)?;
        let shape = attrib.shape();
        let output = output_format(&shape);
        let element_size = output.element_size();
        let stride = attrib.effective_stride();
        let first = first_vertex_index(attrib, range.start, range.instances);
        let total = streaming_element_count(attrib, range.count, range.instances);

        let mut out = TranslatedAttribute {
            active: true,
            format: Some(output.format),
            divisor: attrib.divisor,
            attribute: Some(attrib.clone()),
            current_value_type,
            ..Default::default()
        };

        if let Some(buffer) = attrib.source_buffer()
            && total > 0
        {
            // Element indices count from the element at `offset % stride`
            let available = elements_in_buffer(attrib, buffer.byte_size()) as u64;
            let needed = (attrib.offset / stride as u64)
                .checked_add(first as u64)
                .and_then(|n| n.checked_add(total as u64))
                .ok_or(VertexDataError::Overflow("source element range"))?;
            if needed > available {
                return Err(VertexDataError::SourceOutOfRange {
                    required: needed.saturating_mul(stride as u64),
                    available: buffer.byte_size(),
                });
            }
        }

        match Destination::select(attrib, self.context.max_vertex_buffer_array_stride()) {
            Destination::Direct(buffer) => {
                let offset = (stride as u64)
                    .checked_mul(first as u64)
                    .and_then(|o| o.checked_add(attrib.offset))
                    .ok_or(VertexDataError::Overflow("direct attribute offset"))?;
                let (gpu, serial) = buffer.device_buffer(self.context.as_ref())?;

                out.kind = TranslationKind::Direct;
                out.buffer = Some(gpu);
                out.storage = Some(buffer.clone());
                out.serial = serial;
                out.stride = stride;
                out.offset = offset;
            }
            Destination::Static(buffer) => {
                self.batch().touch(buffer);
                let ctx = self.context.as_ref();
                let (base, gpu, serial) = buffer
                    .with_static_cache(|cache, data| -> Result<_, VertexDataError> {
                        let base = match cache.lookup(&shape) {
                            Some(base) => base,
                            None => {
                                let count = elements_in_buffer(attrib, data.len() as u64);
                                let len = element_size as u64 * count as u64;
                                let first_byte = attrib.offset % stride as u64;
                                let (base, view) = cache.allocate(ctx, len)?;
                                convert_elements(&shape, &output, data, first_byte, count, view)?;
                                cache.record(shape, base);
                                base
                            }
                        };
                        let gpu = cache.gpu_buffer().cloned().ok_or(
                            VertexDataError::InvalidState("static cache has no backing store"),
                        )?;
                        Ok((base, gpu, cache.serial()))
                    })
                    .unwrap_or(Err(VertexDataError::InvalidState(
                        "static cache disappeared during the draw",
                    )))?;

                let first_element_offset = (attrib.offset / stride as u64)
                    .checked_mul(element_size as u64)
                    .ok_or(VertexDataError::Overflow("static cache offset"))?;
                let start_offset = first as u64 * element_size as u64;
                let offset = base
                    .checked_add(first_element_offset)
                    .and_then(|o| o.checked_add(start_offset))
                    .ok_or(VertexDataError::Overflow("static cache offset"))?;

                out.kind = TranslationKind::StaticCache;
                out.buffer = Some(gpu);
                out.serial = serial;
                out.stride = element_size;
                out.offset = offset;
            }
            Destination::Streaming => {
                let ctx = self.context.as_ref();
                let Some(streaming) = &mut self.streaming else {
                    return Err(VertexDataError::InvalidState(
                        "streaming vertex buffer is unavailable",
                    ));
                };

                let first_byte = (stride as u64)
                    .checked_mul(first as u64)
                    .and_then(|o| o.checked_add(attrib.offset))
                    .ok_or(VertexDataError::Overflow("streaming source offset"))?;
                let len = element_size as u64 * total as u64;

                let mut stream = |data: &[u8]| -> Result<u64, VertexDataError> {
                    check_source_range(&shape, data.len(), first_byte, total)?;
                    let (offset, view) = streaming.allocate(ctx, len)?;
                    convert_elements(&shape, &output, data, first_byte, total, view)?;
                    Ok(offset)
                };
                let offset = match &attrib.source {
                    AttributeSource::Buffer(buffer) => buffer.with_data(&mut stream)?,
                    AttributeSource::Client(bytes) => stream(&bytes[..])?,
                };

                out.kind = TranslationKind::Streaming;
                out.buffer = Some(streaming.gpu_buffer().clone());
                out.serial = streaming.serial();
                out.stride = element_size;
                out.offset = offset;
            }
        }

        Ok(out)
    }

    fn store_current_value(
        &mut self,
        slot: usize,
        attrib: &VertexAttribute,
        value: CurrentValue,
    ) -> Result<TranslatedAttribute, VertexDataError> {
        let stored = self.current_values[slot].store(
            self.context.as_ref(),
            value,
            self.config.constant_buffer_size,
        )?;

        Ok(TranslatedAttribute {
            active: true,
            kind: TranslationKind::CurrentValue,
            buffer: Some(stored.buffer),
            storage: None,
            serial: stored.serial,
            format: Some(value.vertex_format()),
            stride: 0,
            offset: stored.offset,
            divisor: 0,
            attribute: Some(attrib.clone()),
            current_value_type: value.value_type(),
        })
    }
}
