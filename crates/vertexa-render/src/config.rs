//! Configuration for the vertex data manager.

/// Initial size of the shared streaming buffer (1 MiB).
pub const INITIAL_STREAM_BUFFER_SIZE: u64 = 1024 * 1024;

/// Size of each per-slot constant buffer.
///
/// Kept at 4 KiB; some drivers misbehave with smaller vertex buffers.
pub const CONSTANT_VERTEX_BUFFER_SIZE: u64 = 4096;

/// Configuration for [`VertexDataManager`](crate::VertexDataManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDataConfig {
    /// Size in bytes of the streaming buffer allocated at construction.
    pub initial_streaming_buffer_size: u64,
    /// Size in bytes of a lazily created current-value buffer.
    pub constant_buffer_size: u64,
    /// When source buffers switch from streaming to a static cache.
    pub promotion: PromotionPolicy,
}

impl Default for VertexDataConfig {
    fn default() -> Self {
        Self {
            initial_streaming_buffer_size: INITIAL_STREAM_BUFFER_SIZE,
            constant_buffer_size: CONSTANT_VERTEX_BUFFER_SIZE,
            promotion: PromotionPolicy::default(),
        }
    }
}

impl VertexDataConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial streaming buffer size.
    pub fn streaming_buffer_size(mut self, size: u64) -> Self {
        self.initial_streaming_buffer_size = size;
        self
    }

    /// Set the per-slot constant buffer size.
    pub fn constant_buffer_size(mut self, size: u64) -> Self {
        self.constant_buffer_size = size;
        self
    }

    /// Set the static cache promotion policy.
    pub fn promotion(mut self, promotion: PromotionPolicy) -> Self {
        self.promotion = promotion;
        self
    }
}

/// Static cache promotion heuristic.
///
/// A source buffer without a static cache accumulates the bytes draws
/// converted from it. Once that total exceeds
/// `unmodified_use_factor * buffer size` without the buffer changing, the
/// buffer creates a static cache and later draws stop streaming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionPolicy {
    pub unmodified_use_factor: u64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            unmodified_use_factor: 3,
        }
    }
}

impl PromotionPolicy {
    /// Promote after `factor` times the buffer size has been converted.
    pub const fn with_factor(factor: u64) -> Self {
        Self {
            unmodified_use_factor: factor,
        }
    }

    /// Never promote; buffers only get a static cache through their usage hint.
    pub const fn never() -> Self {
        Self::with_factor(u64::MAX)
    }

    /// Accumulated use a buffer of `buffer_size` bytes must exceed.
    pub fn threshold(&self, buffer_size: u64) -> u64 {
        buffer_size.saturating_mul(self.unmodified_use_factor)
    }
}
