//! Errors produced while translating vertex data.

/// Vertex data translation error.
///
/// Every error is local to one draw: the manager stays usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexDataError {
    /// A device buffer could not be created or grown.
    OutOfMemory {
        /// Bytes that were asked for
        requested: u64,
        /// Largest size the device or the static cache accepts
        limit: u64,
    },
    /// Offset or size arithmetic would wrap.
    Overflow(&'static str),
    /// The manager or a cache is not in a state that allows translation.
    InvalidState(&'static str),
    /// An attribute would read past the end of its source data.
    SourceOutOfRange {
        /// Bytes the attribute needs to read
        required: u64,
        /// Bytes the source holds
        available: u64,
    },
}

impl VertexDataError {
    /// Whether this error belongs to the out-of-memory class.
    ///
    /// Address overflow is reported the same way as a failed allocation.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. } | Self::Overflow(_))
    }
}

impl std::fmt::Display for VertexDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory { requested, limit } => write!(
                f,
                "Out of memory: requested {} bytes, limit is {} bytes",
                requested, limit
            ),
            Self::Overflow(what) => write!(f, "Arithmetic overflow computing {}", what),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::SourceOutOfRange {
                required,
                available,
            } => write!(
                f,
                "Attribute reads {} bytes but its source holds {} bytes",
                required, available
            ),
        }
    }
}

impl std::error::Error for VertexDataError {}
