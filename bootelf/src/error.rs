//! Loader error taxonomy.

/// ELF loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ElfError {
    /// Missing or invalid ELF identification
    #[error("not an ELF binary")]
    Format,
    /// A table, field, or segment extent lies outside the source image
    #[error("{0}")]
    Bounds(&'static str),
    /// Destination write failed
    #[error("copy to destination failed at {addr:#x}")]
    Copy {
        /// Destination address of the failed access
        addr: u64,
    },
    /// Declared size does not fit the destination word width
    #[error("segment size {size:#x} exceeds the addressable word width")]
    Size {
        /// The offending size
        size: u64,
    },
    /// Symbol lookup had no match
    #[error("symbol not found")]
    NotFound,
}

impl ElfError {
    /// Negative status code for callers speaking the C-style status protocol.
    pub fn status(&self) -> i32 {
        match self {
            Self::Format => -1,
            Self::Bounds(_) => -2,
            Self::Copy { .. } => -3,
            Self::Size { .. } => -4,
            Self::NotFound => -5,
        }
    }
}
