use std::path::PathBuf;
use std::process::ExitCode;

use bootelf::ElfError;

/// All errors produced by bootelf-dump.
///
/// Variants are split into two categories:
/// - **Infrastructure errors** (exit code 2): unreadable input, unwritable output, serialization
/// - **Image errors** (exit code 1): the loader rejected the image or a query failed
#[derive(thiserror::Error, Debug)]
pub enum DumpError {
    // ── Infrastructure errors (exit code 2) ──────────────────────────

    #[error("Image not found: {path}")]
    ImageNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Image errors (exit code 1) ───────────────────────────────────

    #[error("ELF error: {0}")]
    Elf(#[from] ElfError),

    #[error("Symbol not found: {name}")]
    SymbolNotFound { name: String },

    #[error("Image has no loadable segments")]
    NothingToLoad,

    #[error("Load image too large: {size:#x} bytes (limit {limit:#x})")]
    TooLarge { size: u64, limit: u64 },
}

impl DumpError {
    /// Numeric process exit code.
    ///
    /// - `2`: infrastructure error
    /// - `1`: the image was rejected or a query failed
    pub fn code(&self) -> u8 {
        match self {
            Self::ImageNotFound { .. } | Self::Io(_) | Self::Json(_) => 2,

            Self::Elf(_)
            | Self::SymbolNotFound { .. }
            | Self::NothingToLoad
            | Self::TooLarge { .. } => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}
