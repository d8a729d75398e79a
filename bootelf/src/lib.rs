//! Bounds-checked ELF kernel image loader.
//!
//! This crate loads a kernel image in ELF format into memory owned by a
//! virtualization host, so the host can boot it as a guest (or as its own
//! management kernel) without trusting the image to be well-formed.
//!
//! # Flow
//!
//! 1. [`ElfBinary::new`] validates the image and locates the symbol tables
//! 2. [`ElfBinary::parse_binary`] computes `[pstart, pend)`
//! 3. The caller maps a destination region of `pend - pstart` bytes
//!    (plus [`ElfBinary::parse_bsdsyms`] space if wanted)
//! 4. [`ElfBinary::load_binary`] copies every loadable segment through a
//!    [`CopyStrategy`]
//! 5. [`ElfBinary::lookup_addr`] resolves symbols
//!
//! # Security
//!
//! - Every header field goes through one bounds-checked access path
//! - Table extents are checked against the image once, at construction
//! - Offset and size arithmetic is checked; nothing in here panics on input

#![no_std]

#[cfg(test)]
extern crate std;

pub mod binary;
pub mod bsdsyms;
pub mod diag;
pub mod error;
pub mod handle;
pub mod loader;
pub mod range;
pub mod symbols;
pub mod types;
pub mod view;

pub use binary::ElfBinary;
pub use diag::{ElfLog, LogSink};
pub use error::ElfError;
pub use handle::Handle;
pub use loader::{CopyStrategy, DirectCopy, GuardedCopy, GuestFault, GuestMemory};
pub use symbols::{SymbolIter, SYMBOL_NOT_FOUND};
pub use types::{ElfClass, ElfData, SegmentFlags};
pub use view::{
    Ehdr, EhdrField, Layout, Phdr, PhdrField, ProgramHeader, Record, SectionHeader, Shdr,
    ShdrField, Sym, SymField, Symbol,
};
