//! ELF format constants and identification types.

use bitflags::bitflags;

/// ELF magic number: 0x7F 'E' 'L' 'F'
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Size of `e_ident`
pub const EI_NIDENT: usize = 16;

/// Index of the class byte in `e_ident`
pub const EI_CLASS: usize = 4;

/// Index of the data encoding byte in `e_ident`
pub const EI_DATA: usize = 5;

/// ELF class: 32-bit
pub const ELFCLASS32: u8 = 1;

/// ELF class: 64-bit
pub const ELFCLASS64: u8 = 2;

/// ELF data encoding: little endian
pub const ELFDATA2LSB: u8 = 1;

/// ELF data encoding: big endian
pub const ELFDATA2MSB: u8 = 2;

/// Program header type: loadable segment
pub const PT_LOAD: u64 = 1;

/// Section type: symbol table
pub const SHT_SYMTAB: u64 = 2;

/// Section type: string table
pub const SHT_STRTAB: u64 = 3;

/// Section type: occupies no file space
pub const SHT_NOBITS: u64 = 8;

/// Width class of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    /// ELFCLASS32
    Elf32,
    /// ELFCLASS64
    Elf64,
}

impl ElfClass {
    /// Decode `e_ident[EI_CLASS]`.
    pub fn from_ident(byte: u8) -> Option<Self> {
        match byte {
            ELFCLASS32 => Some(Self::Elf32),
            ELFCLASS64 => Some(Self::Elf64),
            _ => None,
        }
    }

    /// Alignment used when packing tables into the exported symbol blob.
    pub fn round(self) -> u64 {
        match self {
            Self::Elf32 => 4,
            Self::Elf64 => 8,
        }
    }
}

/// Byte order of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfData {
    /// ELFDATA2LSB
    Little,
    /// ELFDATA2MSB
    Big,
}

impl ElfData {
    /// Decode `e_ident[EI_DATA]`.
    pub fn from_ident(byte: u8) -> Option<Self> {
        match byte {
            ELFDATA2LSB => Some(Self::Little),
            ELFDATA2MSB => Some(Self::Big),
            _ => None,
        }
    }
}

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Executable
        const X = 1;
        /// Writable
        const W = 2;
        /// Readable
        const R = 4;
    }
}
