//! Header view: one access path for every record field.
//!
//! ELF records come in two widths (32/64-bit) and two byte orders. A
//! [`Layout`] is selected once from `e_ident` and from then on every field
//! read goes through [`Layout::field`], which bounds-checks the whole record
//! before decoding the field and widens the result to `u64`.
//!
//! Record kinds are zero-sized markers implementing [`Record`]; each carries
//! its own field enum, so a program-header field can never be read through a
//! section-header handle.

use crate::types::{ElfClass, ElfData, SegmentFlags, PT_LOAD};

/// Class and byte order of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    class: ElfClass,
    data: ElfData,
}

impl Layout {
    pub const fn new(class: ElfClass, data: ElfData) -> Self {
        Self { class, data }
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn data(&self) -> ElfData {
        self.data
    }

    /// Natural size of one `R` record for this class.
    pub fn size_of<R: Record>(&self) -> usize {
        R::size(self.class)
    }

    /// Offset and width of `field` within an `R` record.
    pub fn locate<R: Record>(&self, field: R::Field) -> (usize, usize) {
        R::locate(self.class, field)
    }

    /// Read an unsigned integer of `width` bytes at `offset`.
    pub fn read(&self, bytes: &[u8], offset: usize, width: usize) -> Option<u64> {
        if width > 8 {
            return None;
        }
        let raw = bytes.get(offset..offset.checked_add(width)?)?;
        let mut buf = [0u8; 8];
        match self.data {
            ElfData::Little => {
                buf[..width].copy_from_slice(raw);
                Some(u64::from_le_bytes(buf))
            }
            ElfData::Big => {
                buf[8 - width..].copy_from_slice(raw);
                Some(u64::from_be_bytes(buf))
            }
        }
    }

    /// Encode `value` as `width` bytes at `offset`. Fails if the value does
    /// not fit the field or the slot lies outside `dst`.
    pub fn store(&self, dst: &mut [u8], offset: usize, width: usize, value: u64) -> Option<()> {
        if width > 8 || (width < 8 && value >> (width * 8) != 0) {
            return None;
        }
        let slot = dst.get_mut(offset..offset.checked_add(width)?)?;
        match self.data {
            ElfData::Little => slot.copy_from_slice(&value.to_le_bytes()[..width]),
            ElfData::Big => slot.copy_from_slice(&value.to_be_bytes()[8 - width..]),
        }
        Some(())
    }

    /// Read `field` of the `R` record starting at `record`.
    ///
    /// The full record extent is checked against `bytes` first, so a field
    /// is never decoded out of a truncated record.
    pub fn field<R: Record>(&self, bytes: &[u8], record: usize, field: R::Field) -> Option<u64> {
        let end = record.checked_add(self.size_of::<R>())?;
        if end > bytes.len() {
            return None;
        }
        let (offset, width) = self.locate::<R>(field);
        self.read(bytes, record + offset, width)
    }

    /// Mirror of [`Layout::field`]: encode `value` into `field` of the `R`
    /// record held in `dst`.
    pub fn store_field<R: Record>(&self, dst: &mut [u8], field: R::Field, value: u64) -> Option<()> {
        let (offset, width) = self.locate::<R>(field);
        self.store(dst, offset, width, value)
    }
}

/// A fixed-layout ELF record kind.
pub trait Record {
    /// Field selector for this record kind.
    type Field: Copy;

    /// Record name used in diagnostics.
    const KIND: &'static str;

    /// Natural record size for `class`.
    fn size(class: ElfClass) -> usize;

    /// `(offset, width)` of `field` for `class`.
    fn locate(class: ElfClass, field: Self::Field) -> (usize, usize);
}

/// File header marker.
#[derive(Debug)]
pub enum Ehdr {}

/// Program header marker.
#[derive(Debug)]
pub enum Phdr {}

/// Section header marker.
#[derive(Debug)]
pub enum Shdr {}

/// Symbol table entry marker.
#[derive(Debug)]
pub enum Sym {}

/// File header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EhdrField {
    Type,
    Machine,
    Version,
    Entry,
    Phoff,
    Shoff,
    Flags,
    Ehsize,
    Phentsize,
    Phnum,
    Shentsize,
    Shnum,
    Shstrndx,
}

impl Record for Ehdr {
    type Field = EhdrField;
    const KIND: &'static str = "ehdr";

    fn size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }

    fn locate(class: ElfClass, field: EhdrField) -> (usize, usize) {
        use EhdrField::*;
        match class {
            ElfClass::Elf32 => match field {
                Type => (16, 2),
                Machine => (18, 2),
                Version => (20, 4),
                Entry => (24, 4),
                Phoff => (28, 4),
                Shoff => (32, 4),
                Flags => (36, 4),
                Ehsize => (40, 2),
                Phentsize => (42, 2),
                Phnum => (44, 2),
                Shentsize => (46, 2),
                Shnum => (48, 2),
                Shstrndx => (50, 2),
            },
            ElfClass::Elf64 => match field {
                Type => (16, 2),
                Machine => (18, 2),
                Version => (20, 4),
                Entry => (24, 8),
                Phoff => (32, 8),
                Shoff => (40, 8),
                Flags => (48, 4),
                Ehsize => (52, 2),
                Phentsize => (54, 2),
                Phnum => (56, 2),
                Shentsize => (58, 2),
                Shnum => (60, 2),
                Shstrndx => (62, 2),
            },
        }
    }
}

/// Program header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhdrField {
    Type,
    Flags,
    Offset,
    Vaddr,
    Paddr,
    Filesz,
    Memsz,
    Align,
}

impl Record for Phdr {
    type Field = PhdrField;
    const KIND: &'static str = "phdr";

    fn size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 56,
        }
    }

    fn locate(class: ElfClass, field: PhdrField) -> (usize, usize) {
        use PhdrField::*;
        match class {
            ElfClass::Elf32 => match field {
                Type => (0, 4),
                Offset => (4, 4),
                Vaddr => (8, 4),
                Paddr => (12, 4),
                Filesz => (16, 4),
                Memsz => (20, 4),
                Flags => (24, 4),
                Align => (28, 4),
            },
            ElfClass::Elf64 => match field {
                Type => (0, 4),
                Flags => (4, 4),
                Offset => (8, 8),
                Vaddr => (16, 8),
                Paddr => (24, 8),
                Filesz => (32, 8),
                Memsz => (40, 8),
                Align => (48, 8),
            },
        }
    }
}

/// Section header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShdrField {
    Name,
    Type,
    Flags,
    Addr,
    Offset,
    Size,
    Link,
    Info,
    Addralign,
    Entsize,
}

impl Record for Shdr {
    type Field = ShdrField;
    const KIND: &'static str = "shdr";

    fn size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        }
    }

    fn locate(class: ElfClass, field: ShdrField) -> (usize, usize) {
        use ShdrField::*;
        match class {
            ElfClass::Elf32 => match field {
                Name => (0, 4),
                Type => (4, 4),
                Flags => (8, 4),
                Addr => (12, 4),
                Offset => (16, 4),
                Size => (20, 4),
                Link => (24, 4),
                Info => (28, 4),
                Addralign => (32, 4),
                Entsize => (36, 4),
            },
            ElfClass::Elf64 => match field {
                Name => (0, 4),
                Type => (4, 4),
                Flags => (8, 8),
                Addr => (16, 8),
                Offset => (24, 8),
                Size => (32, 8),
                Link => (40, 4),
                Info => (44, 4),
                Addralign => (48, 8),
                Entsize => (56, 8),
            },
        }
    }
}

/// Symbol table entry fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymField {
    Name,
    Value,
    Size,
    Info,
    Other,
    Shndx,
}

impl Record for Sym {
    type Field = SymField;
    const KIND: &'static str = "sym";

    fn size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        }
    }

    fn locate(class: ElfClass, field: SymField) -> (usize, usize) {
        use SymField::*;
        match class {
            ElfClass::Elf32 => match field {
                Name => (0, 4),
                Value => (4, 4),
                Size => (8, 4),
                Info => (12, 1),
                Other => (13, 1),
                Shndx => (14, 2),
            },
            ElfClass::Elf64 => match field {
                Name => (0, 4),
                Info => (4, 1),
                Other => (5, 1),
                Shndx => (6, 2),
                Value => (8, 8),
                Size => (16, 8),
            },
        }
    }
}

/// Program header entry, normalized to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type
    pub p_type: u64,
    /// Segment permissions
    pub flags: SegmentFlags,
    /// Segment file offset
    pub offset: u64,
    /// Segment virtual address
    pub vaddr: u64,
    /// Segment physical address
    pub paddr: u64,
    /// Size of segment data in file
    pub filesz: u64,
    /// Size of segment in memory
    pub memsz: u64,
    /// Alignment requirement
    pub align: u64,
}

impl ProgramHeader {
    /// Whether this segment gets copied into memory at boot.
    pub fn is_loadable(&self) -> bool {
        self.p_type == PT_LOAD
    }
}

/// Section header entry, normalized to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Name offset into the section-header string table
    pub name: u64,
    /// Section type
    pub sh_type: u64,
    /// Section flags
    pub flags: u64,
    /// Section virtual address
    pub addr: u64,
    /// Section file offset
    pub offset: u64,
    /// Section size
    pub size: u64,
    /// Link to another section
    pub link: u64,
    /// Additional section information
    pub info: u64,
    /// Section alignment
    pub addralign: u64,
    /// Entry size if section holds table
    pub entsize: u64,
}

/// Symbol table entry, normalized to 64-bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Name offset into the symbol string table
    pub name: u64,
    /// Symbol value (usually an address)
    pub value: u64,
    /// Symbol size
    pub size: u64,
    /// Type and binding
    pub info: u64,
    /// Visibility
    pub other: u64,
    /// Section index
    pub shndx: u64,
}
