//! Synthetic ELF image builder shared by the integration tests.
//!
//! Layout of a built image:
//!
//! ```text
//!   ehdr | phdrs | segment data... | section data... | pad | shdrs
//! ```
//!
//! Section 0 is the null section and the section-header string table is
//! always the last section.

#![allow(dead_code)]

use std::cell::RefCell;
use std::string::String;
use std::vec::Vec;

use bootelf::types::{ELFCLASS32, ELFCLASS64, ELFDATA2LSB, ELFDATA2MSB, ELF_MAGIC, SHT_STRTAB, SHT_SYMTAB};
use bootelf::{
    Ehdr, EhdrField, ElfClass, ElfData, ElfLog, Layout, Phdr, PhdrField, Record, Shdr, ShdrField,
    Sym, SymField,
};

pub const PT_LOAD: u64 = 1;
pub const PT_NOTE: u64 = 4;
pub const SHT_PROGBITS: u64 = 1;
pub const PF_RX: u64 = 5;
pub const PF_RW: u64 = 6;

pub struct Segment {
    pub p_type: u64,
    pub flags: u64,
    pub paddr: u64,
    pub data: Vec<u8>,
    pub memsz: u64,
}

pub struct Section {
    pub name: String,
    pub sh_type: u64,
    pub data: Vec<u8>,
    pub link: u64,
}

/// Offsets of interest inside a built image.
#[derive(Debug, Clone, Copy)]
pub struct Built {
    pub phoff: u64,
    pub shoff: u64,
    pub shstrndx: u64,
}

pub struct ImageBuilder {
    pub layout: Layout,
    pub segments: Vec<Segment>,
    pub sections: Vec<Section>,
}

impl ImageBuilder {
    pub fn new(class: ElfClass, data: ElfData) -> Self {
        Self {
            layout: Layout::new(class, data),
            segments: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn le64() -> Self {
        Self::new(ElfClass::Elf64, ElfData::Little)
    }

    /// Add a program header; its file bytes are `data`.
    pub fn segment(&mut self, p_type: u64, paddr: u64, data: &[u8], memsz: u64) -> &mut Self {
        self.segments.push(Segment {
            p_type,
            flags: PF_RX,
            paddr,
            data: data.to_vec(),
            memsz,
        });
        self
    }

    /// Add a section and return its index.
    pub fn section(&mut self, name: &str, sh_type: u64, data: Vec<u8>, link: u64) -> u64 {
        self.sections.push(Section {
            name: name.into(),
            sh_type,
            data,
            link,
        });
        self.sections.len() as u64
    }

    /// Encode symbol entries `(st_name, st_value)`, preceded by the null symbol.
    pub fn symbol_entries(&self, entries: &[(u64, u64)]) -> Vec<u8> {
        let mut out = self.record::<Sym>(&[]);
        for &(name, value) in entries {
            out.extend(self.record::<Sym>(&[
                (SymField::Name, name),
                (SymField::Value, value),
                (SymField::Info, 0x12),
                (SymField::Shndx, 1),
            ]));
        }
        out
    }

    /// Add a `.strtab`/`.symtab` pair holding `symbols`; returns the
    /// symbol table index.
    pub fn symbols(&mut self, symbols: &[(&str, u64)]) -> u64 {
        let (strtab, offsets) = string_table(symbols.iter().map(|(n, _)| *n));
        let strtab_index = self.section(".strtab", SHT_STRTAB, strtab, 0);
        let entries: Vec<(u64, u64)> = offsets
            .into_iter()
            .zip(symbols.iter().map(|(_, v)| *v))
            .collect();
        let data = self.symbol_entries(&entries);
        self.section(".symtab", SHT_SYMTAB, data, strtab_index)
    }

    /// Encode one `R` record with the given fields set.
    pub fn record<R: Record>(&self, fields: &[(R::Field, u64)]) -> Vec<u8> {
        let mut rec = vec![0u8; self.layout.size_of::<R>()];
        for &(field, value) in fields {
            self.layout.store_field::<R>(&mut rec, field, value).unwrap();
        }
        rec
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_offsets().0
    }

    pub fn build_with_offsets(&self) -> (Vec<u8>, Built) {
        let ehsize = self.layout.size_of::<Ehdr>() as u64;
        let phentsize = self.layout.size_of::<Phdr>() as u64;
        let shentsize = self.layout.size_of::<Shdr>() as u64;

        let names: Vec<&str> = self
            .sections
            .iter()
            .map(|s| s.name.as_str())
            .chain([".shstrtab"])
            .collect();
        let (shstrtab, name_offsets) = string_table(names.iter().copied());

        let phoff = if self.segments.is_empty() { 0 } else { ehsize };
        let mut image = vec![0u8; (ehsize + phentsize * self.segments.len() as u64) as usize];

        let mut phdrs = Vec::new();
        for seg in &self.segments {
            let offset = image.len() as u64;
            image.extend_from_slice(&seg.data);
            phdrs.extend(self.record::<Phdr>(&[
                (PhdrField::Type, seg.p_type),
                (PhdrField::Flags, seg.flags),
                (PhdrField::Offset, offset),
                (PhdrField::Vaddr, seg.paddr),
                (PhdrField::Paddr, seg.paddr),
                (PhdrField::Filesz, seg.data.len() as u64),
                (PhdrField::Memsz, seg.memsz),
                (PhdrField::Align, 8),
            ]));
        }
        image[phoff as usize..phoff as usize + phdrs.len()].copy_from_slice(&phdrs);

        let mut shdrs = self.record::<Shdr>(&[]);
        let all = self
            .sections
            .iter()
            .map(|s| (s.sh_type, &s.data, s.link))
            .chain([(SHT_STRTAB, &shstrtab, 0)]);
        for ((sh_type, data, link), name) in all.zip(name_offsets) {
            let offset = image.len() as u64;
            image.extend_from_slice(data);
            shdrs.extend(self.record::<Shdr>(&[
                (ShdrField::Name, name),
                (ShdrField::Type, sh_type),
                (ShdrField::Offset, offset),
                (ShdrField::Size, data.len() as u64),
                (ShdrField::Link, link),
                (ShdrField::Addralign, 1),
            ]));
        }
        while image.len() % 8 != 0 {
            image.push(0);
        }
        let shoff = image.len() as u64;
        image.extend_from_slice(&shdrs);

        let shnum = self.sections.len() as u64 + 2;
        let shstrndx = shnum - 1;
        let header = self.record::<Ehdr>(&[
            (EhdrField::Type, 2),
            (EhdrField::Machine, 62),
            (EhdrField::Version, 1),
            (EhdrField::Entry, self.segments.first().map_or(0, |s| s.paddr)),
            (EhdrField::Phoff, phoff),
            (EhdrField::Shoff, shoff),
            (EhdrField::Ehsize, ehsize),
            (EhdrField::Phentsize, phentsize),
            (EhdrField::Phnum, self.segments.len() as u64),
            (EhdrField::Shentsize, shentsize),
            (EhdrField::Shnum, shnum),
            (EhdrField::Shstrndx, shstrndx),
        ]);
        image[..header.len()].copy_from_slice(&header);
        image[..4].copy_from_slice(&ELF_MAGIC);
        image[4] = match self.layout.class() {
            ElfClass::Elf32 => ELFCLASS32,
            ElfClass::Elf64 => ELFCLASS64,
        };
        image[5] = match self.layout.data() {
            ElfData::Little => ELFDATA2LSB,
            ElfData::Big => ELFDATA2MSB,
        };
        image[6] = 1;

        (
            image,
            Built {
                phoff,
                shoff,
                shstrndx,
            },
        )
    }
}

/// NUL-separated string table with a leading empty string; returns the
/// table and the offset of each input string.
pub fn string_table<'s>(strings: impl Iterator<Item = &'s str>) -> (Vec<u8>, Vec<u64>) {
    let mut table = vec![0u8];
    let mut offsets = Vec::new();
    for s in strings {
        offsets.push(table.len() as u64);
        table.extend_from_slice(s.as_bytes());
        table.push(0);
    }
    (table, offsets)
}

/// Overwrite `field` of the `R` record at `record` in a built image.
pub fn patch<R: Record>(layout: Layout, image: &mut [u8], record: u64, field: R::Field, value: u64) {
    let size = layout.size_of::<R>();
    let start = record as usize;
    layout
        .store_field::<R>(&mut image[start..start + size], field, value)
        .unwrap();
}

/// Diagnostic sink that keeps every message.
#[derive(Default)]
pub struct Recorder {
    pub lines: RefCell<Vec<(bool, String)>>,
}

impl Recorder {
    pub fn errors(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(is_err, _)| *is_err)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|(_, l)| l.clone()).collect()
    }
}

impl ElfLog for Recorder {
    fn log(&self, is_err: bool, args: std::fmt::Arguments<'_>) {
        self.lines.borrow_mut().push((is_err, args.to_string()));
    }
}

/// The single-segment 64-bit image: one loadable segment at 0x100000 with
/// 16 bytes on disk and 32 in memory.
pub fn minimal64() -> Vec<u8> {
    let data: Vec<u8> = (1..=16).collect();
    let mut b = ImageBuilder::le64();
    b.segment(PT_LOAD, 0x100000, &data, 0x20);
    b.build()
}
