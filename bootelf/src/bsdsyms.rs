//! Debug symbol-table export.
//!
//! Packs a copy of the file header, the full section-header table and every
//! string/symbol table section into one blob placed after the loaded
//! segments, so the booted kernel can read its own symbols without the
//! original file.
//!
//! ```text
//!   +0   u32 size of everything after this word
//!   +4   file header      (e_phoff = e_phentsize = e_phnum = 0, e_shoff = e_ehsize)
//!        section headers  (sh_offset of exported sections rebased to +4)
//!        pad to 4/8
//!        section data     (each padded to 4/8)
//! ```

use core::ops::Range;

use crate::binary::ElfBinary;
use crate::diag::{elf_err, elf_msg};
use crate::error::ElfError;
use crate::loader::CopyStrategy;
use crate::types::{SHT_STRTAB, SHT_SYMTAB};
use crate::view::{Ehdr, EhdrField, Record, Shdr, ShdrField};

/// Size prefix in front of the blob.
const SIZE_PREFIX: u64 = 4;

fn is_exported(sh_type: u64) -> bool {
    sh_type == SHT_STRTAB || sh_type == SHT_SYMTAB
}

impl ElfBinary<'_> {
    /// Reserve space for the debug symbol blob starting at `pstart` (rounded
    /// up to the class alignment).
    ///
    /// Does nothing if the image has no symbol table. The reserved range is
    /// available from [`ElfBinary::bsd_symtab`] and gets written by
    /// [`ElfBinary::load_binary`].
    pub fn parse_bsdsyms(&mut self, pstart: u64) {
        if self.sym_tab().is_none() {
            return;
        }

        let range = self.bsdsyms_size().and_then(|size| {
            let start = self.round_up(pstart)?;
            Some(start..start.checked_add(size)?)
        });

        match range {
            Some(range) => {
                elf_msg!(self, "bsd symtab: {:#x} -> {:#x}", range.start, range.end);
                self.bsd_symtab = Some(range);
            }
            None => elf_err!(self, "symbol tables not exportable, skipping"),
        }
    }

    /// Range reserved by [`ElfBinary::parse_bsdsyms`], in the same physical
    /// address space as `[pstart, pend)`.
    pub fn bsd_symtab(&self) -> Option<Range<u64>> {
        self.bsd_symtab.clone()
    }

    /// Total blob size, or `None` if the tables cannot be exported.
    fn bsdsyms_size(&self) -> Option<u64> {
        let layout = self.layout();
        let ehsize = self.uval(self.ehdr(), EhdrField::Ehsize);
        let shentsize = self.uval(self.ehdr(), EhdrField::Shentsize);

        // Fields get patched in place; records must be at least natural size.
        if ehsize < layout.size_of::<Ehdr>() as u64 || shentsize < layout.size_of::<Shdr>() as u64 {
            return None;
        }

        let shtab = self.shdr_count().checked_mul(shentsize)?;
        let mut size = self.round_up(SIZE_PREFIX.checked_add(ehsize)?.checked_add(shtab)?)?;

        for i in 0..self.shdr_count() {
            let shdr = self.shdr_by_index(i)?;
            if !is_exported(self.uval(shdr, ShdrField::Type)) {
                continue;
            }
            let len = self.section_bytes(shdr)?.len() as u64;
            size = self.round_up(size.checked_add(len)?)?;
        }

        // The prefix is a u32.
        u32::try_from(size - SIZE_PREFIX).ok()?;
        Some(size)
    }

    /// Write the blob into the range reserved by `parse_bsdsyms`.
    pub(crate) fn load_bsdsyms<C: CopyStrategy + ?Sized>(
        &self,
        copier: &mut C,
    ) -> Result<(), ElfError> {
        let Some(range) = self.bsd_symtab.clone() else {
            return Ok(());
        };
        let result = self.write_bsdsyms(range, copier);
        if let Err(e) = result {
            elf_err!(self, "bsd symtab: {}", e);
        }
        result
    }

    fn write_bsdsyms<C: CopyStrategy + ?Sized>(
        &self,
        range: Range<u64>,
        copier: &mut C,
    ) -> Result<(), ElfError> {
        let symbase = self.get_ptr(range.start)?;
        let at = |off: u64| {
            symbase
                .checked_add(off)
                .ok_or(ElfError::Bounds("symbol blob address wraps"))
        };

        let ehdr = self.ehdr();
        let ehsize = self.uval(ehdr, EhdrField::Ehsize);
        let shentsize = self.uval(ehdr, EhdrField::Shentsize);
        let shnum = self.shdr_count();

        // File header, pointed at the section headers that follow it.
        let mut pos = SIZE_PREFIX;
        let header = self
            .bytes_at(0, ehsize)
            .ok_or(ElfError::Bounds("ehdr beyond image"))?;
        copier.copy(at(pos)?, header)?;
        self.write_field::<Ehdr, C>(copier, at(pos)?, EhdrField::Phoff, 0)?;
        self.write_field::<Ehdr, C>(copier, at(pos)?, EhdrField::Shoff, ehsize)?;
        self.write_field::<Ehdr, C>(copier, at(pos)?, EhdrField::Phentsize, 0)?;
        self.write_field::<Ehdr, C>(copier, at(pos)?, EhdrField::Phnum, 0)?;
        pos += ehsize;

        // Section header table.
        let shtab = shnum
            .checked_mul(shentsize)
            .ok_or(ElfError::Bounds("shdr table size"))?;
        let table = self
            .bytes_at(self.uval(ehdr, EhdrField::Shoff), shtab)
            .ok_or(ElfError::Bounds("shdr overflow"))?;
        let shdr_base = pos;
        copier.copy(at(pos)?, table)?;
        pos = self.pad(copier, symbase, pos + shtab)?;

        for i in 0..shnum {
            let Some(shdr) = self.shdr_by_index(i) else {
                continue;
            };
            if !is_exported(self.uval(shdr, ShdrField::Type)) {
                continue;
            }
            let data = self
                .section_bytes(shdr)
                .ok_or(ElfError::Bounds("section beyond image"))?;
            elf_msg!(
                self,
                "shdr {} at {:#x} -> {:#x}",
                i,
                self.uval(shdr, ShdrField::Offset),
                at(pos)?
            );
            copier.copy(at(pos)?, data)?;

            // Offsets in the copy are relative to the copied file header.
            let entry = at(shdr_base + i * shentsize)?;
            self.write_field::<Shdr, C>(copier, entry, ShdrField::Offset, pos - SIZE_PREFIX)?;
            pos = self.pad(copier, symbase, pos + data.len() as u64)?;
        }

        let total = pos - SIZE_PREFIX;
        let mut prefix = [0u8; SIZE_PREFIX as usize];
        self.layout()
            .store(&mut prefix, 0, SIZE_PREFIX as usize, total)
            .ok_or(ElfError::Bounds("symbol blob too large"))?;
        copier.copy(symbase, &prefix)
    }

    /// Encode `value` into `field` of the `R` record at destination `record`.
    fn write_field<R: Record, C: CopyStrategy + ?Sized>(
        &self,
        copier: &mut C,
        record: u64,
        field: R::Field,
        value: u64,
    ) -> Result<(), ElfError> {
        let layout = self.layout();
        let (offset, width) = layout.locate::<R>(field);
        let mut buf = [0u8; 8];
        layout
            .store(&mut buf, 0, width, value)
            .ok_or(ElfError::Bounds("value does not fit field"))?;
        let dest = record
            .checked_add(offset as u64)
            .ok_or(ElfError::Bounds("symbol blob address wraps"))?;
        copier.copy(dest, &buf[..width])
    }

    /// Zero-fill from blob offset `pos` to the next alignment boundary.
    fn pad<C: CopyStrategy + ?Sized>(
        &self,
        copier: &mut C,
        symbase: u64,
        pos: u64,
    ) -> Result<u64, ElfError> {
        let next = self
            .round_up(pos)
            .ok_or(ElfError::Bounds("symbol blob size"))?;
        if next > pos {
            let dest = symbase
                .checked_add(pos)
                .ok_or(ElfError::Bounds("symbol blob address wraps"))?;
            copier.zero(dest, next - pos)?;
        }
        Ok(next)
    }
}
