//! Symbol table lookup.
//!
//! The symbol table and its string table are located once, at construction
//! (see [`ElfBinary::with_log`]). Lookups are linear scans over the
//! `sh_size / size_of::<Sym>()` entries of that table, clamped to the image.

use crate::binary::ElfBinary;
use crate::diag::{elf_err, elf_msg};
use crate::error::ElfError;
use crate::handle::Handle;
use crate::view::{ShdrField, Sym, SymField, Symbol};

/// Value returned by [`ElfBinary::lookup_addr`] when the name is unknown.
pub const SYMBOL_NOT_FOUND: u64 = u64::MAX;

impl<'a> ElfBinary<'a> {
    /// Number of entries in the located symbol table (0 if there is none).
    ///
    /// `sh_size` is clamped to the bytes between `sh_offset` and the end of
    /// the image, so scans never run past entries that can exist.
    pub fn sym_count(&self) -> u64 {
        let Some(symtab) = self.sym_tab() else {
            return 0;
        };
        let size = self.uval(symtab, ShdrField::Size);
        let in_image =
            (self.image().len() as u64).saturating_sub(self.uval(symtab, ShdrField::Offset));
        size.min(in_image) / self.layout().size_of::<Sym>() as u64
    }

    /// Handle to symbol `index`, or `None` if out of range.
    pub fn sym_by_index(&self, index: u64) -> Option<Handle<Sym>> {
        let symtab = self.sym_tab()?;
        if index >= self.sym_count() {
            return None;
        }
        let symsize = self.layout().size_of::<Sym>() as u64;
        let start = index
            .checked_mul(symsize)?
            .checked_add(self.uval(symtab, ShdrField::Offset))?;
        let end = start.checked_add(symsize)?;
        if end > self.image().len() as u64 {
            return None;
        }
        Some(Handle::new(usize::try_from(start).ok()?))
    }

    /// Decode a symbol table entry.
    pub fn sym(&self, sym: Handle<Sym>) -> Symbol {
        Symbol {
            name: self.uval(sym, SymField::Name),
            value: self.uval(sym, SymField::Value),
            size: self.uval(sym, SymField::Size),
            info: self.uval(sym, SymField::Info),
            other: self.uval(sym, SymField::Other),
            shndx: self.uval(sym, SymField::Shndx),
        }
    }

    /// Raw name bytes of a symbol; `None` if the name offset is bad.
    pub fn symbol_name_bytes(&self, sym: Handle<Sym>) -> Option<&'a [u8]> {
        self.strval(self.sym_strtab()?, self.uval(sym, SymField::Name))
    }

    /// Name of a symbol, if it resolves and is valid UTF-8.
    pub fn symbol_name(&self, sym: Handle<Sym>) -> Option<&'a str> {
        core::str::from_utf8(self.symbol_name_bytes(sym)?).ok()
    }

    /// Iterate over every entry of the symbol table.
    pub fn symbols(&self) -> SymbolIter<'_, 'a> {
        SymbolIter {
            elf: self,
            next: 0,
            count: self.sym_count(),
        }
    }

    /// First symbol named `name`.
    ///
    /// Entries whose name offset falls outside the string table are skipped.
    pub fn sym_by_name(&self, name: &str) -> Option<Handle<Sym>> {
        self.symbols()
            .find(|&sym| self.symbol_name_bytes(sym) == Some(name.as_bytes()))
    }

    /// Value of symbol `name`.
    ///
    /// # Errors
    ///
    /// [`ElfError::NotFound`] (with an error diagnostic) if no entry matches.
    pub fn find_symbol(&self, name: &str) -> Result<u64, ElfError> {
        let Some(sym) = self.sym_by_name(name) else {
            elf_err!(self, "not found: {}", name);
            return Err(ElfError::NotFound);
        };
        let value = self.uval(sym, SymField::Value);
        elf_msg!(self, "symbol \"{}\" at {:#x}", name, value);
        Ok(value)
    }

    /// Value of symbol `name`, or [`SYMBOL_NOT_FOUND`].
    pub fn lookup_addr(&self, name: &str) -> u64 {
        self.find_symbol(name).unwrap_or(SYMBOL_NOT_FOUND)
    }
}

/// Iterator over symbol table entries, see [`ElfBinary::symbols`].
#[derive(Debug)]
pub struct SymbolIter<'e, 'a> {
    elf: &'e ElfBinary<'a>,
    next: u64,
    count: u64,
}

impl Iterator for SymbolIter<'_, '_> {
    type Item = Handle<Sym>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.count {
            let index = self.next;
            self.next += 1;
            if let Some(sym) = self.elf.sym_by_index(index) {
                return Some(sym);
            }
        }
        None
    }
}
