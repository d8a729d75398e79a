//! Image context: validation, table walkers and section helpers.

use core::fmt;
use core::ops::Range;

use crate::diag::{elf_err, Diag, ElfLog, DEFAULT_SINK};
use crate::error::ElfError;
use crate::handle::Handle;
use crate::types::{
    ElfClass, ElfData, SegmentFlags, EI_CLASS, EI_DATA, EI_NIDENT, ELF_MAGIC, PT_LOAD,
    SHT_NOBITS, SHT_SYMTAB,
};
use crate::view::{
    Ehdr, EhdrField, Layout, Phdr, PhdrField, ProgramHeader, Record, SectionHeader, Shdr,
    ShdrField,
};

/// One kernel image being loaded.
///
/// Created once from a byte buffer by [`ElfBinary::new`]; construction
/// either yields a fully validated context or an error, never a partial one.
/// The context only borrows the image and holds no state beyond the load it
/// describes.
pub struct ElfBinary<'a> {
    image: &'a [u8],
    layout: Layout,
    ehdr: Handle<Ehdr>,
    /// Section-header string table, if `e_shstrndx` resolves
    sec_strtab: Option<Handle<Shdr>>,
    /// First symbol table whose `sh_link` resolves
    sym_tab: Option<Handle<Shdr>>,
    sym_strtab: Option<Handle<Shdr>>,
    dest_base: u64,
    pub(crate) pstart: u64,
    pub(crate) pend: u64,
    pub(crate) bsd_symtab: Option<Range<u64>>,
    diag: Diag<'a>,
}

impl<'a> ElfBinary<'a> {
    /// Validate `image` and build its context, logging through the `log`
    /// crate.
    pub fn new(image: &'a [u8]) -> Result<Self, ElfError> {
        Self::with_log(image, &DEFAULT_SINK, false)
    }

    /// Validate `image` and build its context with a caller-supplied
    /// diagnostic sink.
    ///
    /// # Errors
    ///
    /// * [`ElfError::Format`] - too short, bad magic, unknown class or byte order
    /// * [`ElfError::Bounds`] - program or section header table beyond the image
    pub fn with_log(
        image: &'a [u8],
        sink: &'a dyn ElfLog,
        verbose: bool,
    ) -> Result<Self, ElfError> {
        let diag = Diag { sink, verbose };

        let Some(layout) = identify(image) else {
            elf_err!(diag, "not an ELF binary");
            return Err(ElfError::Format);
        };

        let mut elf = Self {
            image,
            layout,
            ehdr: Handle::new(0),
            sec_strtab: None,
            sym_tab: None,
            sym_strtab: None,
            dest_base: 0,
            pstart: u64::MAX,
            pend: 0,
            bsd_symtab: None,
            diag,
        };

        elf.check_table(EhdrField::Phoff, EhdrField::Phentsize, elf.phdr_count(), "phdr overflow")?;
        elf.check_table(EhdrField::Shoff, EhdrField::Shentsize, elf.shdr_count(), "shdr overflow")?;

        // Missing section names are not fatal.
        elf.sec_strtab = elf.shdr_by_index(elf.uval(elf.ehdr, EhdrField::Shstrndx));

        // First symbol table with a resolvable string table wins.
        for i in 0..elf.shdr_count() {
            let Some(shdr) = elf.shdr_by_index(i) else {
                continue;
            };
            if elf.uval(shdr, ShdrField::Type) != SHT_SYMTAB {
                continue;
            }
            if let Some(strtab) = elf.shdr_by_index(elf.uval(shdr, ShdrField::Link)) {
                elf.sym_tab = Some(shdr);
                elf.sym_strtab = Some(strtab);
                break;
            }
        }

        Ok(elf)
    }

    /// Replace the diagnostic sink and verbosity.
    pub fn set_log(&mut self, sink: &'a dyn ElfLog, verbose: bool) {
        self.diag = Diag { sink, verbose };
    }

    /// Set the address at which the caller mapped `pstart`.
    pub fn set_dest_base(&mut self, base: u64) {
        self.dest_base = base;
    }

    pub fn dest_base(&self) -> u64 {
        self.dest_base
    }

    pub(crate) fn emit(&self, is_err: bool, args: fmt::Arguments<'_>) {
        self.diag.emit(is_err, args);
    }

    /// Check `off + entsize * count <= image size` for one header table.
    fn check_table(
        &self,
        off_field: EhdrField,
        ent_field: EhdrField,
        count: u64,
        what: &'static str,
    ) -> Result<(), ElfError> {
        let off = self.uval(self.ehdr, off_field);
        let entsize = self.uval(self.ehdr, ent_field);
        let end = entsize.checked_mul(count).and_then(|n| n.checked_add(off));

        match end {
            Some(end) if end <= self.image.len() as u64 => Ok(()),
            _ => {
                elf_err!(
                    self,
                    "{} (off {:#x} > size {:#x})",
                    what,
                    end.unwrap_or(u64::MAX),
                    self.image.len()
                );
                Err(ElfError::Bounds(what))
            }
        }
    }

    // ------------------------------------------------------------------
    // Header view
    // ------------------------------------------------------------------

    /// Read a record field through its handle, widened to `u64`.
    ///
    /// Reads as 0 if the record does not lie within this image.
    pub fn uval<R: Record>(&self, handle: Handle<R>, field: R::Field) -> u64 {
        self.layout
            .field::<R>(self.image, handle.offset(), field)
            .unwrap_or(0)
    }

    pub fn image(&self) -> &'a [u8] {
        self.image
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn class(&self) -> ElfClass {
        self.layout.class()
    }

    pub fn data(&self) -> ElfData {
        self.layout.data()
    }

    pub fn ehdr(&self) -> Handle<Ehdr> {
        self.ehdr
    }

    /// Entry point virtual address
    pub fn entry(&self) -> u64 {
        self.uval(self.ehdr, EhdrField::Entry)
    }

    pub fn machine(&self) -> u64 {
        self.uval(self.ehdr, EhdrField::Machine)
    }

    pub fn phdr_count(&self) -> u64 {
        self.uval(self.ehdr, EhdrField::Phnum)
    }

    pub fn shdr_count(&self) -> u64 {
        self.uval(self.ehdr, EhdrField::Shnum)
    }

    pub fn sec_strtab(&self) -> Option<Handle<Shdr>> {
        self.sec_strtab
    }

    pub fn sym_tab(&self) -> Option<Handle<Shdr>> {
        self.sym_tab
    }

    pub fn sym_strtab(&self) -> Option<Handle<Shdr>> {
        self.sym_strtab
    }

    /// Round `addr` up to the class alignment (4 or 8 bytes).
    pub(crate) fn round_up(&self, addr: u64) -> Option<u64> {
        let mask = self.class().round() - 1;
        addr.checked_add(mask).map(|a| a & !mask)
    }

    // ------------------------------------------------------------------
    // Table walkers
    // ------------------------------------------------------------------

    fn table_entry<R: Record>(
        &self,
        off_field: EhdrField,
        ent_field: EhdrField,
        count: u64,
        index: u64,
    ) -> Option<Handle<R>> {
        if index >= count {
            return None;
        }
        let off = self.uval(self.ehdr, off_field);
        let entsize = self.uval(self.ehdr, ent_field);
        let start = entsize.checked_mul(index)?.checked_add(off)?;
        let end = start.checked_add(self.layout.size_of::<R>() as u64)?;
        if end > self.image.len() as u64 {
            return None;
        }
        Some(Handle::new(usize::try_from(start).ok()?))
    }

    /// Handle to program header `index`, or `None` if out of range.
    pub fn phdr_by_index(&self, index: u64) -> Option<Handle<Phdr>> {
        self.table_entry(EhdrField::Phoff, EhdrField::Phentsize, self.phdr_count(), index)
    }

    /// Handle to section header `index`, or `None` if out of range.
    pub fn shdr_by_index(&self, index: u64) -> Option<Handle<Shdr>> {
        self.table_entry(EhdrField::Shoff, EhdrField::Shentsize, self.shdr_count(), index)
    }

    /// All resolvable program headers, in table order.
    pub fn program_headers(&self) -> impl Iterator<Item = Handle<Phdr>> + '_ {
        (0..self.phdr_count()).filter_map(move |i| self.phdr_by_index(i))
    }

    /// All resolvable section headers, in table order.
    pub fn section_headers(&self) -> impl Iterator<Item = Handle<Shdr>> + '_ {
        (0..self.shdr_count()).filter_map(move |i| self.shdr_by_index(i))
    }

    /// Whether the segment is of loadable type.
    pub fn is_loadable(&self, phdr: Handle<Phdr>) -> bool {
        self.uval(phdr, PhdrField::Type) == PT_LOAD
    }

    /// Decode a program header entry.
    pub fn phdr(&self, phdr: Handle<Phdr>) -> ProgramHeader {
        let flags = self.uval(phdr, PhdrField::Flags) as u32;
        ProgramHeader {
            p_type: self.uval(phdr, PhdrField::Type),
            flags: SegmentFlags::from_bits_truncate(flags),
            offset: self.uval(phdr, PhdrField::Offset),
            vaddr: self.uval(phdr, PhdrField::Vaddr),
            paddr: self.uval(phdr, PhdrField::Paddr),
            filesz: self.uval(phdr, PhdrField::Filesz),
            memsz: self.uval(phdr, PhdrField::Memsz),
            align: self.uval(phdr, PhdrField::Align),
        }
    }

    /// Decode a section header entry.
    pub fn shdr(&self, shdr: Handle<Shdr>) -> SectionHeader {
        SectionHeader {
            name: self.uval(shdr, ShdrField::Name),
            sh_type: self.uval(shdr, ShdrField::Type),
            flags: self.uval(shdr, ShdrField::Flags),
            addr: self.uval(shdr, ShdrField::Addr),
            offset: self.uval(shdr, ShdrField::Offset),
            size: self.uval(shdr, ShdrField::Size),
            link: self.uval(shdr, ShdrField::Link),
            info: self.uval(shdr, ShdrField::Info),
            addralign: self.uval(shdr, ShdrField::Addralign),
            entsize: self.uval(shdr, ShdrField::Entsize),
        }
    }

    // ------------------------------------------------------------------
    // Section and segment contents
    // ------------------------------------------------------------------

    /// `len` bytes of the image starting at `offset`, if all in range.
    pub(crate) fn bytes_at(&self, offset: u64, len: u64) -> Option<&'a [u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        self.image.get(start..end)
    }

    /// Raw contents of a section. `SHT_NOBITS` sections are empty.
    pub fn section_bytes(&self, shdr: Handle<Shdr>) -> Option<&'a [u8]> {
        if self.uval(shdr, ShdrField::Type) == SHT_NOBITS {
            return Some(&[]);
        }
        self.bytes_at(
            self.uval(shdr, ShdrField::Offset),
            self.uval(shdr, ShdrField::Size),
        )
    }

    /// On-disk contents of a segment (`p_filesz` bytes at `p_offset`).
    pub fn segment_bytes(&self, phdr: Handle<Phdr>) -> Option<&'a [u8]> {
        self.bytes_at(
            self.uval(phdr, PhdrField::Offset),
            self.uval(phdr, PhdrField::Filesz),
        )
    }

    /// NUL-terminated string at `offset` inside string table `strtab`.
    ///
    /// `None` if the offset is outside the section, the section is outside
    /// the image, or the string is unterminated.
    pub fn strval(&self, strtab: Handle<Shdr>, offset: u64) -> Option<&'a [u8]> {
        let table = self.section_bytes(strtab)?;
        let tail = table.get(usize::try_from(offset).ok()?..)?;
        let len = tail.iter().position(|&b| b == 0)?;
        Some(&tail[..len])
    }

    /// Name of a section, if the section-header string table is present.
    pub fn section_name(&self, shdr: Handle<Shdr>) -> Option<&'a str> {
        let name = self.strval(self.sec_strtab?, self.uval(shdr, ShdrField::Name))?;
        core::str::from_utf8(name).ok()
    }

    /// First section called `name`.
    pub fn section_by_name(&self, name: &str) -> Option<Handle<Shdr>> {
        let strtab = self.sec_strtab?;
        self.section_headers().find(|&shdr| {
            self.strval(strtab, self.uval(shdr, ShdrField::Name)) == Some(name.as_bytes())
        })
    }
}

impl fmt::Debug for ElfBinary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfBinary")
            .field("size", &self.image.len())
            .field("layout", &self.layout)
            .field("sec_strtab", &self.sec_strtab)
            .field("sym_tab", &self.sym_tab)
            .field("sym_strtab", &self.sym_strtab)
            .field("dest_base", &self.dest_base)
            .field("pstart", &self.pstart)
            .field("pend", &self.pend)
            .field("bsd_symtab", &self.bsd_symtab)
            .field("verbose", &self.diag.verbose)
            .finish()
    }
}

/// Check the identification bytes and pick the header layout.
fn identify(image: &[u8]) -> Option<Layout> {
    let ident = image.get(..EI_NIDENT)?;
    if ident[..4] != ELF_MAGIC {
        return None;
    }
    let class = ElfClass::from_ident(ident[EI_CLASS])?;
    let data = ElfData::from_ident(ident[EI_DATA])?;
    let layout = Layout::new(class, data);
    if image.len() < layout.size_of::<Ehdr>() {
        return None;
    }
    Some(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header64(phoff: u64, phnum: u16, shoff: u64, shnum: u16) -> [u8; 64] {
        let mut h = [0u8; 64];
        h[..4].copy_from_slice(&ELF_MAGIC);
        h[EI_CLASS] = 2;
        h[EI_DATA] = 1;
        h[32..40].copy_from_slice(&phoff.to_le_bytes());
        h[40..48].copy_from_slice(&shoff.to_le_bytes());
        h[52..54].copy_from_slice(&64u16.to_le_bytes());
        h[54..56].copy_from_slice(&56u16.to_le_bytes());
        h[56..58].copy_from_slice(&phnum.to_le_bytes());
        h[58..60].copy_from_slice(&64u16.to_le_bytes());
        h[60..62].copy_from_slice(&shnum.to_le_bytes());
        h
    }

    #[test]
    fn test_header_only_image() {
        let image = header64(0, 0, 0, 0);
        let elf = ElfBinary::new(&image).unwrap();
        assert_eq!(elf.class(), ElfClass::Elf64);
        assert_eq!(elf.data(), ElfData::Little);
        assert!(elf.sym_tab().is_none());
        assert!(elf.sec_strtab().is_none());
        assert_eq!(elf.phdr_by_index(0), None);
    }

    #[test]
    fn test_identify_rejects_unknown_class() {
        let mut image = header64(0, 0, 0, 0);
        image[EI_CLASS] = 9;
        assert_eq!(ElfBinary::new(&image).unwrap_err(), ElfError::Format);
    }

    #[test]
    fn test_identify_rejects_truncated_header() {
        let image = header64(0, 0, 0, 0);
        assert_eq!(ElfBinary::new(&image[..63]).unwrap_err(), ElfError::Format);
    }

    #[test]
    fn test_table_extent_overflow_is_rejected() {
        let image = header64(u64::MAX - 8, 1, 0, 0);
        assert_eq!(
            ElfBinary::new(&image).unwrap_err(),
            ElfError::Bounds("phdr overflow")
        );
    }

    #[test]
    fn test_round_up_per_class() {
        let image = header64(0, 0, 0, 0);
        let elf = ElfBinary::new(&image).unwrap();
        assert_eq!(elf.round_up(0x11), Some(0x18));
        assert_eq!(elf.round_up(0x18), Some(0x18));
        assert_eq!(elf.round_up(u64::MAX), None);
    }

    #[test]
    fn test_bytes_at_checks_extent() {
        let image = header64(0, 0, 0, 0);
        let elf = ElfBinary::new(&image).unwrap();
        assert_eq!(elf.bytes_at(60, 4).map(|b| b.len()), Some(4));
        assert_eq!(elf.bytes_at(60, 5), None);
        assert_eq!(elf.bytes_at(u64::MAX, 1), None);
    }
}
