//! Debug symbol table export after the loaded segments.

mod common;

use bootelf::{DirectCopy, EhdrField, ElfBinary, ElfClass, ElfData, Layout};
use common::{ImageBuilder, Recorder, PT_LOAD, SHT_PROGBITS};

fn kernel(class: ElfClass, data: ElfData) -> Vec<u8> {
    let mut b = ImageBuilder::new(class, data);
    b.segment(PT_LOAD, 0x100000, &[0x5a; 0x13], 0x1d);
    b.section(".text", SHT_PROGBITS, vec![0x90; 0x13], 0);
    b.symbols(&[("_start", 0x100000), ("panic", 0x100008)]);
    b.build()
}

/// Load `image` with symbol export and return the destination and the
/// blob's range inside it.
fn load_with_syms(image: &[u8]) -> (Vec<u8>, core::ops::Range<usize>) {
    let mut elf = ElfBinary::new(image).unwrap();
    elf.parse_binary();
    elf.parse_bsdsyms(elf.pend());
    let syms = elf.bsd_symtab().unwrap();

    let mut dest = vec![0xCCu8; (syms.end - elf.pstart()) as usize];
    elf.load_binary(&mut DirectCopy::new(&mut dest, 0)).unwrap();
    let start = (syms.start - elf.pstart()) as usize;
    let end = (syms.end - elf.pstart()) as usize;
    (dest, start..end)
}

#[test]
fn test_blob_is_a_readable_elf() {
    for (class, data) in [
        (ElfClass::Elf32, ElfData::Big),
        (ElfClass::Elf32, ElfData::Little),
        (ElfClass::Elf64, ElfData::Little),
        (ElfClass::Elf64, ElfData::Big),
    ] {
        let image = kernel(class, data);
        let (dest, range) = load_with_syms(&image);
        let blob = &dest[range];

        let copy = ElfBinary::new(&blob[4..]).unwrap();
        assert_eq!(copy.class(), class);
        assert_eq!(copy.phdr_count(), 0);
        assert_eq!(copy.uval(copy.ehdr(), EhdrField::Phoff), 0);
        assert_eq!(copy.uval(copy.ehdr(), EhdrField::Phentsize), 0);
        assert_eq!(
            copy.uval(copy.ehdr(), EhdrField::Shoff),
            copy.uval(copy.ehdr(), EhdrField::Ehsize)
        );
        assert_eq!(copy.lookup_addr("panic"), 0x100008);
        assert_eq!(copy.lookup_addr("_start"), 0x100000);
        // The section-name table is a string table, so names survive.
        assert!(copy.section_by_name(".symtab").is_some());
    }
}

#[test]
fn test_size_prefix_matches_reservation() {
    for (class, data) in [(ElfClass::Elf32, ElfData::Big), (ElfClass::Elf64, ElfData::Little)] {
        let image = kernel(class, data);
        let (dest, range) = load_with_syms(&image);
        let blob = &dest[range.clone()];

        let prefix = Layout::new(class, data).read(blob, 0, 4).unwrap();
        assert_eq!(prefix, (range.len() - 4) as u64);
        assert_eq!(range.start % class.round() as usize, 0);
        assert_eq!(range.len() % class.round() as usize, 0);
    }
}

#[test]
fn test_blob_starts_after_segments() {
    let image = kernel(ElfClass::Elf64, ElfData::Little);
    let mut elf = ElfBinary::new(&image).unwrap();
    elf.parse_binary();
    assert_eq!(elf.pend(), 0x10001d);
    elf.parse_bsdsyms(elf.pend());
    assert_eq!(elf.bsd_symtab().unwrap().start, 0x100020);

    let (dest, range) = load_with_syms(&image);
    assert_eq!(&dest[..0x13], &[0x5a; 0x13]);
    assert_eq!(&dest[0x13..0x1d], &[0; 10]);
    // Gap between pend and the aligned blob start is left alone.
    assert_eq!(&dest[0x1d..range.start], &[0xCC; 3]);
}

#[test]
fn test_no_symtab_reserves_nothing() {
    let mut b = ImageBuilder::le64();
    b.segment(PT_LOAD, 0x100000, &[1; 8], 8);
    let image = b.build();
    let log = Recorder::default();
    let mut elf = ElfBinary::with_log(&image, &log, true).unwrap();
    elf.parse_binary();
    elf.parse_bsdsyms(elf.pend());
    assert!(elf.bsd_symtab().is_none());
    assert!(log.errors().is_empty());
}

#[test]
fn test_blob_outside_destination_fails_load() {
    let image = kernel(ElfClass::Elf64, ElfData::Little);
    let log = Recorder::default();
    let mut elf = ElfBinary::with_log(&image, &log, false).unwrap();
    elf.parse_binary();
    elf.parse_bsdsyms(elf.pend());

    // Sized for the segments only.
    let mut dest = vec![0u8; elf.memory_size() as usize];
    assert!(elf.load_binary(&mut DirectCopy::new(&mut dest, 0)).is_err());
    assert_eq!(dest[0], 0x5a);
    assert_eq!(log.errors().len(), 1);
    assert!(log.errors()[0].starts_with("bsd symtab:"));
}

#[test]
fn test_verbose_export_messages() {
    let image = kernel(ElfClass::Elf64, ElfData::Little);
    let log = Recorder::default();
    let mut elf = ElfBinary::with_log(&image, &log, true).unwrap();
    elf.parse_binary();
    elf.parse_bsdsyms(elf.pend());
    let range = elf.bsd_symtab().unwrap();
    assert!(log
        .messages()
        .contains(&format!("bsd symtab: {:#x} -> {:#x}", range.start, range.end)));

    let mut dest = vec![0u8; (range.end - elf.pstart()) as usize];
    elf.load_binary(&mut DirectCopy::new(&mut dest, 0)).unwrap();
    // .strtab, .symtab and .shstrtab are exported.
    let copied = log
        .messages()
        .iter()
        .filter(|m| m.starts_with("shdr "))
        .count();
    assert_eq!(copied, 3);
}
