//! Subcommand handlers.
//!
//! Each handler takes an already-validated [`ElfBinary`] and returns a
//! report; reading the file and printing are left to `main`.

use std::fs;
use std::io;
use std::path::Path;

use bootelf::{DirectCopy, ElfBinary, ElfError, ElfLog};

use crate::error::DumpError;
use crate::report::{
    byte_order_name, class_name, flags_string, AddrRange, InfoReport, LoadReport, LookupReport,
    SectionInfo, SegmentInfo, SymbolInfo,
};

/// Largest scratch buffer `load` will allocate.
pub const MAX_LOAD_SIZE: u64 = 1 << 30;

/// Read an image file, mapping a missing file to [`DumpError::ImageNotFound`].
pub fn read_image(path: &Path) -> Result<Vec<u8>, DumpError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DumpError::ImageNotFound {
            path: path.to_path_buf(),
        },
        _ => DumpError::Io(e),
    })
}

/// Validate `image` with diagnostics going to `log`.
pub fn open<'a>(
    image: &'a [u8],
    log: &'a dyn ElfLog,
    verbose: bool,
) -> Result<ElfBinary<'a>, DumpError> {
    Ok(ElfBinary::with_log(image, log, verbose)?)
}

pub fn info(elf: &mut ElfBinary<'_>) -> InfoReport {
    elf.parse_binary();

    let segments = (0..elf.phdr_count())
        .filter_map(|i| Some((i, elf.phdr_by_index(i)?)))
        .map(|(i, h)| {
            let p = elf.phdr(h);
            SegmentInfo {
                index: i,
                p_type: p.p_type,
                flags: flags_string(p.flags),
                offset: p.offset,
                paddr: p.paddr,
                filesz: p.filesz,
                memsz: p.memsz,
                loadable: p.is_loadable(),
            }
        })
        .collect();

    let sections = (0..elf.shdr_count())
        .filter_map(|i| Some((i, elf.shdr_by_index(i)?)))
        .map(|(i, h)| {
            let s = elf.shdr(h);
            SectionInfo {
                index: i,
                name: elf.section_name(h).map(str::to_string),
                sh_type: s.sh_type,
                offset: s.offset,
                size: s.size,
            }
        })
        .collect();

    let has_loadable = elf.has_loadable();
    InfoReport {
        class: class_name(elf.class()),
        byte_order: byte_order_name(elf.data()),
        machine: elf.machine(),
        entry: elf.entry(),
        pstart: has_loadable.then(|| elf.pstart()),
        pend: has_loadable.then(|| elf.pend()),
        memory_size: elf.memory_size(),
        symbols: elf.sym_count(),
        segments,
        sections,
    }
}

/// Resolve every name; fails on the first unknown one.
pub fn lookup(elf: &ElfBinary<'_>, names: &[String]) -> Result<LookupReport, DumpError> {
    let symbols = names
        .iter()
        .map(|name| match elf.find_symbol(name) {
            Ok(address) => Ok(SymbolInfo {
                name: name.clone(),
                address,
            }),
            Err(ElfError::NotFound) => Err(DumpError::SymbolNotFound { name: name.clone() }),
            Err(e) => Err(e.into()),
        })
        .collect::<Result<Vec<_>, DumpError>>()?;
    Ok(LookupReport { symbols })
}

/// Load every segment (and optionally the symbol blob) into a scratch
/// buffer mapped at `dest_base`. Returns the report and the buffer.
pub fn load(
    elf: &mut ElfBinary<'_>,
    dest_base: u64,
    bsd_syms: bool,
) -> Result<(LoadReport, Vec<u8>), DumpError> {
    elf.parse_binary();
    if !elf.has_loadable() {
        return Err(DumpError::NothingToLoad);
    }
    elf.set_dest_base(dest_base);
    if bsd_syms {
        elf.parse_bsdsyms(elf.pend());
    }

    let bsd_symtab = elf.bsd_symtab();
    let end = bsd_symtab.as_ref().map_or(elf.pend(), |r| r.end);
    let size = end - elf.pstart();
    if size > MAX_LOAD_SIZE {
        return Err(DumpError::TooLarge {
            size,
            limit: MAX_LOAD_SIZE,
        });
    }

    let mut buf = vec![0u8; size as usize];
    elf.load_binary(&mut DirectCopy::new(&mut buf, dest_base))?;

    let entry = elf.entry();
    let entry_dest = (elf.pstart()..end)
        .contains(&entry)
        .then(|| elf.get_ptr(entry).ok())
        .flatten();

    let report = LoadReport {
        pstart: elf.pstart(),
        pend: elf.pend(),
        dest_base,
        size,
        entry,
        entry_dest,
        bsd_symtab: bsd_symtab.map(|r| AddrRange {
            start: r.start,
            end: r.end,
        }),
        written_to: None,
    };
    Ok((report, buf))
}
