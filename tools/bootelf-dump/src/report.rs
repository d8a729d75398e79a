//! Serializable command results and their human-readable form.

use std::fmt;

use bootelf::{ElfClass, ElfData, SegmentFlags};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub index: u64,
    pub p_type: u64,
    pub flags: String,
    pub offset: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub loadable: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub index: u64,
    pub name: Option<String>,
    pub sh_type: u64,
    pub offset: u64,
    pub size: u64,
}

/// Result of `info`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InfoReport {
    pub class: &'static str,
    pub byte_order: &'static str,
    pub machine: u64,
    pub entry: u64,
    /// `None` when the image has no loadable segment.
    pub pstart: Option<u64>,
    pub pend: Option<u64>,
    pub memory_size: u64,
    pub symbols: u64,
    pub segments: Vec<SegmentInfo>,
    pub sections: Vec<SectionInfo>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub address: u64,
}

/// Result of `lookup`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LookupReport {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u64,
    pub end: u64,
}

/// Result of `load`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub pstart: u64,
    pub pend: u64,
    pub dest_base: u64,
    /// Bytes written, segments plus any symbol blob.
    pub size: u64,
    pub entry: u64,
    /// Destination address of the entry point, if it lies in a loaded range.
    pub entry_dest: Option<u64>,
    pub bsd_symtab: Option<AddrRange>,
    pub written_to: Option<String>,
}

pub fn class_name(class: ElfClass) -> &'static str {
    match class {
        ElfClass::Elf32 => "ELF32",
        ElfClass::Elf64 => "ELF64",
    }
}

pub fn byte_order_name(data: ElfData) -> &'static str {
    match data {
        ElfData::Little => "little-endian",
        ElfData::Big => "big-endian",
    }
}

/// `RWX`-style permission string, `-` for missing bits.
pub fn flags_string(flags: SegmentFlags) -> String {
    [
        (SegmentFlags::R, 'R'),
        (SegmentFlags::W, 'W'),
        (SegmentFlags::X, 'X'),
    ]
    .iter()
    .map(|&(bit, c)| if flags.contains(bit) { c } else { '-' })
    .collect()
}

fn opt_addr(addr: Option<u64>) -> String {
    addr.map_or_else(|| "-".to_string(), |a| format!("{a:#x}"))
}

impl fmt::Display for InfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class:       {} {}", self.class, self.byte_order)?;
        writeln!(f, "machine:     {}", self.machine)?;
        writeln!(f, "entry:       {:#x}", self.entry)?;
        writeln!(
            f,
            "memory:      {} -> {} ({:#x} bytes)",
            opt_addr(self.pstart),
            opt_addr(self.pend),
            self.memory_size
        )?;
        writeln!(f, "symbols:     {}", self.symbols)?;

        writeln!(f, "segments:")?;
        for s in &self.segments {
            writeln!(
                f,
                "  [{:>2}] type={:<#6x} {} off={:#010x} paddr={:#x} filesz={:#x} memsz={:#x}{}",
                s.index,
                s.p_type,
                s.flags,
                s.offset,
                s.paddr,
                s.filesz,
                s.memsz,
                if s.loadable { " LOAD" } else { "" }
            )?;
        }

        writeln!(f, "sections:")?;
        for s in &self.sections {
            writeln!(
                f,
                "  [{:>2}] {:<20} type={:<3} off={:#010x} size={:#x}",
                s.index,
                s.name.as_deref().unwrap_or("?"),
                s.sh_type,
                s.offset,
                s.size
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for LookupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.symbols {
            writeln!(f, "{:#018x} {}", s.address, s.name)?;
        }
        Ok(())
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "memory:      {:#x} -> {:#x}", self.pstart, self.pend)?;
        writeln!(f, "dest base:   {:#x}", self.dest_base)?;
        writeln!(f, "loaded:      {:#x} bytes", self.size)?;
        writeln!(f, "entry:       {:#x} (dest {})", self.entry, opt_addr(self.entry_dest))?;
        if let Some(syms) = self.bsd_symtab {
            writeln!(f, "bsd symtab:  {:#x} -> {:#x}", syms.start, syms.end)?;
        }
        if let Some(path) = &self.written_to {
            writeln!(f, "written to:  {path}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_render_in_rwx_order() {
        assert_eq!(flags_string(SegmentFlags::R | SegmentFlags::X), "R-X");
        assert_eq!(flags_string(SegmentFlags::all()), "RWX");
        assert_eq!(flags_string(SegmentFlags::empty()), "---");
    }

    #[test]
    fn lookup_human_output() {
        let report = LookupReport {
            symbols: vec![SymbolInfo {
                name: "_start".into(),
                address: 0x100000,
            }],
        };
        assert_eq!(report.to_string(), "0x0000000000100000 _start\n");
    }

    #[test]
    fn empty_range_renders_dashes() {
        let report = InfoReport {
            class: "ELF64",
            byte_order: "little-endian",
            machine: 62,
            entry: 0,
            pstart: None,
            pend: None,
            memory_size: 0,
            symbols: 0,
            segments: vec![],
            sections: vec![],
        };
        assert!(report.to_string().contains("memory:      - -> - (0x0 bytes)"));
    }
}
