//! Segment loader and destination copy strategies.
//!
//! # Strategies
//!
//! - [`DirectCopy`]: the destination is a host byte slice in the same trust
//!   domain (standalone tooling, tests)
//! - [`GuardedCopy`]: the destination is guest memory reached through a
//!   fallible [`GuestMemory`] accessor; segment sizes are checked against the
//!   guest word width before anything is written
//!
//! Either way a failed write aborts the load. Segments already written are
//! left in place.

use crate::binary::ElfBinary;
use crate::diag::{elf_err, elf_msg};
use crate::error::ElfError;
use crate::view::ProgramHeader;

/// How segment bytes reach the destination.
pub trait CopyStrategy {
    /// Copy `src` to destination address `dest`.
    fn copy(&mut self, dest: u64, src: &[u8]) -> Result<(), ElfError>;

    /// Zero `len` bytes at destination address `dest`.
    fn zero(&mut self, dest: u64, len: u64) -> Result<(), ElfError>;

    /// Reject segment sizes this destination cannot address.
    fn check_sizes(&self, _filesz: u64, _memsz: u64) -> Result<(), ElfError> {
        Ok(())
    }

    /// Copy a segment's file bytes to `dest` and clear the rest of its
    /// `memsz` bytes.
    fn load_image(&mut self, dest: u64, src: &[u8], memsz: u64) -> Result<(), ElfError> {
        copy_then_zero(self, dest, src, memsz)
    }
}

fn copy_then_zero<C: CopyStrategy + ?Sized>(
    copier: &mut C,
    dest: u64,
    src: &[u8],
    memsz: u64,
) -> Result<(), ElfError> {
    let filesz = src.len() as u64;
    let bss = memsz
        .checked_sub(filesz)
        .ok_or(ElfError::Bounds("filesz exceeds memsz"))?;
    copier.copy(dest, src)?;
    let tail = dest
        .checked_add(filesz)
        .ok_or(ElfError::Copy { addr: dest })?;
    copier.zero(tail, bss)
}

impl<C: CopyStrategy + ?Sized> CopyStrategy for &mut C {
    fn copy(&mut self, dest: u64, src: &[u8]) -> Result<(), ElfError> {
        (**self).copy(dest, src)
    }

    fn zero(&mut self, dest: u64, len: u64) -> Result<(), ElfError> {
        (**self).zero(dest, len)
    }

    fn check_sizes(&self, filesz: u64, memsz: u64) -> Result<(), ElfError> {
        (**self).check_sizes(filesz, memsz)
    }

    fn load_image(&mut self, dest: u64, src: &[u8], memsz: u64) -> Result<(), ElfError> {
        (**self).load_image(dest, src, memsz)
    }
}

/// Plain copy into a host buffer mapped at `base`.
#[derive(Debug)]
pub struct DirectCopy<'d> {
    buf: &'d mut [u8],
    base: u64,
}

impl<'d> DirectCopy<'d> {
    /// `buf[0]` is destination address `base`.
    pub fn new(buf: &'d mut [u8], base: u64) -> Self {
        Self { buf, base }
    }

    fn slot(&mut self, dest: u64, len: u64) -> Result<&mut [u8], ElfError> {
        let fault = ElfError::Copy { addr: dest };
        let start = dest
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .ok_or(fault)?;
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| start.checked_add(len))
            .ok_or(fault)?;
        self.buf.get_mut(start..end).ok_or(fault)
    }
}

impl CopyStrategy for DirectCopy<'_> {
    fn copy(&mut self, dest: u64, src: &[u8]) -> Result<(), ElfError> {
        self.slot(dest, src.len() as u64)?.copy_from_slice(src);
        Ok(())
    }

    fn zero(&mut self, dest: u64, len: u64) -> Result<(), ElfError> {
        self.slot(dest, len)?.fill(0);
        Ok(())
    }
}

/// A guest memory access that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestFault {
    /// First destination address that could not be written
    pub addr: u64,
}

/// Fallible access to memory owned by another trust domain.
pub trait GuestMemory {
    /// Copy `src` to guest address `dest`.
    fn copy_to_guest(&mut self, dest: u64, src: &[u8]) -> Result<(), GuestFault>;

    /// Zero `len` bytes at guest address `dest`.
    fn clear_guest(&mut self, dest: u64, len: usize) -> Result<(), GuestFault>;
}

impl<M: GuestMemory + ?Sized> GuestMemory for &mut M {
    fn copy_to_guest(&mut self, dest: u64, src: &[u8]) -> Result<(), GuestFault> {
        (**self).copy_to_guest(dest, src)
    }

    fn clear_guest(&mut self, dest: u64, len: usize) -> Result<(), GuestFault> {
        (**self).clear_guest(dest, len)
    }
}

/// Checked copy into guest memory.
#[derive(Debug)]
pub struct GuardedCopy<M> {
    mem: M,
    word_max: u64,
}

impl<M: GuestMemory> GuardedCopy<M> {
    pub fn new(mem: M) -> Self {
        Self {
            mem,
            word_max: usize::MAX as u64,
        }
    }

    /// Limit segment sizes to `word_max` (e.g. `u32::MAX` for a 32-bit guest).
    pub fn with_word_max(mut self, word_max: u64) -> Self {
        self.word_max = word_max;
        self
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn into_inner(self) -> M {
        self.mem
    }
}

impl<M: GuestMemory> CopyStrategy for GuardedCopy<M> {
    fn copy(&mut self, dest: u64, src: &[u8]) -> Result<(), ElfError> {
        self.mem
            .copy_to_guest(dest, src)
            .map_err(|fault| ElfError::Copy { addr: fault.addr })
    }

    fn zero(&mut self, dest: u64, len: u64) -> Result<(), ElfError> {
        let len = usize::try_from(len).map_err(|_| ElfError::Size { size: len })?;
        self.mem
            .clear_guest(dest, len)
            .map_err(|fault| ElfError::Copy { addr: fault.addr })
    }

    fn check_sizes(&self, filesz: u64, memsz: u64) -> Result<(), ElfError> {
        for size in [filesz, memsz] {
            if size > self.word_max {
                return Err(ElfError::Size { size });
            }
        }
        Ok(())
    }

    /// As the default, but sizes are checked before the first write.
    fn load_image(&mut self, dest: u64, src: &[u8], memsz: u64) -> Result<(), ElfError> {
        self.check_sizes(src.len() as u64, memsz)?;
        copy_then_zero(self, dest, src, memsz)
    }
}

impl ElfBinary<'_> {
    /// Destination address of physical address `paddr`:
    /// `dest_base + (paddr - pstart)`.
    pub fn get_ptr(&self, paddr: u64) -> Result<u64, ElfError> {
        paddr
            .checked_sub(self.pstart)
            .and_then(|off| self.dest_base().checked_add(off))
            .ok_or(ElfError::Bounds("address below pstart or beyond destination"))
    }

    /// Copy every loadable segment to the destination, then write the debug
    /// symbol table if [`ElfBinary::parse_bsdsyms`] reserved space for it.
    ///
    /// Requires [`ElfBinary::parse_binary`] to have run. Stops at the first
    /// failing segment; earlier segments stay written.
    pub fn load_binary<C: CopyStrategy + ?Sized>(&self, copier: &mut C) -> Result<(), ElfError> {
        for i in 0..self.phdr_count() {
            let Some(phdr) = self.phdr_by_index(i) else {
                continue;
            };
            if !self.is_loadable(phdr) {
                continue;
            }
            let segment = self.phdr(phdr);
            if let Err(e) = self.load_segment(i, &segment, copier) {
                elf_err!(self, "phdr {}: load failed: {}", i, e);
                return Err(e);
            }
        }

        self.load_bsdsyms(copier)
    }

    fn load_segment<C: CopyStrategy + ?Sized>(
        &self,
        index: u64,
        segment: &ProgramHeader,
        copier: &mut C,
    ) -> Result<(), ElfError> {
        copier.check_sizes(segment.filesz, segment.memsz)?;
        if segment.filesz > segment.memsz {
            return Err(ElfError::Bounds("filesz exceeds memsz"));
        }
        // BSS-only segments may carry any p_offset.
        let src = match segment.filesz {
            0 => &[][..],
            filesz => self
                .bytes_at(segment.offset, filesz)
                .ok_or(ElfError::Bounds("segment beyond image"))?,
        };
        let dest = self.get_ptr(segment.paddr)?;

        elf_msg!(
            self,
            "phdr {} at {:#x} -> {:#x}",
            index,
            dest,
            dest.wrapping_add(segment.filesz)
        );
        copier.load_image(dest, src, segment.memsz)
    }
}
