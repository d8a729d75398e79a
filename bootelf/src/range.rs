//! Physical extent of the loadable segments.

use crate::binary::ElfBinary;
use crate::diag::{elf_err, elf_msg};
use crate::view::PhdrField;

impl ElfBinary<'_> {
    /// Compute `[pstart, pend)` over all loadable segments.
    ///
    /// `pstart` is the lowest `p_paddr` and `pend` the highest
    /// `p_paddr + p_memsz`. Non-loadable segments are ignored. With no
    /// loadable segment at all the range stays inverted
    /// (`pstart == u64::MAX`, `pend == 0`), which callers treat as
    /// nothing to load.
    pub fn parse_binary(&mut self) {
        let mut low = u64::MAX;
        let mut high = 0u64;

        for i in 0..self.phdr_count() {
            let Some(phdr) = self.phdr_by_index(i) else {
                continue;
            };
            if !self.is_loadable(phdr) {
                continue;
            }
            let paddr = self.uval(phdr, PhdrField::Paddr);
            let memsz = self.uval(phdr, PhdrField::Memsz);
            elf_msg!(self, "phdr: paddr={:#x} memsz={:#x}", paddr, memsz);

            let end = paddr.checked_add(memsz).unwrap_or_else(|| {
                elf_err!(self, "phdr {}: paddr {:#x} + memsz {:#x} wraps", i, paddr, memsz);
                u64::MAX
            });
            low = low.min(paddr);
            high = high.max(end);
        }

        self.pstart = low;
        self.pend = high;
        elf_msg!(self, "memory: {:#x} -> {:#x}", self.pstart, self.pend);
    }

    /// Lowest physical address of any loadable segment.
    pub fn pstart(&self) -> u64 {
        self.pstart
    }

    /// End of the highest loadable segment.
    pub fn pend(&self) -> u64 {
        self.pend
    }

    /// Bytes spanned by `[pstart, pend)`, 0 for the empty range.
    pub fn memory_size(&self) -> u64 {
        self.pend.saturating_sub(self.pstart)
    }

    /// Whether [`ElfBinary::parse_binary`] found at least one loadable segment.
    pub fn has_loadable(&self) -> bool {
        self.pstart <= self.pend
    }
}
