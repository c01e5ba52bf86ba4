// SPDX-License-Identifier: MPL-2.0

use super::page::PFrame;
use crate::{
    config::{addr_to_pn, USER_MEM_HIGH, USER_MEM_LOW},
    prelude::*,
};

bitflags! {
    /// Page-table entry flags.
    pub struct PtFlags: u32 {
        const PRESENT = 1;
        const WRITE   = 2;
        const USER    = 4;
    }
}

#[derive(Clone)]
pub struct PtEntry {
    pub frame: Arc<PFrame>,
    pub flags: PtFlags,
}

/// A per-process page directory.
///
/// Hardware translation is simulated: the directory is a map from
/// virtual page number to (frame, flags). Removing entries is the hosted
/// equivalent of unmapping plus a TLB flush.
pub struct PageDir {
    entries: SpinLock<BTreeMap<usize, PtEntry>>,
}

impl PageDir {
    pub fn new() -> PageDir {
        PageDir {
            entries: SpinLock::new(BTreeMap::new()),
        }
    }

    /// Install a translation for the page containing `vaddr`.
    pub fn map(&self, vaddr: usize, frame: Arc<PFrame>, flags: PtFlags) {
        debug_assert!(flags.contains(PtFlags::PRESENT));
        self.entries
            .lock()
            .insert(addr_to_pn(vaddr), PtEntry { frame, flags });
    }

    pub fn unmap(&self, vaddr: usize) {
        self.entries.lock().remove(&addr_to_pn(vaddr));
    }

    /// Drop every translation in `[lo, hi)` (byte addresses).
    pub fn unmap_range(&self, lo: usize, hi: usize) {
        let lo_pn = addr_to_pn(lo);
        let hi_pn = addr_to_pn(hi + PAGE_SIZE - 1);
        self.entries.lock().retain(|&pn, _| pn < lo_pn || pn >= hi_pn);
    }

    /// Drop every user-space translation.
    pub fn unmap_user_range(&self) {
        self.unmap_range(USER_MEM_LOW, USER_MEM_HIGH);
    }

    pub fn lookup(&self, vaddr: usize) -> Option<PtEntry> {
        self.entries.lock().get(&addr_to_pn(vaddr)).cloned()
    }

    pub fn mapped_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for PageDir {
    fn default() -> Self {
        Self::new()
    }
}
