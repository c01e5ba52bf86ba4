// SPDX-License-Identifier: MPL-2.0

use super::{
    mmobj::MmObj,
    page::{pframe_get, wait_not_busy, PFrame, ResidentSet},
};
use crate::prelude::*;

/// A copy-on-write overlay on another memory object.
///
/// Shadows form chains: each points at the object it shadows and caches
/// the non-shadow object at the chain's root, so fault resolution never
/// has to walk the whole chain to find it. The chain can never cycle,
/// since `shadowed` always points at a pre-existing object.
pub struct ShadowObj {
    shadowed: Arc<dyn MmObj>,
    bottom: Arc<dyn MmObj>,
    resident: ResidentSet,
}

impl ShadowObj {
    pub fn new(shadowed: Arc<dyn MmObj>, bottom: Arc<dyn MmObj>) -> Arc<ShadowObj> {
        debug_assert!(bottom.shadowed().is_none());
        Arc::new(ShadowObj {
            shadowed,
            bottom,
            resident: ResidentSet::new(),
        })
    }
}

impl MmObj for ShadowObj {
    fn resident(&self) -> &ResidentSet {
        &self.resident
    }

    /// A page resident here always wins. Otherwise a write allocates the
    /// page in this (top-most) layer, and a read descends the chain to
    /// the first layer that has it.
    fn lookup_page(self: Arc<Self>, pagenum: usize, for_write: bool) -> Result<Arc<PFrame>> {
        if let Some(pf) = self.resident.get(pagenum) {
            wait_not_busy(&pf);
            return Ok(pf);
        }
        if for_write {
            let obj: Arc<dyn MmObj> = self;
            pframe_get(&obj, pagenum)
        } else {
            self.shadowed.clone().lookup_page(pagenum, false)
        }
    }

    /// Populate a fresh page of this layer from the first layer below
    /// that holds the page; the walk bottoms out in the chain's root.
    fn fill_page(&self, pf: &PFrame) -> Result<()> {
        pf.pin();
        let result = self
            .shadowed
            .clone()
            .lookup_page(pf.pagenum(), false)
            .map(|src| pf.copy_page_from(&src));
        pf.unpin();
        result
    }

    fn dirty_page(&self, pf: &PFrame) -> Result<()> {
        if let Some(resident) = self.resident.get(pf.pagenum()) {
            resident.set_dirty();
        }
        Ok(())
    }

    fn clean_page(&self, pf: &PFrame) -> Result<()> {
        if let Some(resident) = self.resident.get(pf.pagenum()) {
            resident.copy_page_from(pf);
        }
        Ok(())
    }

    fn shadowed(&self) -> Option<Arc<dyn MmObj>> {
        Some(self.shadowed.clone())
    }

    fn bottom_object(self: Arc<Self>) -> Arc<dyn MmObj> {
        self.bottom.clone()
    }
}

impl Drop for ShadowObj {
    fn drop(&mut self) {
        // No thread can still be filling our pages once the last handle
        // is gone, but be thorough about the busy protocol anyway.
        for pf in self.resident.snapshot() {
            while pf.is_busy() {
                crate::sched::sleep_on(pf.wait_queue());
            }
            if pf.is_pinned() {
                pf.unpin();
            }
            self.resident.remove(pf.pagenum());
        }
    }
}
