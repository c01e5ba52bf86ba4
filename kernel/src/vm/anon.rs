// SPDX-License-Identifier: MPL-2.0

use super::{
    mmobj::MmObj,
    page::{pframe_get, wait_not_busy, PFrame, ResidentSet},
};
use crate::prelude::*;

/// A private zero-fill memory object.
pub struct AnonObj {
    resident: ResidentSet,
}

impl AnonObj {
    pub fn new() -> Arc<AnonObj> {
        Arc::new(AnonObj {
            resident: ResidentSet::new(),
        })
    }
}

impl MmObj for AnonObj {
    fn resident(&self) -> &ResidentSet {
        &self.resident
    }

    fn lookup_page(self: Arc<Self>, pagenum: usize, _for_write: bool) -> Result<Arc<PFrame>> {
        if let Some(pf) = self.resident.get(pagenum) {
            wait_not_busy(&pf);
            return Ok(pf);
        }
        let obj: Arc<dyn MmObj> = self;
        pframe_get(&obj, pagenum)
    }

    fn fill_page(&self, pf: &PFrame) -> Result<()> {
        pf.with_data(|page| page.fill(0));
        Ok(())
    }

    fn dirty_page(&self, _pf: &PFrame) -> Result<()> {
        // Anonymous pages have no backing store to be dirty against.
        return_errno!(Errno::EPERM);
    }

    fn clean_page(&self, _pf: &PFrame) -> Result<()> {
        Ok(())
    }

    fn bottom_object(self: Arc<Self>) -> Arc<dyn MmObj> {
        self
    }
}
