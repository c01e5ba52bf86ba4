// SPDX-License-Identifier: MPL-2.0

use super::page::{PFrame, ResidentSet};
use crate::prelude::*;

/// A source of page contents for memory mappings.
///
/// Three kinds exist: anonymous zero-fill objects, shadow objects
/// overlaying another object for copy-on-write, and file objects supplied
/// by a file system through `Vnode::mmap`.
///
/// Reference counting is ownership: a vmarea owns one handle on its
/// object, and a shadow object owns one handle on the object it shadows
/// plus one on the bottom of its chain. An object's resident pages are
/// owned by the object itself and die with it.
pub trait MmObj: Any + Send + Sync {
    /// This object's resident-page cache.
    fn resident(&self) -> &ResidentSet;

    /// Find the page holding `pagenum`'s contents, allocating (and
    /// filling) it if needed. For a shadow object, a read descends the
    /// chain while a write materializes the page in this object.
    fn lookup_page(self: Arc<Self>, pagenum: usize, for_write: bool) -> Result<Arc<PFrame>>;

    /// Populate a freshly allocated frame of this object.
    fn fill_page(&self, pf: &PFrame) -> Result<()>;

    /// Note that `pf`'s contents are newer than the backing store.
    fn dirty_page(&self, pf: &PFrame) -> Result<()>;

    /// Push `pf`'s contents back to the backing store.
    fn clean_page(&self, pf: &PFrame) -> Result<()>;

    /// The next object up the shadow chain, for shadow objects.
    fn shadowed(&self) -> Option<Arc<dyn MmObj>> {
        None
    }

    /// The non-shadow object at the root of this object's chain; the
    /// object itself unless it is a shadow.
    fn bottom_object(self: Arc<Self>) -> Arc<dyn MmObj>;
}
