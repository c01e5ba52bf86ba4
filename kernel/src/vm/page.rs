// SPDX-License-Identifier: MPL-2.0

//! Cached physical pages.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lru::LruCache;

use super::mmobj::MmObj;
use crate::{prelude::*, sched, sched::WaitQueue};

/// A cached page for one (memory object, page number) pair.
///
/// `busy` marks in-flight fill I/O: readers sleep on the frame's wait
/// queue until it clears. `pinned` frames cannot be evicted; pinning must
/// be balanced by unpinning. `dirty` marks content newer than the backing
/// store.
pub struct PFrame {
    obj: Weak<dyn MmObj>,
    pagenum: usize,
    data: SpinLock<Box<[u8]>>,
    busy: AtomicBool,
    pins: AtomicUsize,
    dirty: AtomicBool,
    wait: WaitQueue,
}

impl PFrame {
    pub fn new(obj: Weak<dyn MmObj>, pagenum: usize) -> Arc<PFrame> {
        Arc::new(PFrame {
            obj,
            pagenum,
            data: SpinLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
            busy: AtomicBool::new(false),
            pins: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            wait: WaitQueue::new(),
        })
    }

    pub fn pagenum(&self) -> usize {
        self.pagenum
    }

    pub fn owner(&self) -> Option<Arc<dyn MmObj>> {
        self.obj.upgrade()
    }

    pub fn wait_queue(&self) -> &WaitQueue {
        &self.wait
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub(crate) fn set_busy(&self) {
        self.busy.store(true, Ordering::SeqCst);
    }

    /// Clear busy and wake everyone who slept on the frame.
    pub(crate) fn clear_busy(&self) {
        self.busy.store(false, Ordering::SeqCst);
        sched::broadcast_on(&self.wait);
    }

    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::SeqCst);
    }

    pub fn unpin(&self) {
        let old = self.pins.fetch_sub(1, Ordering::SeqCst);
        assert!(old > 0, "unbalanced pframe unpin");
    }

    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::SeqCst) > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn set_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.data.lock();
        f(&mut data)
    }

    pub fn read_into(&self, off: usize, buf: &mut [u8]) {
        debug_assert!(off + buf.len() <= PAGE_SIZE);
        let data = self.data.lock();
        buf.copy_from_slice(&data[off..off + buf.len()]);
    }

    pub fn write_from(&self, off: usize, buf: &[u8]) {
        debug_assert!(off + buf.len() <= PAGE_SIZE);
        let mut data = self.data.lock();
        data[off..off + buf.len()].copy_from_slice(buf);
    }

    pub fn copy_page_from(&self, other: &PFrame) {
        let src = other.data.lock();
        let mut dst = self.data.lock();
        dst.copy_from_slice(&src);
    }
}

impl Debug for PFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("PFrame")
            .field("pagenum", &self.pagenum)
            .field("busy", &self.is_busy())
            .field("pinned", &self.is_pinned())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// The resident pages of one memory object, keyed by page number.
pub struct ResidentSet {
    pages: SpinLock<LruCache<usize, Arc<PFrame>>>,
}

impl ResidentSet {
    pub fn new() -> Self {
        Self {
            pages: SpinLock::new(LruCache::unbounded()),
        }
    }

    pub fn get(&self, pagenum: usize) -> Option<Arc<PFrame>> {
        self.pages.lock().get(&pagenum).cloned()
    }

    pub fn insert(&self, pagenum: usize, pf: Arc<PFrame>) {
        self.pages.lock().put(pagenum, pf);
    }

    pub fn remove(&self, pagenum: usize) -> Option<Arc<PFrame>> {
        self.pages.lock().pop(&pagenum)
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<PFrame>> {
        self.pages.lock().iter().map(|(_, pf)| pf.clone()).collect()
    }
}

impl Default for ResidentSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep until `pf` is no longer busy.
pub fn wait_not_busy(pf: &Arc<PFrame>) {
    while pf.is_busy() {
        sched::sleep_on(pf.wait_queue());
    }
}

/// Find or create the resident page of `obj` for `pagenum`.
///
/// A newly created frame is inserted busy, filled through the object's
/// `fill_page`, and only then published to sleepers.
pub fn pframe_get(obj: &Arc<dyn MmObj>, pagenum: usize) -> Result<Arc<PFrame>> {
    loop {
        if let Some(pf) = obj.resident().get(pagenum) {
            if pf.is_busy() {
                sched::sleep_on(pf.wait_queue());
                continue;
            }
            return Ok(pf);
        }

        let pf = PFrame::new(Arc::downgrade(obj), pagenum);
        pf.set_busy();
        obj.resident().insert(pagenum, pf.clone());
        let filled = obj.fill_page(&pf);
        pf.clear_busy();
        if let Err(e) = filled {
            obj.resident().remove(pagenum);
            return Err(e);
        }
        return Ok(pf);
    }
}
