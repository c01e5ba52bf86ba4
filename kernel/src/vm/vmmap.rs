// SPDX-License-Identifier: MPL-2.0

//! Per-process address-space maps.

use super::{anon::AnonObj, mmobj::MmObj, shadow::ShadowObj};
use crate::{
    config::{addr_to_pn, page_offset, USER_MEM_HIGH_PAGE, USER_MEM_LOW_PAGE},
    fs::vnode::Vnode,
    prelude::*,
};

bitflags! {
    /// Mapping flags.
    pub struct MapFlags: u32 {
        const MAP_SHARED  = 1;
        const MAP_PRIVATE = 2;
        const MAP_FIXED   = 4;
        const MAP_ANON    = 8;
    }
}

bitflags! {
    /// Page protections.
    pub struct VmProt: u32 {
        const PROT_READ  = 1;
        const PROT_WRITE = 2;
        const PROT_EXEC  = 4;
    }
}

/// Which end of the address space to allocate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmmapDir {
    LoHi,
    HiLo,
}

/// A contiguous mapping of virtual pages `[start, end)` onto a memory
/// object at page offset `off`.
pub struct VmArea {
    start: usize,
    end: usize,
    prot: VmProt,
    flags: MapFlags,
    off: usize,
    /// `None` only inside a clone that fork has not populated yet.
    obj: Option<Arc<dyn MmObj>>,
}

impl VmArea {
    pub fn new(
        start: usize,
        end: usize,
        prot: VmProt,
        flags: MapFlags,
        off: usize,
        obj: Arc<dyn MmObj>,
    ) -> VmArea {
        VmArea {
            start,
            end,
            prot,
            flags,
            off,
            obj: Some(obj),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn npages(&self) -> usize {
        self.end - self.start
    }

    pub fn prot(&self) -> VmProt {
        self.prot
    }

    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    pub fn off(&self) -> usize {
        self.off
    }

    pub fn contains(&self, vfn: usize) -> bool {
        self.start <= vfn && vfn < self.end
    }

    /// The object page backing virtual page `vfn` of this area.
    pub fn page_index_of(&self, vfn: usize) -> usize {
        debug_assert!(self.contains(vfn));
        vfn - self.start + self.off
    }

    pub fn obj(&self) -> &Arc<dyn MmObj> {
        self.obj.as_ref().expect("vmarea has no memory object")
    }

    pub fn obj_cloned(&self) -> Arc<dyn MmObj> {
        self.obj().clone()
    }

    pub(crate) fn set_obj(&mut self, obj: Arc<dyn MmObj>) {
        self.obj = Some(obj);
    }
}

impl Clone for VmArea {
    fn clone(&self) -> Self {
        VmArea {
            start: self.start,
            end: self.end,
            prot: self.prot,
            flags: self.flags,
            off: self.off,
            obj: self.obj.clone(),
        }
    }
}

impl Debug for VmArea {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("VmArea")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("prot", &self.prot)
            .field("flags", &self.flags)
            .field("off", &self.off)
            .finish()
    }
}

/// A process's address space: disjoint vmareas in ascending start order.
pub struct Vmmap {
    areas: BTreeMap<usize, VmArea>,
}

impl Vmmap {
    pub const fn new() -> Vmmap {
        Vmmap {
            areas: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Drop every area (and with each, its object reference).
    pub fn clear(&mut self) {
        self.areas.clear();
    }

    pub fn areas(&self) -> impl Iterator<Item = &VmArea> {
        self.areas.values()
    }

    pub(crate) fn areas_mut(&mut self) -> impl Iterator<Item = &mut VmArea> {
        self.areas.values_mut()
    }

    /// Insert `vma`. The range must be well-formed, inside user memory,
    /// and disjoint from every existing area.
    pub fn insert(&mut self, vma: VmArea) {
        assert!(vma.start < vma.end);
        assert!(vma.start >= USER_MEM_LOW_PAGE);
        assert!(vma.end <= USER_MEM_HIGH_PAGE);
        assert!(
            self.is_range_empty(vma.start, vma.npages()),
            "overlapping vmarea insertion"
        );
        self.areas.insert(vma.start, vma);
    }

    /// The area covering virtual page `vfn`, if any.
    pub fn lookup(&self, vfn: usize) -> Option<&VmArea> {
        let (_, area) = self.areas.range(..=vfn).next_back()?;
        area.contains(vfn).then_some(area)
    }

    /// A snapshot of the area covering `vfn`, safe to use after the map
    /// lock is released.
    pub fn lookup_cloned(&self, vfn: usize) -> Option<VmArea> {
        self.lookup(vfn).cloned()
    }

    /// First-fit search for a free gap of `npages` pages. `LoHi` returns
    /// the lowest fitting gap's start, `HiLo` the highest's.
    pub fn find_range(&self, npages: usize, dir: VmmapDir) -> Option<usize> {
        let mut gaps = Vec::new();
        let mut lo = USER_MEM_LOW_PAGE;
        for area in self.areas.values() {
            if area.start > lo {
                gaps.push((lo, area.start));
            }
            lo = area.end;
        }
        if lo < USER_MEM_HIGH_PAGE {
            gaps.push((lo, USER_MEM_HIGH_PAGE));
        }

        let fits = |&(lo, hi): &(usize, usize)| hi - lo >= npages;
        match dir {
            VmmapDir::LoHi => gaps.iter().find(|gap| fits(gap)).map(|&(lo, _)| lo),
            VmmapDir::HiLo => gaps.iter().rev().find(|gap| fits(gap)).map(|&(lo, _)| lo),
        }
    }

    /// True iff no area overlaps `[lopage, lopage + npages)`.
    pub fn is_range_empty(&self, lopage: usize, npages: usize) -> bool {
        let hi = lopage + npages;
        !self
            .areas
            .values()
            .any(|area| area.start < hi && lopage < area.end)
    }

    /// Clone the layout of this map: same ranges, protections, flags and
    /// offsets, but no memory objects. Fork fills those in per area.
    pub fn clone_areas(&self) -> Vmmap {
        let mut areas = BTreeMap::new();
        for (start, area) in &self.areas {
            areas.insert(
                *start,
                VmArea {
                    start: area.start,
                    end: area.end,
                    prot: area.prot,
                    flags: area.flags,
                    off: area.off,
                    obj: None,
                },
            );
        }
        Vmmap { areas }
    }

    /// Unmap `[lopage, lopage + npages)`.
    ///
    /// An affected area is split (when the range lies strictly inside),
    /// shrunk at either end, or removed entirely. A split's second half
    /// takes a fresh reference on the mapped object; shrinking the front
    /// advances the object offset.
    pub fn remove(&mut self, lopage: usize, npages: usize) {
        let hi = lopage + npages;
        let starts: Vec<usize> = self.areas.keys().copied().collect();
        for start in starts {
            let area = &self.areas[&start];
            let (a_start, a_end) = (area.start, area.end);
            if a_end <= lopage || hi <= a_start {
                continue;
            }

            if lopage <= a_start && a_end <= hi {
                // The range covers the whole area.
                self.areas.remove(&start);
            } else if a_start < lopage && hi < a_end {
                // The range is strictly inside: split in two.
                let mut front = self.areas.remove(&start).expect("vmarea vanished");
                let back = VmArea {
                    start: hi,
                    end: a_end,
                    prot: front.prot,
                    flags: front.flags,
                    off: front.off + (hi - a_start),
                    obj: front.obj.clone(),
                };
                front.end = lopage;
                self.areas.insert(front.start, front);
                self.areas.insert(back.start, back);
            } else if lopage <= a_start {
                // The range overlaps the beginning: move the start up.
                let mut area = self.areas.remove(&start).expect("vmarea vanished");
                area.off += hi - a_start;
                area.start = hi;
                self.areas.insert(area.start, area);
            } else {
                // The range overlaps the end: cut it short.
                let area = self.areas.get_mut(&start).expect("vmarea vanished");
                area.end = lopage;
            }
        }
    }

    /// Establish a new mapping of `npages` pages.
    ///
    /// With `lopage == 0` a free range is chosen in direction `dir`;
    /// otherwise the mapping lands exactly at `lopage`, unmapping any
    /// overlap first. A missing `file` maps fresh anonymous zero-fill
    /// memory. `MAP_PRIVATE` interposes a shadow object so that stores
    /// never reach the source object.
    ///
    /// Returns the first mapped page.
    pub fn map(
        &mut self,
        file: Option<&Arc<dyn Vnode>>,
        lopage: usize,
        npages: usize,
        prot: VmProt,
        flags: MapFlags,
        off: usize,
        dir: VmmapDir,
    ) -> Result<usize> {
        assert!(npages > 0);
        let start = if lopage == 0 {
            self.find_range(npages, dir)
                .ok_or_else(|| Error::with_message(Errno::ENOMEM, "address space exhausted"))?
        } else {
            assert!(lopage >= USER_MEM_LOW_PAGE);
            assert!(lopage + npages <= USER_MEM_HIGH_PAGE);
            if !self.is_range_empty(lopage, npages) {
                self.remove(lopage, npages);
            }
            lopage
        };

        let source: Arc<dyn MmObj> = match file {
            None => AnonObj::new(),
            Some(vnode) => vnode.clone().mmap()?,
        };
        let obj: Arc<dyn MmObj> = if flags.contains(MapFlags::MAP_PRIVATE) {
            let bottom = source.clone().bottom_object();
            ShadowObj::new(source, bottom)
        } else {
            source
        };

        self.insert(VmArea::new(start, start + npages, prot, flags, off, obj));
        trace!(
            "mapped [{:#x}, {:#x}) pages, prot {:?}, flags {:?}",
            start,
            start + npages,
            prot,
            flags
        );
        Ok(start)
    }

    /// The per-page copy plan for a byte range, for use once the map lock
    /// has been dropped. Fails with `EFAULT` when any page of the range
    /// is unmapped.
    fn span_range(&self, vaddr: usize, count: usize) -> Result<Vec<PageSpan>> {
        let mut spans = Vec::new();
        let mut addr = vaddr;
        let end = vaddr + count;
        while addr < end {
            let vfn = addr_to_pn(addr);
            let area = self
                .lookup(vfn)
                .ok_or_else(|| Error::with_message(Errno::EFAULT, "address is not mapped"))?;
            let page_off = page_offset(addr);
            let len = (PAGE_SIZE - page_off).min(end - addr);
            spans.push(PageSpan {
                obj: area.obj_cloned(),
                pagenum: area.page_index_of(vfn),
                page_off,
                len,
            });
            addr += len;
        }
        Ok(spans)
    }
}

impl Default for Vmmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Vmmap {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_list().entries(self.areas.values()).finish()
    }
}

struct PageSpan {
    obj: Arc<dyn MmObj>,
    pagenum: usize,
    page_off: usize,
    len: usize,
}

/// Read `buf.len()` bytes from the address space at `vaddr`.
pub fn read_bytes(map: &SpinLock<Vmmap>, vaddr: usize, buf: &mut [u8]) -> Result<()> {
    let spans = map.lock().span_range(vaddr, buf.len())?;
    let mut done = 0;
    for span in spans {
        let pf = span
            .obj
            .clone()
            .lookup_page(span.pagenum, false)
            .map_err(|_| Error::with_message(Errno::EFAULT, "page lookup failed"))?;
        pf.read_into(span.page_off, &mut buf[done..done + span.len]);
        done += span.len;
    }
    Ok(())
}

/// Write `buf` into the address space at `vaddr`, dirtying each touched
/// page.
pub fn write_bytes(map: &SpinLock<Vmmap>, vaddr: usize, buf: &[u8]) -> Result<()> {
    let spans = map.lock().span_range(vaddr, buf.len())?;
    let mut done = 0;
    for span in spans {
        let pf = span
            .obj
            .clone()
            .lookup_page(span.pagenum, true)
            .map_err(|_| Error::with_message(Errno::EFAULT, "page lookup failed"))?;
        pf.write_from(span.page_off, &buf[done..done + span.len]);
        pf.set_dirty();
        // Anonymous objects refuse dirty notifications; that is fine, the
        // page itself already carries the dirty bit.
        let _ = span.obj.dirty_page(&pf);
        done += span.len;
    }
    Ok(())
}
