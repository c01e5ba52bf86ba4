// SPDX-License-Identifier: MPL-2.0

use align_ext::AlignExt;

use crate::{
    config::{addr_to_pn, pn_to_addr, USER_MEM_HIGH},
    prelude::*,
    vm::vmmap::{MapFlags, VmProt, VmmapDir},
};

/// Adjust the end of the heap. `addr == 0` queries the current break;
/// otherwise the heap is grown or shrunk, page-granular, between
/// `start_brk` and the new break. Returns the break in effect.
pub fn do_brk(addr: usize) -> Result<usize> {
    let current = current!();
    let start_brk = current.start_brk();
    let old_brk = current.brk();

    if addr == 0 {
        return Ok(old_brk);
    }
    if addr < start_brk {
        return_errno_with_message!(Errno::EINVAL, "break below the start of the heap");
    }
    if addr >= USER_MEM_HIGH {
        return_errno_with_message!(Errno::ENOMEM, "break beyond user memory");
    }

    let old_top = addr_to_pn(old_brk.align_up(PAGE_SIZE));
    let new_top = addr_to_pn(addr.align_up(PAGE_SIZE));

    if new_top > old_top {
        let npages = new_top - old_top;
        let mut vmmap = current.vmmap().lock();
        if !vmmap.is_range_empty(old_top, npages) {
            return_errno_with_message!(Errno::ENOMEM, "heap would collide with a mapping");
        }
        vmmap.map(
            None,
            old_top,
            npages,
            VmProt::PROT_READ | VmProt::PROT_WRITE,
            MapFlags::MAP_PRIVATE | MapFlags::MAP_ANON,
            0,
            VmmapDir::LoHi,
        )?;
    } else if new_top < old_top {
        current.vmmap().lock().remove(new_top, old_top - new_top);
        current
            .page_dir()
            .unmap_range(pn_to_addr(new_top), pn_to_addr(old_top));
    }

    current.set_brk_window(start_brk, addr);
    Ok(addr)
}
