// SPDX-License-Identifier: MPL-2.0

//! The page-fault handler.

use super::{
    page_table::PtFlags,
    vmmap::VmProt,
};
use crate::{config::addr_to_pn, prelude::*, process};

bitflags! {
    /// Why the fault happened.
    pub struct FaultCause: u32 {
        const PRESENT  = 0x01;
        const WRITE    = 0x02;
        const USER     = 0x04;
        const RESERVED = 0x08;
        const EXEC     = 0x10;
    }
}

/// Resolve a user page fault at `vaddr`.
///
/// An address outside every vmarea, or an access the area's protections
/// do not allow, kills the faulting process with status `-EFAULT`. An
/// allowed fault looks the page up in the area's memory object (write
/// faults materialize a private page in the top-most shadow layer) and
/// installs the translation.
pub fn handle_page_fault(vaddr: usize, cause: FaultCause) {
    let current = current!();
    let vfn = addr_to_pn(vaddr);

    let Some(area) = current.vmmap().lock().lookup_cloned(vfn) else {
        debug!("fault at {:#x}: no mapping, killing pid {}", vaddr, current.pid());
        process::proc_kill(&current, Errno::EFAULT.as_neg_i32());
        return;
    };

    if !cause.contains(FaultCause::PRESENT) {
        let prot = area.prot();
        let denied = (cause.contains(FaultCause::WRITE) && !prot.contains(VmProt::PROT_WRITE))
            || (cause.contains(FaultCause::EXEC) && !prot.contains(VmProt::PROT_EXEC))
            || cause.contains(FaultCause::RESERVED);
        if denied {
            debug!(
                "fault at {:#x}: access {:?} denied by {:?}, killing pid {}",
                vaddr,
                cause,
                prot,
                current.pid()
            );
            process::proc_kill(&current, Errno::EFAULT.as_neg_i32());
            return;
        }
    }

    let for_write = cause.contains(FaultCause::WRITE);
    let pagenum = area.page_index_of(vfn);
    let Ok(pf) = area.obj_cloned().lookup_page(pagenum, for_write) else {
        // No translation is installed; the access will fault again.
        return;
    };

    let mut flags = PtFlags::PRESENT | PtFlags::USER;
    if for_write {
        flags |= PtFlags::WRITE;
    }
    current.page_dir().map(vaddr, pf, flags);
}
