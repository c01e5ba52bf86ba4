// SPDX-License-Identifier: MPL-2.0

use super::{lifecycle, Pid};
use crate::{
    prelude::*,
    sched,
    thread::Thread,
    vm::{mmobj::MmObj, shadow::ShadowObj, vmmap::MapFlags},
};

/// The implementation of fork(2).
///
/// The child receives a copy of the parent's address space: shared
/// mappings alias the parent's memory objects, private mappings are
/// spliced behind a fresh pair of shadow objects so that later writes on
/// either side stay private. The file-descriptor table is copied with the
/// open files shared, and the working directory is inherited.
///
/// The child's single thread starts in `entry`; the parent gets the
/// child's pid back.
pub fn do_fork<F>(entry: F) -> Result<Pid>
where
    F: FnOnce() + Send + 'static,
{
    let parent = current!();
    let child = lifecycle::proc_create(parent.name())?;

    {
        let mut parent_map = parent.vmmap().lock();
        let mut child_map = child.vmmap().lock();
        *child_map = parent_map.clone_areas();

        for (parent_vma, child_vma) in parent_map.areas_mut().zip(child_map.areas_mut()) {
            if parent_vma.flags().contains(MapFlags::MAP_SHARED) {
                child_vma.set_obj(parent_vma.obj().clone());
            } else {
                let old = parent_vma.obj().clone();
                let bottom = old.clone().bottom_object();
                let parent_shadow: Arc<dyn MmObj> =
                    ShadowObj::new(old.clone(), bottom.clone());
                let child_shadow: Arc<dyn MmObj> = ShadowObj::new(old, bottom);
                parent_vma.set_obj(parent_shadow);
                child_vma.set_obj(child_shadow);
            }
        }
    }

    // Both sides must fault back in through the new shadow chains.
    parent.page_dir().unmap_user_range();
    child.page_dir().unmap_user_range();

    *child.file_table().lock() = parent.file_table().lock().clone();
    child.set_brk_window(parent.start_brk(), parent.brk());

    let child_thread = Thread::spawn(&child, entry);
    sched::make_runnable(child_thread);

    debug!("pid {} forked child {}", parent.pid(), child.pid());
    Ok(child.pid())
}
