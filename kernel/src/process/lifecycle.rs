// SPDX-License-Identifier: MPL-2.0

use super::{table, Process};
use crate::{
    config::{PID_IDLE, PID_INIT},
    fs, prelude::*, sched, thread,
    thread::ThreadState,
};

/// Create a process with the current process as its parent. The new
/// process starts in the running state with an empty fd table, the
/// parent's working directory, an empty address space, and a fresh page
/// directory; it has no threads yet.
pub fn proc_create(name: &str) -> Result<Arc<Process>> {
    let parent = current!();
    create_with_parent(name, Some(&parent))
}

pub(crate) fn create_with_parent(
    name: &str,
    parent: Option<&Arc<Process>>,
) -> Result<Arc<Process>> {
    let pid = table::alloc_pid()?;
    // The idle pid only ever goes to the first process, and the init pid
    // only to a child of idle.
    assert!(pid != PID_IDLE || table::is_empty());
    assert!(pid != PID_INIT || parent.map(|p| p.pid()) == Some(PID_IDLE));

    let parent_weak = parent.map(Arc::downgrade).unwrap_or_default();
    let process = Process::new(pid, name, parent_weak);

    let cwd = match parent {
        Some(parent) => parent.cwd(),
        None => fs::rootfs::root_vnode(),
    };
    if let Some(cwd) = cwd {
        process.set_cwd(cwd);
    }
    match parent {
        Some(parent) => process.set_brk_window(parent.start_brk(), parent.brk()),
        None => process.set_brk_window(crate::config::USER_MEM_LOW, crate::config::USER_MEM_LOW),
    }

    table::register(&process);
    if let Some(parent) = parent {
        debug!(
            "process {:?} (pid {}) created by pid {}",
            name,
            pid,
            parent.pid()
        );
        parent.children().lock().push(process.clone());
    }
    Ok(process)
}

/// Clean up as much of the current process as can be done from within it:
/// mark it dead, reparent its children to init, close its open files, and
/// wake the parent. The rest (threads, page directory, the process body)
/// is reaped by the parent in `do_waitpid`.
pub(crate) fn proc_cleanup(status: i32) {
    let current = current!();
    let init = table::init_process().expect("no init process to reparent to");
    assert!(current.pid() >= 1, "the idle process cannot exit");
    let parent = current.parent().expect("exiting process has no parent");

    current.set_dead(status);
    debug!("process {:?} (pid {}) is dead", current.name(), current.pid());

    if !Arc::ptr_eq(&current, &init) {
        let orphans: Vec<_> = current.children().lock().drain(..).collect();
        for child in orphans {
            *child.parent_slot().lock() = Arc::downgrade(&init);
            init.children().lock().push(child);
        }
    } else if !current.children().lock().is_empty() {
        warn!("init exited with live children; they will never be reaped");
    }

    current.file_table().lock().close_all();

    sched::wakeup_on(parent.wait_queue());
}

/// Called by the exiting thread. If it is the last live thread of the
/// process, the process itself is torn down.
pub(crate) fn thread_exited() {
    let current = current!();
    let alive = current
        .threads()
        .lock()
        .iter()
        .filter(|t| t.state() != ThreadState::Exited)
        .count();
    assert!(alive != 0, "all threads of the current process are dead");
    if alive == 1 {
        proc_cleanup(current.status());
    }
}

/// Exit the current process with `status`. Never returns.
pub fn do_exit(status: i32) -> ! {
    let current = current!();
    current.set_status(status);
    thread::exit(status);
}

/// Kill `process`. On the current process this is `do_exit`; otherwise
/// each of its threads is cancelled.
pub fn proc_kill(process: &Arc<Process>, status: i32) {
    let current = current!();
    if Arc::ptr_eq(process, &current) {
        do_exit(status);
    }
    let threads = process.threads().lock().clone();
    for t in threads {
        if t.state() != ThreadState::Exited {
            thread::cancel(&t, status);
        }
    }
}

/// Kill every process except idle, init, the current process, and direct
/// children of idle; finally the current process if it qualifies.
pub fn proc_kill_all() {
    let current = current!();
    let spared = |p: &Arc<Process>| {
        p.pid() == PID_IDLE
            || p.pid() == PID_INIT
            || p.parent().map(|pp| pp.pid()) == Some(PID_IDLE)
    };
    for process in table::snapshot() {
        if !Arc::ptr_eq(&process, &current) && !spared(&process) && !process.is_dead() {
            proc_kill(&process, 0);
        }
    }
    if !spared(&current) {
        proc_kill(&current, 0);
    }
}
