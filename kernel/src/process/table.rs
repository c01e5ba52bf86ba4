// SPDX-License-Identifier: MPL-2.0

//! The global process list and pid allocation.

use super::{Pid, Process};
use crate::{
    config::{PID_INIT, PROC_MAX_COUNT},
    prelude::*,
};

static PROCESS_LIST: SpinLock<Vec<Arc<Process>>> = SpinLock::new(Vec::new());
static NEXT_PID: SpinLock<Pid> = SpinLock::new(0);
static INIT_PROC: SpinLock<Option<Arc<Process>>> = SpinLock::new(None);

pub(crate) fn init() {
    PROCESS_LIST.lock().clear();
    *NEXT_PID.lock() = 0;
    *INIT_PROC.lock() = None;
}

pub(crate) fn is_empty() -> bool {
    PROCESS_LIST.lock().is_empty()
}

/// Allocate the next free pid: a linear probe, with wraparound, starting
/// from the pid after the last one handed out.
pub(crate) fn alloc_pid() -> Result<Pid> {
    let list = PROCESS_LIST.lock();
    let mut next = NEXT_PID.lock();
    let start = *next;
    let mut pid = start;
    loop {
        if !list.iter().any(|p| p.pid() == pid) {
            *next = (pid + 1) % PROC_MAX_COUNT;
            return Ok(pid);
        }
        pid = (pid + 1) % PROC_MAX_COUNT;
        if pid == start {
            return_errno_with_message!(Errno::ENOMEM, "pid space exhausted");
        }
    }
}

pub(crate) fn register(process: &Arc<Process>) {
    if process.pid() == PID_INIT {
        *INIT_PROC.lock() = Some(process.clone());
    }
    PROCESS_LIST.lock().push(process.clone());
}

pub(crate) fn unregister(process: &Arc<Process>) {
    PROCESS_LIST
        .lock()
        .retain(|p| !Arc::ptr_eq(p, process));
}

pub fn lookup(pid: Pid) -> Option<Arc<Process>> {
    PROCESS_LIST.lock().iter().find(|p| p.pid() == pid).cloned()
}

/// The reparenting target for orphaned children.
pub fn init_process() -> Option<Arc<Process>> {
    INIT_PROC.lock().clone()
}

pub(crate) fn snapshot() -> Vec<Arc<Process>> {
    PROCESS_LIST.lock().clone()
}
