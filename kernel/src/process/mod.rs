// SPDX-License-Identifier: MPL-2.0

//! Processes: the kernel-visible unit of protection.

mod fork;
mod lifecycle;
pub mod table;
mod wait;

use core::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

pub use fork::do_fork;
pub use lifecycle::{do_exit, proc_create, proc_kill, proc_kill_all};
pub(crate) use lifecycle::{create_with_parent, thread_exited};
pub use wait::do_waitpid;

use crate::{
    fs::{file_table::FileTable, vnode::Vnode},
    prelude::*,
    sched::WaitQueue,
    thread::Thread,
    vm::{page_table::PageDir, vmmap::Vmmap},
};

/// Process id.
pub type Pid = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// A zombie: dead, waiting for the parent to reap it.
    Dead,
}

/// A process: an address space, a working directory, a file-descriptor
/// table, a parent, children, and the threads that execute in it.
pub struct Process {
    // Immutable part
    pid: Pid,
    name: String,
    page_dir: PageDir,
    /// The parent sleeps here waiting for a child to exit.
    wait: WaitQueue,

    // Mutable part
    state: SpinLock<ProcessState>,
    status: AtomicI32,
    parent: SpinLock<Weak<Process>>,
    children: SpinLock<Vec<Arc<Process>>>,
    threads: SpinLock<Vec<Arc<Thread>>>,
    file_table: SpinLock<FileTable>,
    cwd: SpinLock<Option<Arc<dyn Vnode>>>,
    vmmap: SpinLock<Vmmap>,
    start_brk: AtomicUsize,
    brk: AtomicUsize,
}

impl Process {
    fn new(pid: Pid, name: &str, parent: Weak<Process>) -> Arc<Self> {
        Arc::new(Process {
            pid,
            name: name.to_string(),
            page_dir: PageDir::new(),
            wait: WaitQueue::new(),
            state: SpinLock::new(ProcessState::Running),
            status: AtomicI32::new(0),
            parent: SpinLock::new(parent),
            children: SpinLock::new(Vec::new()),
            threads: SpinLock::new(Vec::new()),
            file_table: SpinLock::new(FileTable::new()),
            cwd: SpinLock::new(None),
            vmmap: SpinLock::new(Vmmap::new()),
            start_brk: AtomicUsize::new(0),
            brk: AtomicUsize::new(0),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // *********** Parent and child ***********

    pub fn parent(&self) -> Option<Arc<Process>> {
        self.parent.lock().upgrade()
    }

    pub(crate) fn parent_slot(&self) -> &SpinLock<Weak<Process>> {
        &self.parent
    }

    pub(crate) fn children(&self) -> &SpinLock<Vec<Arc<Process>>> {
        &self.children
    }

    pub fn threads(&self) -> &SpinLock<Vec<Arc<Thread>>> {
        &self.threads
    }

    pub fn wait_queue(&self) -> &WaitQueue {
        &self.wait
    }

    // *********** File system ***********

    pub fn file_table(&self) -> &SpinLock<FileTable> {
        &self.file_table
    }

    pub fn cwd(&self) -> Option<Arc<dyn Vnode>> {
        self.cwd.lock().clone()
    }

    pub fn set_cwd(&self, cwd: Arc<dyn Vnode>) {
        *self.cwd.lock() = Some(cwd);
    }

    pub(crate) fn drop_cwd(&self) {
        self.cwd.lock().take();
    }

    // *********** Virtual memory ***********

    pub fn vmmap(&self) -> &SpinLock<Vmmap> {
        &self.vmmap
    }

    pub fn page_dir(&self) -> &PageDir {
        &self.page_dir
    }

    pub fn start_brk(&self) -> usize {
        self.start_brk.load(Ordering::SeqCst)
    }

    pub fn brk(&self) -> usize {
        self.brk.load(Ordering::SeqCst)
    }

    pub(crate) fn set_brk_window(&self, start: usize, brk: usize) {
        self.start_brk.store(start, Ordering::SeqCst);
        self.brk.store(brk, Ordering::SeqCst);
    }

    // *********** Status ***********

    pub fn is_dead(&self) -> bool {
        *self.state.lock() == ProcessState::Dead
    }

    pub(crate) fn set_dead(&self, status: i32) {
        self.status.store(status, Ordering::SeqCst);
        *self.state.lock() = ProcessState::Dead;
    }

    pub(crate) fn set_status(&self, status: i32) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub(crate) fn status(&self) -> i32 {
        self.status.load(Ordering::SeqCst)
    }

    /// The exit status, once the process is a zombie.
    pub fn exit_status(&self) -> Option<i32> {
        if self.is_dead() {
            Some(self.status())
        } else {
            None
        }
    }
}

impl Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Return the current process.
pub fn current() -> Arc<Process> {
    Thread::current().process()
}
