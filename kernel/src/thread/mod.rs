// SPDX-License-Identifier: MPL-2.0

//! Kernel threads.
//!
//! Each kernel thread is carried by a host thread whose stack doubles as
//! the kernel stack. A thread that does not own the CPU is parked; the
//! scheduler (see [`crate::sched`]) performs all handoffs.

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Condvar, Mutex as HostMutex};
use std::thread::JoinHandle;

use crate::{
    config::DEFAULT_STACK_SIZE,
    prelude::*,
    process::{self, Process},
    sched::{self, WaitQueue},
};

pub type Tid = u32;

static TID_ALLOCATOR: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

std::thread_local! {
    static CURRENT: RefCell<Option<Arc<Thread>>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Runnable or currently running.
    Run,
    Sleep,
    SleepCancellable,
    Exited,
}

/// Thrown (as a panic payload) to unwind a host thread whose kernel
/// thread has exited; caught at the thread trampoline.
pub(crate) struct ExitToken;

/// Condvar-based parking used for CPU handoff. A pending wakeup is
/// remembered, so unpark-then-park does not lose the token.
struct Parker {
    lock: HostMutex<bool>,
    cvar: Condvar,
}

impl Parker {
    const fn new() -> Self {
        Self {
            lock: HostMutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn park(&self) {
        let mut pending = lock_host(&self.lock);
        while !*pending {
            pending = self
                .cvar
                .wait(pending)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *pending = false;
    }

    fn unpark(&self) {
        let mut pending = lock_host(&self.lock);
        *pending = true;
        self.cvar.notify_one();
    }
}

fn lock_host(lock: &HostMutex<bool>) -> std::sync::MutexGuard<'_, bool> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A single line of execution within a process.
pub struct Thread {
    tid: Tid,
    process: Weak<Process>,
    state: SpinLock<ThreadState>,
    cancelled: AtomicBool,
    retval: AtomicI32,
    /// The wait queue this thread sleeps on, if any.
    wchan: SpinLock<Option<WaitQueue>>,
    parker: Parker,
    join: SpinLock<Option<JoinHandle<()>>>,
}

impl Thread {
    fn new(process: &Arc<Process>) -> Arc<Self> {
        Arc::new(Thread {
            tid: TID_ALLOCATOR.fetch_add(1, Ordering::SeqCst),
            process: Arc::downgrade(process),
            state: SpinLock::new(ThreadState::Run),
            cancelled: AtomicBool::new(false),
            retval: AtomicI32::new(0),
            wchan: SpinLock::new(None),
            parker: Parker::new(),
            join: SpinLock::new(None),
        })
    }

    pub fn current() -> Arc<Thread> {
        CURRENT
            .with(|c| c.borrow().clone())
            .expect("not in thread context")
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn process(&self) -> Arc<Process> {
        self.process
            .upgrade()
            .expect("thread outlived its process")
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        *self.state.lock() = state;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn retval(&self) -> i32 {
        self.retval.load(Ordering::SeqCst)
    }

    pub(crate) fn wchan(&self) -> SpinLockGuard<'_, Option<WaitQueue>> {
        self.wchan.lock()
    }

    pub(crate) fn park(&self) {
        self.parker.park();
    }

    pub(crate) fn unpark(&self) {
        self.parker.unpark();
    }

    /// Spawn a new thread in `process`, with its own kernel stack, running
    /// `body` once the scheduler first selects it. The thread is linked
    /// into the process but not yet runnable.
    pub fn spawn<F>(process: &Arc<Process>, body: F) -> Arc<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = Self::new(process);
        process.threads().lock().push(thread.clone());
        sched::note_thread_spawned();

        let entry = thread.clone();
        let handle = std::thread::Builder::new()
            .name(format!("kthread-{}", thread.tid))
            .stack_size(DEFAULT_STACK_SIZE)
            .spawn(move || trampoline(entry, Box::new(body)))
            .expect("failed to spawn a host thread");
        *thread.join.lock() = Some(handle);

        thread
    }

    /// Bind a [`Thread`] to the *calling* host thread. Used once per boot
    /// to turn the bootstrap context into the idle thread.
    pub(crate) fn adopt_current(process: &Arc<Process>) -> Arc<Thread> {
        let thread = Self::new(process);
        process.threads().lock().push(thread.clone());
        set_current(Some(thread.clone()));
        thread
    }

    /// Join the finished host thread backing this kernel thread.
    pub(crate) fn reap(&self) {
        assert_eq!(self.state(), ThreadState::Exited);
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("state", &self.state())
            .finish()
    }
}

fn set_current(thread: Option<Arc<Thread>>) {
    CURRENT.with(|c| *c.borrow_mut() = thread);
}

pub(crate) fn clear_current() {
    set_current(None);
}

fn trampoline(thread: Arc<Thread>, body: Box<dyn FnOnce() + Send>) {
    set_current(Some(thread.clone()));
    // Wait to be handed the CPU for the first time.
    thread.park();

    let result = catch_unwind(AssertUnwindSafe(body));
    match result {
        // The body ran to completion; exit with the stored retval (zero
        // unless a cancellation set one).
        Ok(()) => finish_current(thread.retval()),
        Err(payload) if payload.is::<ExitToken>() => {
            // Thread::exit already did the bookkeeping.
        }
        Err(payload) => {
            // A genuine panic. Keep the kernel consistent, then hand the
            // payload to the boot caller.
            sched::record_failure(payload);
            finish_current(-1);
        }
    }
    set_current(None);
}

/// Exit bookkeeping shared by every way a thread can die. The process is
/// informed first (the last thread to exit triggers process cleanup), and
/// the CPU is finally given away for good.
fn finish_current(retval: i32) {
    let current = Thread::current();
    assert!(
        current.wchan().is_none(),
        "exiting thread is still on a wait queue"
    );
    process::thread_exited();
    current.retval.store(retval, Ordering::SeqCst);
    current.set_state(ThreadState::Exited);
    sched::note_thread_exited();
}

/// Exit the current thread with `retval`. Never returns.
pub fn exit(retval: i32) -> ! {
    finish_current(retval);
    std::panic::panic_any(ExitToken);
}

/// Cancel `thread`. Cancelling the current thread is an exit. Otherwise
/// the target must be sleeping: it is flagged, and if the sleep is
/// cancellable it is pulled off its wait queue and made runnable.
pub fn cancel(thread: &Arc<Thread>, retval: i32) {
    let current = Thread::current();
    if Arc::ptr_eq(thread, &current) {
        exit(retval);
    }

    let state = thread.state();
    assert!(
        matches!(state, ThreadState::Sleep | ThreadState::SleepCancellable),
        "cancel target is neither current nor sleeping"
    );
    thread.cancelled.store(true, Ordering::SeqCst);
    thread.retval.store(retval, Ordering::SeqCst);
    if state == ThreadState::SleepCancellable {
        sched::cancel(thread);
    }
}

/// Install the process-wide panic hook that keeps [`ExitToken`] unwinds
/// silent while leaving real panics noisy.
pub(crate) fn init_panic_hook() {
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ExitToken>().is_none() {
                default_hook(info);
            }
        }));
    });
}
