// SPDX-License-Identifier: MPL-2.0

//! The cooperative scheduler.
//!
//! There is a single logical CPU. A context switch happens only at the
//! explicit suspension points: [`sleep_on`], [`cancellable_sleep_on`],
//! [`yield_now`] and thread exit. The run queue is strict FIFO.
//!
//! Every kernel thread is backed by a host thread that is parked whenever
//! the thread does not own the CPU; switching hands the CPU over by
//! unparking exactly one successor.

mod mutex;
mod wait_queue;

use core::sync::atomic::{AtomicUsize, Ordering};

pub use mutex::KMutex;
pub use wait_queue::WaitQueue;

use crate::{
    prelude::*,
    thread::{Thread, ThreadState},
};

static RUN_QUEUE: SpinLock<VecDeque<Arc<Thread>>> = SpinLock::new(VecDeque::new());
static IDLE: SpinLock<Option<Arc<Thread>>> = SpinLock::new(None);
/// Number of spawned threads that have not yet exited. The idle thread is
/// not counted.
static LIVE_THREADS: AtomicUsize = AtomicUsize::new(0);
/// Panic payloads of threads that died from a real panic (not a kernel
/// exit). Resurfaced to the boot caller so test failures propagate.
static FAILURES: SpinLock<Vec<Box<dyn Any + Send>>> = SpinLock::new(Vec::new());

/// Reset all scheduler state. Called once per boot.
pub(crate) fn init(idle: Arc<Thread>) {
    RUN_QUEUE.lock().clear();
    *IDLE.lock() = Some(idle);
    LIVE_THREADS.store(0, Ordering::SeqCst);
    FAILURES.lock().clear();
}

pub(crate) fn shutdown() {
    RUN_QUEUE.lock().clear();
    *IDLE.lock() = None;
}

fn idle_thread() -> Arc<Thread> {
    IDLE.lock().clone().expect("scheduler is not initialized")
}

pub(crate) fn live_threads() -> usize {
    LIVE_THREADS.load(Ordering::SeqCst)
}

pub(crate) fn note_thread_spawned() {
    LIVE_THREADS.fetch_add(1, Ordering::SeqCst);
}

/// Exit-time bookkeeping: drop the live count and give the CPU away
/// without expecting it back.
pub(crate) fn note_thread_exited() {
    LIVE_THREADS.fetch_sub(1, Ordering::SeqCst);
    schedule_next();
}

pub(crate) fn record_failure(payload: Box<dyn Any + Send>) {
    FAILURES.lock().push(payload);
}

pub(crate) fn take_failure() -> Option<Box<dyn Any + Send>> {
    let mut failures = FAILURES.lock();
    if failures.is_empty() {
        None
    } else {
        Some(failures.remove(0))
    }
}

/// Append a thread to the run queue and mark it runnable.
pub fn make_runnable(thread: Arc<Thread>) {
    debug_assert!(thread.wchan().is_none());
    thread.set_state(ThreadState::Run);
    RUN_QUEUE.lock().push_back(thread);
}

/// Hand the CPU to the next runnable thread, or to idle when none exists.
/// Does not suspend the caller.
pub(crate) fn schedule_next() {
    let next = RUN_QUEUE.lock().pop_front();
    match next {
        Some(thread) => thread.unpark(),
        None => idle_thread().unpark(),
    }
}

/// Pop the next runnable thread; used by the idle loop only.
pub(crate) fn pop_runnable() -> Option<Arc<Thread>> {
    RUN_QUEUE.lock().pop_front()
}

/// Give up the CPU, letting every other runnable thread run first.
pub fn yield_now() {
    let current = Thread::current();
    RUN_QUEUE.lock().push_back(current.clone());
    schedule_next();
    current.park();
}

/// Block the current thread on `queue` until a wakeup.
pub fn sleep_on(queue: &WaitQueue) {
    sleep_inner(queue, false).expect("uncancellable sleep cannot fail");
}

/// Block the current thread on `queue`; a cancellation pulls the thread
/// back out of the queue and the call returns `EINTR`.
pub fn cancellable_sleep_on(queue: &WaitQueue) -> Result<()> {
    sleep_inner(queue, true)
}

fn sleep_inner(queue: &WaitQueue, cancellable: bool) -> Result<()> {
    let current = Thread::current();
    if cancellable && current.is_cancelled() {
        return_errno!(Errno::EINTR);
    }

    current.set_state(if cancellable {
        ThreadState::SleepCancellable
    } else {
        ThreadState::Sleep
    });
    queue.enqueue(current.clone());
    schedule_next();
    current.park();

    debug_assert!(current.wchan().is_none());
    if cancellable && current.is_cancelled() {
        return_errno!(Errno::EINTR);
    }
    Ok(())
}

/// Wake the head of `queue`. Returns the awoken thread, if any.
pub fn wakeup_on(queue: &WaitQueue) -> Option<Arc<Thread>> {
    let thread = queue.dequeue()?;
    make_runnable(thread.clone());
    Some(thread)
}

/// Wake every thread sleeping on `queue`.
pub fn broadcast_on(queue: &WaitQueue) {
    while wakeup_on(queue).is_some() {}
}

/// Pull a cancellably-sleeping thread out of its wait queue and make it
/// runnable; its sleep call will return `EINTR`.
pub(crate) fn cancel(thread: &Arc<Thread>) {
    debug_assert_eq!(thread.state(), ThreadState::SleepCancellable);
    let queue = thread.wchan().clone();
    if let Some(queue) = queue {
        queue.remove(thread);
    }
    make_runnable(thread.clone());
}
