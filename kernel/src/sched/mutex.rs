// SPDX-License-Identifier: MPL-2.0

use super::{cancellable_sleep_on, sleep_on, wakeup_on, WaitQueue};
use crate::{prelude::*, thread::Thread};

/// A blocking mutex, usable only from thread context.
///
/// Contended lockers sleep in FIFO order. Unlock transfers ownership
/// directly to the head of the wait queue, so there is never a window in
/// which the mutex is unlocked while waiters exist.
pub struct KMutex {
    holder: SpinLock<Option<Arc<Thread>>>,
    waitq: WaitQueue,
}

impl KMutex {
    pub fn new() -> Self {
        Self {
            holder: SpinLock::new(None),
            waitq: WaitQueue::new(),
        }
    }

    /// Acquire the mutex, sleeping while another thread holds it.
    ///
    /// Locking a mutex the caller already holds is a fatal kernel bug.
    pub fn lock(&self) {
        let current = Thread::current();
        let mut holder = self.holder.lock();
        assert!(
            !holder.as_ref().is_some_and(|h| Arc::ptr_eq(h, &current)),
            "thread relocked a mutex it already holds"
        );
        if holder.is_none() {
            *holder = Some(current);
            return;
        }
        drop(holder);
        sleep_on(&self.waitq);
        // The unlocker made us the holder before waking us.
        debug_assert!(self.holds(&current));
    }

    /// Like [`KMutex::lock`], but the sleep is cancellable. On `EINTR` the
    /// lock has *not* been acquired.
    pub fn lock_cancellable(&self) -> Result<()> {
        let current = Thread::current();
        let mut holder = self.holder.lock();
        assert!(
            !holder.as_ref().is_some_and(|h| Arc::ptr_eq(h, &current)),
            "thread relocked a mutex it already holds"
        );
        if holder.is_none() {
            *holder = Some(current);
            return Ok(());
        }
        drop(holder);
        cancellable_sleep_on(&self.waitq)?;
        debug_assert!(self.holds(&current));
        Ok(())
    }

    /// Release the mutex. If any thread is waiting, the head of the queue
    /// is woken and becomes the holder.
    pub fn unlock(&self) {
        let current = Thread::current();
        let mut holder = self.holder.lock();
        assert!(
            holder.as_ref().is_some_and(|h| Arc::ptr_eq(h, &current)),
            "thread unlocked a mutex it does not hold"
        );
        *holder = wakeup_on(&self.waitq);
        assert!(!holder.as_ref().is_some_and(|h| Arc::ptr_eq(h, &current)));
    }

    pub fn holds(&self, thread: &Arc<Thread>) -> bool {
        self.holder
            .lock()
            .as_ref()
            .is_some_and(|h| Arc::ptr_eq(h, thread))
    }

    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }
}

impl Default for KMutex {
    fn default() -> Self {
        Self::new()
    }
}
