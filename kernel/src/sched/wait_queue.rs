// SPDX-License-Identifier: MPL-2.0

use crate::{prelude::*, thread::Thread};

/// A FIFO queue of sleeping threads.
///
/// Wait queues are embedded in the structures threads block on: processes
/// (child-exit notification), mutexes, and page frames (busy I/O). A thread
/// is on at most one wait queue at any time.
#[derive(Clone)]
pub struct WaitQueue {
    inner: Arc<WaitQueueInner>,
}

struct WaitQueueInner {
    queue: SpinLock<VecDeque<Arc<Thread>>>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WaitQueueInner {
                queue: SpinLock::new(VecDeque::new()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Two handles are the same queue iff they share the same backing storage.
    pub fn ptr_eq(&self, other: &WaitQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn enqueue(&self, thread: Arc<Thread>) {
        let mut wchan = thread.wchan();
        assert!(wchan.is_none(), "thread is already on a wait queue");
        *wchan = Some(self.clone());
        drop(wchan);
        self.inner.queue.lock().push_back(thread);
    }

    pub(crate) fn dequeue(&self) -> Option<Arc<Thread>> {
        let thread = self.inner.queue.lock().pop_front()?;
        thread.wchan().take();
        Some(thread)
    }

    /// Pull a specific thread out of the queue, wherever it sits.
    pub(crate) fn remove(&self, thread: &Arc<Thread>) -> bool {
        let mut queue = self.inner.queue.lock();
        let Some(pos) = queue.iter().position(|t| Arc::ptr_eq(t, thread)) else {
            return false;
        };
        queue.remove(pos);
        drop(queue);
        thread.wchan().take();
        true
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for WaitQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("WaitQueue").field("len", &self.len()).finish()
    }
}
