// SPDX-License-Identifier: MPL-2.0

//! Shared scaffolding for kernel tests.
//!
//! The kernel's global state (scheduler, process table, root mount) only
//! supports one instance at a time, so tests that boot serialize behind a
//! process-wide lock and get a freshly booted kernel each.

use std::sync::Mutex;

static KERNEL_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` while holding the kernel lock, without booting. For tests that
/// manage boot themselves.
pub(crate) fn serialized<F: FnOnce()>(f: F) {
    let _guard = KERNEL_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let _ = env_logger::builder().is_test(true).try_init();
    f();
}

/// Boot a fresh kernel and run `body` inside the init process. A panic in
/// any kernel thread is re-raised here so the test fails with the
/// original message.
pub(crate) fn run<F>(body: F)
where
    F: FnOnce() + Send + 'static,
{
    serialized(|| {
        let _status = crate::boot(body);
        if let Some(payload) = crate::sched::take_failure() {
            std::panic::resume_unwind(payload);
        }
    });
}
