// SPDX-License-Identifier: MPL-2.0

//! cygnet: a cooperative Unix-like teaching-kernel core.
//!
//! The kernel runs hosted: one logical CPU is simulated by handing
//! execution between parked host threads, page tables are in-memory maps,
//! and the system-call surface takes plain slices. The subsystems (the
//! cooperative scheduler, processes and threads, the VFS, and virtual
//! memory with copy-on-write fork) keep their bare-metal contracts.

extern crate alloc;

pub mod config;
pub mod error;
pub mod fs;
pub(crate) mod prelude;
pub mod process;
pub mod sched;
pub mod syscall;
#[cfg(test)]
pub(crate) mod test_env;
pub mod thread;
pub mod vm;

use crate::{prelude::*, thread::Thread};

/// Boot the kernel and run `init_body` as the body of the init process.
///
/// The calling host thread becomes the idle thread: it hands the CPU to
/// runnable threads and otherwise sleeps. Once every spawned thread has
/// exited, the kernel is torn down and init's exit status is returned.
///
/// Initialization order: device tables and the root file system first,
/// then the idle process (adopting the calling thread), then the init
/// process, which creates the `/dev` nodes before running `init_body`.
pub fn boot<F>(init_body: F) -> i32
where
    F: FnOnce() + Send + 'static,
{
    thread::init_panic_hook();
    process::table::init();
    fs::rootfs::init();

    let idle = process::create_with_parent("idle", None).expect("failed to create the idle process");
    let idle_thread = Thread::adopt_current(&idle);
    sched::init(idle_thread.clone());

    let init =
        process::create_with_parent("init", Some(&idle)).expect("failed to create the init process");
    let init_thread = Thread::spawn(&init, move || {
        fs::rootfs::populate_dev().expect("failed to create the /dev nodes");
        init_body();
    });
    sched::make_runnable(init_thread);
    info!("kernel booted; init is pid {}", init.pid());

    // The idle loop: give the CPU away whenever anyone can use it.
    loop {
        if let Some(next) = sched::pop_runnable() {
            next.unpark();
            idle_thread.park();
            continue;
        }
        if sched::live_threads() == 0 {
            break;
        }
        panic!("kernel deadlock: every thread is asleep and nothing is runnable");
    }

    let status = init.exit_status().unwrap_or(0);
    teardown();
    status
}

/// Release everything a boot created, so another boot starts clean.
fn teardown() {
    for process in process::table::snapshot() {
        let threads: Vec<_> = process.threads().lock().drain(..).collect();
        for t in threads {
            if t.state() == thread::ThreadState::Exited {
                t.reap();
            }
        }
        process.vmmap().lock().clear();
        process.page_dir().clear();
        process.file_table().lock().close_all();
        process.drop_cwd();
        process.children().lock().clear();
    }
    process::table::init();
    sched::shutdown();
    fs::rootfs::shutdown();
    thread::clear_current();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boot_returns_init_exit_status() {
        crate::test_env::serialized(|| {
            let status = boot(|| {
                process::do_exit(42);
            });
            assert_eq!(status, 42);
        });
    }

    #[test]
    fn boot_creates_the_dev_nodes() {
        crate::test_env::run(|| {
            for path in ["/dev/null", "/dev/zero", "/dev/tty0", "/dev/tty1", "/dev/tty2"] {
                let stat = syscall::do_stat(path).unwrap();
                assert_eq!(stat.vtype, fs::vnode::VnodeType::CharDev);
            }
        });
    }

    #[test]
    fn idle_and_init_get_the_reserved_pids() {
        crate::test_env::run(|| {
            let current = current!();
            assert_eq!(current.pid(), config::PID_INIT);
            let parent = current.parent().unwrap();
            assert_eq!(parent.pid(), config::PID_IDLE);
            assert!(parent.parent().is_none());
        });
    }
}
