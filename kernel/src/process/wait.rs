// SPDX-License-Identifier: MPL-2.0

use super::{table, Pid, Process};
use crate::{prelude::*, sched, thread::ThreadState};

/// Wait for a child to exit and reap it.
///
/// With `pid == -1` any dead child is taken; with `pid > 0` only that
/// child. Returns the reaped pid and its exit status. `ECHILD` if the
/// process has no children, or the named pid is not one of them.
pub fn do_waitpid(pid: Pid, options: u32) -> Result<(Pid, i32)> {
    if options != 0 || pid < -1 {
        return_errno_with_message!(Errno::EINVAL, "unsupported waitpid arguments");
    }
    let current = current!();
    {
        let children = current.children().lock();
        if children.is_empty() {
            return_errno!(Errno::ECHILD);
        }
        if pid != -1 && !children.iter().any(|c| c.pid() == pid) {
            return_errno!(Errno::ECHILD);
        }
    }

    loop {
        let candidate = {
            let children = current.children().lock();
            children
                .iter()
                .find(|c| (pid == -1 || c.pid() == pid) && c.is_dead())
                .cloned()
        };
        if let Some(child) = candidate {
            let status = child.exit_status().expect("dead child has no status");
            reap(&current, &child);
            debug!("pid {} reaped child {} (status {})", current.pid(), child.pid(), status);
            return Ok((child.pid(), status));
        }
        sched::sleep_on(current.wait_queue());
    }
}

/// Destroy a zombie child: join its (exited) threads, release its address
/// space and page directory, and drop it from both the parent's child
/// list and the global process list.
fn reap(parent: &Arc<Process>, child: &Arc<Process>) {
    let threads: Vec<_> = child.threads().lock().drain(..).collect();
    for t in &threads {
        assert_eq!(t.state(), ThreadState::Exited);
        t.reap();
    }

    child.vmmap().lock().clear();
    child.page_dir().clear();
    child.drop_cwd();

    parent
        .children()
        .lock()
        .retain(|c| !Arc::ptr_eq(c, child));
    table::unregister(child);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{process, test_env};

    #[test]
    fn waitpid_reaps_three_children_then_echild() {
        test_env::run(|| {
            let mut spawned = Vec::new();
            for status in [3, 5, 7] {
                let pid = process::do_fork(move || {
                    process::do_exit(status);
                })
                .unwrap();
                spawned.push((pid, status));
            }

            let mut reaped = Vec::new();
            for _ in 0..3 {
                let (pid, status) = do_waitpid(-1, 0).unwrap();
                reaped.push((pid, status));
            }
            reaped.sort_unstable();
            spawned.sort_unstable();
            assert_eq!(reaped, spawned);

            let err = do_waitpid(-1, 0).unwrap_err();
            assert_eq!(err.error(), Errno::ECHILD);
        });
    }

    #[test]
    fn waitpid_for_a_specific_child() {
        test_env::run(|| {
            let first = process::do_fork(|| process::do_exit(11)).unwrap();
            let second = process::do_fork(|| process::do_exit(22)).unwrap();

            assert_eq!(do_waitpid(second, 0).unwrap(), (second, 22));
            assert_eq!(do_waitpid(first, 0).unwrap(), (first, 11));
        });
    }

    #[test]
    fn waitpid_on_a_stranger_is_echild() {
        test_env::run(|| {
            let child = process::do_fork(|| process::do_exit(0)).unwrap();
            let err = do_waitpid(child + 1000, 0).unwrap_err();
            assert_eq!(err.error(), Errno::ECHILD);
            do_waitpid(child, 0).unwrap();
        });
    }

    #[test]
    fn orphans_are_reparented_to_init() {
        test_env::run(|| {
            // The test body runs as init. A child that dies before its own
            // child does leaves a grandchild, which must become ours.
            let child = process::do_fork(|| {
                process::do_fork(|| {
                    // Outlive the parent.
                    crate::sched::yield_now();
                    process::do_exit(99);
                })
                .unwrap();
                process::do_exit(1);
            })
            .unwrap();

            let mut statuses = Vec::new();
            for _ in 0..2 {
                let (_, status) = do_waitpid(-1, 0).unwrap();
                statuses.push(status);
            }
            statuses.sort_unstable();
            assert_eq!(statuses, vec![1, 99]);
            assert_eq!(do_waitpid(-1, 0).unwrap_err().error(), Errno::ECHILD);
            let _ = child;
        });
    }

    #[test]
    fn kill_all_spares_init_and_reaps_cleanly() {
        test_env::run(|| {
            for _ in 0..3 {
                process::do_fork(|| {
                    let queue = crate::sched::WaitQueue::new();
                    // Sleep until cancelled.
                    let _ = crate::sched::cancellable_sleep_on(&queue);
                })
                .unwrap();
                crate::sched::yield_now();
            }
            process::proc_kill_all();
            let mut count = 0;
            while do_waitpid(-1, 0).is_ok() {
                count += 1;
            }
            assert_eq!(count, 3);
        });
    }
}
