// SPDX-License-Identifier: MPL-2.0

//! Kernel service routines: the system-call surface.
//!
//! Paths and buffers arrive as plain slices (the user-pointer marshalling
//! of a real trap path is outside this kernel). Success returns the
//! documented non-negative value; failure returns the errno listed for
//! the call.

mod brk;
mod chdir;
mod close;
mod dup;
mod getdent;
mod link;
mod lseek;
mod mkdir;
mod mknod;
mod mmap;
mod open;
mod read;
mod rename;
mod rmdir;
mod stat;
mod unlink;
mod write;

pub use brk::do_brk;
pub use chdir::do_chdir;
pub use close::do_close;
pub use dup::{do_dup, do_dup2};
pub use getdent::do_getdent;
pub use link::do_link;
pub use lseek::{do_lseek, SEEK_CUR, SEEK_END, SEEK_SET};
pub use mkdir::do_mkdir;
pub use mknod::do_mknod;
pub use mmap::{do_mmap, do_munmap};
pub use open::do_open;
pub use read::do_read;
pub use rename::do_rename;
pub use rmdir::do_rmdir;
pub use stat::do_stat;
pub use unlink::do_unlink;
pub use write::do_write;

// Process-management calls live with the process subsystem.
pub use crate::process::{do_exit, do_fork, do_waitpid};

use crate::{
    fs::{file::File, file_table::FileDesc},
    prelude::*,
};

/// Look up an open file of the current process, taking a reference.
pub(crate) fn fget(fd: FileDesc) -> Result<Arc<File>> {
    current!()
        .file_table()
        .lock()
        .get(fd)
        .ok_or_else(|| Error::with_message(Errno::EBADF, "bad file descriptor"))
}
