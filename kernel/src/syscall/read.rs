// SPDX-License-Identifier: MPL-2.0

use super::fget;
use crate::{fs::file_table::FileDesc, prelude::*};

/// Read from `fd` at its current position, advancing it by the number of
/// bytes the driver produced.
pub fn do_read(fd: FileDesc, buf: &mut [u8]) -> Result<usize> {
    let file = fget(fd)?;
    if !file.mode().readable() {
        return_errno_with_message!(Errno::EBADF, "file is not open for reading");
    }
    if file.vnode().is_dir() {
        return_errno!(Errno::EISDIR);
    }
    let n = file.vnode().read_at(file.pos(), buf)?;
    file.advance_pos(n);
    Ok(n)
}
