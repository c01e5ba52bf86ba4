// SPDX-License-Identifier: MPL-2.0

use super::fget;
use crate::{fs::file_table::FileDesc, prelude::*};

pub const SEEK_SET: u32 = 0;
pub const SEEK_CUR: u32 = 1;
pub const SEEK_END: u32 = 2;

/// Reposition `fd`. The resulting offset must not be negative; the new
/// position is returned.
pub fn do_lseek(fd: FileDesc, offset: isize, whence: u32) -> Result<usize> {
    let file = fget(fd)?;
    let base = match whence {
        SEEK_SET => 0,
        SEEK_CUR => file.pos() as isize,
        SEEK_END => file.vnode().len() as isize,
        _ => return_errno_with_message!(Errno::EINVAL, "bad whence"),
    };
    let new_pos = base + offset;
    if new_pos < 0 {
        return_errno_with_message!(Errno::EINVAL, "seek before the start of the file");
    }
    file.set_pos(new_pos as usize);
    Ok(new_pos as usize)
}
