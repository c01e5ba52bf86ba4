// SPDX-License-Identifier: MPL-2.0

use crate::{fs::file_table::FileDesc, prelude::*};

/// Close `fd`: clear the slot and release its reference on the open file.
/// The file itself goes away when the last descriptor referring to it
/// (across dups and forks) is closed.
pub fn do_close(fd: FileDesc) -> Result<()> {
    let current = current!();
    let file = current
        .file_table()
        .lock()
        .remove(fd)
        .ok_or_else(|| Error::with_message(Errno::EBADF, "bad file descriptor"))?;
    drop(file);
    Ok(())
}
