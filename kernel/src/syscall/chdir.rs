// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::namev::{dir_namev, lookup},
    prelude::*,
};

/// Make `path` the current process's working directory.
pub fn do_chdir(path: &str) -> Result<()> {
    debug!("chdir path = {:?}", path);
    if path.is_empty() {
        return_errno_with_message!(Errno::EINVAL, "empty path");
    }
    if path.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let (dir, name) = dir_namev(path, None)?;
    let target = lookup(&dir, name)?;
    if !target.is_dir() {
        return_errno_with_message!(Errno::ENOTDIR, "chdir target is not a directory");
    }
    // Dropping the old working directory's reference happens implicitly
    // when the slot is overwritten.
    current!().set_cwd(target);
    Ok(())
}
