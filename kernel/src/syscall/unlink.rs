// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::namev::{dir_namev, lookup},
    prelude::*,
};

/// Remove the non-directory named by `path`.
pub fn do_unlink(path: &str) -> Result<()> {
    debug!("unlink path = {:?}", path);
    if path.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let (dir, name) = dir_namev(path, None)?;
    let target = lookup(&dir, name)?;
    if target.is_dir() {
        return_errno_with_message!(Errno::EISDIR, "unlink target is a directory");
    }
    drop(target);
    dir.unlink(name)
}
