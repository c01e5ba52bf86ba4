// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::{
        namev::{dir_namev, lookup},
        vnode::Stat,
    },
    prelude::*,
};

/// Stat the file named by `path`.
pub fn do_stat(path: &str) -> Result<Stat> {
    if path.is_empty() {
        return_errno_with_message!(Errno::EINVAL, "empty path");
    }
    if path.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let (dir, name) = dir_namev(path, None)?;
    let vnode = lookup(&dir, name)?;
    vnode.stat()
}
