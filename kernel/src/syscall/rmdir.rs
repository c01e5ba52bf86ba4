// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::namev::dir_namev,
    prelude::*,
};

/// Remove the (empty) directory named by `path`.
pub fn do_rmdir(path: &str) -> Result<()> {
    debug!("rmdir path = {:?}", path);
    if path.is_empty() {
        return_errno_with_message!(Errno::EINVAL, "empty path");
    }
    if path.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let (dir, name) = dir_namev(path, None)?;
    match name {
        "." => return_errno_with_message!(Errno::EINVAL, "cannot rmdir \".\""),
        ".." => return_errno_with_message!(Errno::ENOTEMPTY, "cannot rmdir \"..\""),
        _ => {}
    }
    dir.rmdir(name)
}
