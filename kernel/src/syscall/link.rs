// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::namev::{dir_namev, lookup, open_namev},
    prelude::*,
};

/// Create `to` as another name for the existing file `from`.
pub fn do_link(from: &str, to: &str) -> Result<()> {
    debug!("link from = {:?}, to = {:?}", from, to);
    if from.len() > MAXPATHLEN || to.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let source = open_namev(from, 0, None)?;
    if source.is_dir() {
        return_errno_with_message!(Errno::EISDIR, "cannot link a directory");
    }
    let (dir, name) = dir_namev(to, None)?;
    match lookup(&dir, name) {
        Ok(_) => return_errno!(Errno::EEXIST),
        Err(e) if e.error() == Errno::ENOENT => dir.link(&source, name),
        Err(e) => Err(e),
    }
}
