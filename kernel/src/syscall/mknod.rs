// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::{
        namev::{dir_namev, lookup},
        vnode::{DevId, VnodeType},
    },
    prelude::*,
};

/// Create a device special file for `devid` at `path`. Only char and
/// block nodes can be made this way.
pub fn do_mknod(path: &str, vtype: VnodeType, devid: DevId) -> Result<()> {
    debug!("mknod path = {:?}, type = {:?}, devid = {:?}", path, vtype, devid);
    if !vtype.is_device() {
        return_errno_with_message!(Errno::EINVAL, "mknod only creates device special files");
    }
    if path.is_empty() {
        return_errno_with_message!(Errno::EINVAL, "empty path");
    }
    if path.len() > MAXPATHLEN {
        return_errno!(Errno::ENAMETOOLONG);
    }
    let (dir, name) = dir_namev(path, None)?;
    match lookup(&dir, name) {
        Ok(_) => return_errno!(Errno::EEXIST),
        Err(e) if e.error() == Errno::ENOENT => {
            dir.mknod(name, vtype, devid)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
