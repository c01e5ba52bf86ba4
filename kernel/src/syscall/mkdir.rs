// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::MAXPATHLEN,
    fs::namev::{dir_namev, lookup},
    prelude::*,
};

/// Create the directory named by `path`.
pub fn do_mkdir(path: &str) -> Result<()> {
    debug!("mkdir path = {:?}", path);
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
            dir.mkdir(name)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{syscall, test_env};

    #[test]
    fn mkdir_then_rmdir_restores_the_parent() {
        test_env::run(|| {
            do_mkdir("/fresh").unwrap();
            assert!(syscall::do_stat("/fresh").unwrap().vtype.is_dir());
            syscall::do_rmdir("/fresh").unwrap();
            assert_eq!(
                syscall::do_stat("/fresh").unwrap_err().error(),
                Errno::ENOENT
            );
        });
    }

    #[test]
    fn existing_path_is_eexist() {
        test_env::run(|| {
            do_mkdir("/dup").unwrap();
            assert_eq!(do_mkdir("/dup").unwrap_err().error(), Errno::EEXIST);
        });
    }

    #[test]
    fn missing_intermediate_is_enoent() {
        test_env::run(|| {
            assert_eq!(do_mkdir("/no/such").unwrap_err().error(), Errno::ENOENT);
        });
    }

    #[test]
    fn empty_path_is_einval() {
        test_env::run(|| {
            assert_eq!(do_mkdir("").unwrap_err().error(), Errno::EINVAL);
        });
    }
}
