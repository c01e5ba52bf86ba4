// SPDX-License-Identifier: MPL-2.0

use super::fget;
use crate::{
    fs::{
        file_table::FileDesc,
        vnode::{Dirent, DIRENT_SIZE},
    },
    prelude::*,
};

/// Read one directory entry at the descriptor's current position.
/// Returns `sizeof(dirent)`, or 0 at end-of-directory.
pub fn do_getdent(fd: FileDesc, dirent: &mut Dirent) -> Result<usize> {
    let file = fget(fd)?;
    if !file.vnode().is_dir() {
        return_errno_with_message!(Errno::ENOTDIR, "getdent needs a directory descriptor");
    }
    let consumed = file.vnode().readdir(file.pos(), dirent)?;
    file.advance_pos(consumed);
    if consumed == 0 {
        Ok(0)
    } else {
        Ok(DIRENT_SIZE)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_CREAT, O_RDONLY, O_RDWR},
        syscall, test_env,
    };

    #[test]
    fn directory_listing_is_complete() {
        test_env::run(|| {
            syscall::do_mkdir("/d").unwrap();
            for p in ["/d/x", "/d/y"] {
                let fd = syscall::do_open(p, O_CREAT | O_RDWR).unwrap();
                syscall::do_close(fd).unwrap();
            }

            let fd = syscall::do_open("/d", O_RDONLY).unwrap();
            let mut seen = Vec::new();
            let mut dirent = Dirent::empty();
            loop {
                let n = do_getdent(fd, &mut dirent).unwrap();
                if n == 0 {
                    break;
                }
                assert_eq!(n, DIRENT_SIZE);
                seen.push(dirent.name().to_string());
            }
            seen.sort();
            assert_eq!(seen, vec![".", "..", "x", "y"]);
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn getdent_on_a_file_is_enotdir() {
        test_env::run(|| {
            let fd = syscall::do_open("/f", O_CREAT | O_RDWR).unwrap();
            let mut dirent = Dirent::empty();
            assert_eq!(
                do_getdent(fd, &mut dirent).unwrap_err().error(),
                Errno::ENOTDIR
            );
            syscall::do_close(fd).unwrap();
        });
    }
}
