// SPDX-License-Identifier: MPL-2.0

//! Path-name resolution.

use super::{
    file::O_CREAT,
    rootfs,
    vnode::Vnode,
};
use crate::{
    config::{MAXPATHLEN, NAME_LEN},
    prelude::*,
};

/// Look up one component `name` in `dir`.
///
/// `"."` and the empty name resolve to `dir` itself; everything else is
/// delegated to the directory's own lookup.
pub fn lookup(dir: &Arc<dyn Vnode>, name: &str) -> Result<Arc<dyn Vnode>> {
    if !dir.is_dir() {
        return_errno_with_message!(Errno::ENOTDIR, "lookup in a non-directory");
    }
    if name == "." || name.is_empty() {
        return Ok(dir.clone());
    }
    if name.len() > NAME_LEN {
        return_errno_with_message!(Errno::ENAMETOOLONG, "path component too long");
    }
    dir.lookup(name)
}

/// Resolve all but the last component of `path`.
///
/// Walking starts from `base`, or from the working directory when `base`
/// is `None`, or from the fs root when the path is absolute. On success
/// the parent directory and the (possibly empty) basename are returned;
/// the basename is empty when the path ends in `/`.
pub fn dir_namev<'a>(
    path: &'a str,
    base: Option<&Arc<dyn Vnode>>,
) -> Result<(Arc<dyn Vnode>, &'a str)> {
    let start: Arc<dyn Vnode> = if path.starts_with('/') {
        rootfs::root_vnode()
            .ok_or_else(|| Error::with_message(Errno::ENOENT, "no root file system"))?
    } else if let Some(base) = base {
        base.clone()
    } else {
        current!()
            .cwd()
            .ok_or_else(|| Error::with_message(Errno::ENOENT, "process has no working directory"))?
    };

    if path.is_empty() {
        return Ok((start, ""));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (walk, last): (&[&str], &str) = if path.ends_with('/') || segments.is_empty() {
        (&segments[..], "")
    } else {
        let (last, walk) = segments.split_last().unwrap();
        (walk, *last)
    };

    let mut dir = start;
    for segment in walk {
        if segment.len() > NAME_LEN {
            return_errno_with_message!(Errno::ENAMETOOLONG, "path component too long");
        }
        dir = lookup(&dir, segment)?;
    }
    if !dir.is_dir() {
        return_errno_with_message!(Errno::ENOTDIR, "path prefix is not a directory");
    }
    Ok((dir, last))
}

/// Resolve `path` to a vnode, creating the basename via the parent
/// directory when it is missing and `O_CREAT` was given.
pub fn open_namev(
    path: &str,
    oflags: u32,
    base: Option<&Arc<dyn Vnode>>,
) -> Result<Arc<dyn Vnode>> {
    if path.len() > MAXPATHLEN {
        return_errno_with_message!(Errno::ENAMETOOLONG, "path too long");
    }
    let (parent, name) = dir_namev(path, base)?;
    match lookup(&parent, name) {
        Ok(vnode) => Ok(vnode),
        Err(e) if e.error() == Errno::ENOENT && oflags & O_CREAT != 0 => parent.create(name),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_CREAT, O_RDWR},
        syscall, test_env,
    };

    #[test]
    fn walks_nested_paths() {
        test_env::run(|| {
            syscall::do_mkdir("/a").unwrap();
            syscall::do_mkdir("/a/b").unwrap();
            let fd = syscall::do_open("/a/b/c", O_CREAT | O_RDWR).unwrap();
            syscall::do_close(fd).unwrap();

            let stat = syscall::do_stat("/a/b/c").unwrap();
            assert!(stat.vtype.is_regular());
            assert_eq!(stat.size, 0);
        });
    }

    #[test]
    fn dot_and_empty_resolve_to_the_directory() {
        test_env::run(|| {
            let root = rootfs::root_vnode().unwrap();
            let same = lookup(&root, ".").unwrap();
            assert!(Arc::ptr_eq(&root, &same));
            let same = lookup(&root, "").unwrap();
            assert!(Arc::ptr_eq(&root, &same));
        });
    }

    #[test]
    fn trailing_slash_yields_empty_basename() {
        test_env::run(|| {
            syscall::do_mkdir("/d").unwrap();
            let (parent, name) = dir_namev("/d/", None).unwrap();
            assert!(name.is_empty());
            assert!(parent.is_dir());
            let d = rootfs::root_vnode().unwrap().lookup("d").unwrap();
            assert!(Arc::ptr_eq(&parent, &d));
        });
    }

    #[test]
    fn dotdot_walks_upward() {
        test_env::run(|| {
            syscall::do_mkdir("/up").unwrap();
            syscall::do_mkdir("/up/down").unwrap();
            let v = open_namev("/up/down/../..", 0, None).unwrap();
            let root = rootfs::root_vnode().unwrap();
            assert!(Arc::ptr_eq(&v, &root));
        });
    }

    #[test]
    fn long_component_is_rejected() {
        test_env::run(|| {
            let long = "x".repeat(NAME_LEN + 1);
            let err = open_namev(&long, 0, None).unwrap_err();
            assert_eq!(err.error(), Errno::ENAMETOOLONG);

            let nested = format!("{}/tail", long);
            let err = dir_namev(&nested, None).unwrap_err();
            assert_eq!(err.error(), Errno::ENAMETOOLONG);
        });
    }

    #[test]
    fn lookup_through_a_file_is_enotdir() {
        test_env::run(|| {
            let fd = syscall::do_open("/plain", O_CREAT | O_RDWR).unwrap();
            syscall::do_close(fd).unwrap();
            let err = open_namev("/plain/sub", 0, None).unwrap_err();
            assert_eq!(err.error(), Errno::ENOTDIR);
        });
    }
}
