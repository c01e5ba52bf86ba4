// SPDX-License-Identifier: MPL-2.0

//! The root mount and the `/dev` nodes created at boot.

use super::{dev, ramfs, vnode::Vnode, vnode::VnodeType};
use crate::{config::NUM_TERMINALS, prelude::*, syscall};

static ROOT: SpinLock<Option<Arc<dyn Vnode>>> = SpinLock::new(None);

/// Mount a fresh ramfs as the root file system and register the built-in
/// devices. Called once per boot, before any process exists.
pub(crate) fn init() {
    dev::init();
    *ROOT.lock() = Some(ramfs::new_root());
}

pub(crate) fn shutdown() {
    ROOT.lock().take();
}

pub fn root_vnode() -> Option<Arc<dyn Vnode>> {
    ROOT.lock().clone()
}

/// Create `/dev` with the standard nodes. Runs once, in the init process.
pub(crate) fn populate_dev() -> Result<()> {
    syscall::do_mkdir("/dev")?;
    syscall::do_mknod("/dev/null", VnodeType::CharDev, dev::DEV_NULL)?;
    syscall::do_mknod("/dev/zero", VnodeType::CharDev, dev::DEV_ZERO)?;
    for n in 0..NUM_TERMINALS {
        let path = format!("/dev/tty{}", n);
        syscall::do_mknod(&path, VnodeType::CharDev, dev::dev_tty(n))?;
    }
    info!("/dev populated with null, zero and {} terminals", NUM_TERMINALS);
    Ok(())
}
