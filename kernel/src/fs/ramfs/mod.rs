// SPDX-License-Identifier: MPL-2.0

//! An in-memory file system backing the root mount.
//!
//! Directories are name-ordered maps; regular files are growable byte
//! buffers; special files only remember their device id and defer all
//! I/O to the device tables.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{
    dev,
    vnode::{DevId, Dirent, Stat, Vnode, VnodeType, DIRENT_SIZE},
};
use crate::{
    prelude::*,
    vm::{
        mmobj::MmObj,
        page::{pframe_get, PFrame, ResidentSet},
    },
};

static INO_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

fn next_ino() -> u64 {
    INO_ALLOCATOR.fetch_add(1, Ordering::SeqCst)
}

/// Create the root directory of a fresh ramfs. The root is its own
/// parent, so `..` at the top resolves to the root itself.
pub fn new_root() -> Arc<dyn Vnode> {
    let root = RamDir::new_detached();
    let weak: Weak<dyn Vnode> = {
        let as_dyn: Arc<dyn Vnode> = root.clone();
        Arc::downgrade(&as_dyn)
    };
    *root.parent.lock() = weak;
    root
}

pub(crate) struct RamDir {
    ino: u64,
    this: Weak<RamDir>,
    parent: SpinLock<Weak<dyn Vnode>>,
    entries: SpinLock<BTreeMap<String, Arc<dyn Vnode>>>,
}

impl core::fmt::Debug for RamDir {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("RamDir").field("ino", &self.ino).finish()
    }
}

impl RamDir {
    fn new_detached() -> Arc<RamDir> {
        Arc::new_cyclic(|this| RamDir {
            ino: next_ino(),
            this: this.clone(),
            parent: SpinLock::new(Weak::<RamDir>::new()),
            entries: SpinLock::new(BTreeMap::new()),
        })
    }

    fn new_child_of(parent: &Arc<dyn Vnode>) -> Arc<RamDir> {
        let dir = Self::new_detached();
        *dir.parent.lock() = Arc::downgrade(parent);
        dir
    }

    fn this(&self) -> Arc<dyn Vnode> {
        self.this.upgrade().expect("directory vanished under us")
    }

    fn parent_vnode(&self) -> Arc<dyn Vnode> {
        self.parent
            .lock()
            .upgrade()
            .unwrap_or_else(|| self.this())
    }
}

impl Vnode for RamDir {
    fn vtype(&self) -> VnodeType {
        VnodeType::Directory
    }

    fn len(&self) -> usize {
        (self.entries.lock().len() + 2) * DIRENT_SIZE
    }

    fn ino(&self) -> u64 {
        self.ino
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Vnode>> {
        match name {
            "." => Ok(self.this()),
            ".." => Ok(self.parent_vnode()),
            _ => self
                .entries
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::new(Errno::ENOENT)),
        }
    }

    fn create(&self, name: &str) -> Result<Arc<dyn Vnode>> {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return_errno!(Errno::EEXIST);
        }
        let file: Arc<dyn Vnode> = RamFile::new();
        entries.insert(name.to_string(), file.clone());
        Ok(file)
    }

    fn mknod(&self, name: &str, vtype: VnodeType, devid: DevId) -> Result<Arc<dyn Vnode>> {
        if !vtype.is_device() {
            return_errno_with_message!(Errno::EINVAL, "mknod only creates device special files");
        }
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return_errno!(Errno::EEXIST);
        }
        let node: Arc<dyn Vnode> = Arc::new(RamSpecial {
            ino: next_ino(),
            vtype,
            devid,
        });
        entries.insert(name.to_string(), node.clone());
        Ok(node)
    }

    fn mkdir(&self, name: &str) -> Result<Arc<dyn Vnode>> {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return_errno!(Errno::EEXIST);
        }
        let dir: Arc<dyn Vnode> = RamDir::new_child_of(&self.this());
        entries.insert(name.to_string(), dir.clone());
        Ok(dir)
    }

    fn rmdir(&self, name: &str) -> Result<()> {
        match name {
            "." => return_errno!(Errno::EINVAL),
            ".." => return_errno!(Errno::ENOTEMPTY),
            _ => {}
        }
        let mut entries = self.entries.lock();
        let target = entries.get(name).ok_or_else(|| Error::new(Errno::ENOENT))?;
        let Some(dir) = target.downcast_ref::<RamDir>() else {
            return_errno!(Errno::ENOTDIR);
        };
        if !dir.entries.lock().is_empty() {
            return_errno!(Errno::ENOTEMPTY);
        }
        entries.remove(name);
        Ok(())
    }

    fn unlink(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let target = entries.get(name).ok_or_else(|| Error::new(Errno::ENOENT))?;
        if target.is_dir() {
            return_errno!(Errno::EISDIR);
        }
        if let Some(file) = target.downcast_ref::<RamFile>() {
            file.nlink.fetch_sub(1, Ordering::SeqCst);
        }
        entries.remove(name);
        Ok(())
    }

    fn link(&self, target: &Arc<dyn Vnode>, name: &str) -> Result<()> {
        if target.is_dir() {
            return_errno_with_message!(Errno::EISDIR, "directories cannot be hard linked");
        }
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return_errno!(Errno::EEXIST);
        }
        if let Some(file) = target.downcast_ref::<RamFile>() {
            file.nlink.fetch_add(1, Ordering::SeqCst);
        }
        entries.insert(name.to_string(), target.clone());
        Ok(())
    }

    fn readdir(&self, off: usize, dirent: &mut Dirent) -> Result<usize> {
        let idx = off / DIRENT_SIZE;
        let (name, ino) = match idx {
            0 => (".".to_string(), self.ino),
            1 => ("..".to_string(), self.parent_vnode().ino()),
            _ => {
                let entries = self.entries.lock();
                match entries.iter().nth(idx - 2) {
                    Some((name, vnode)) => (name.clone(), vnode.ino()),
                    None => return Ok(0),
                }
            }
        };
        dirent.ino = ino;
        dirent.off = ((idx + 1) * DIRENT_SIZE) as u64;
        dirent.set_name(&name);
        Ok(DIRENT_SIZE)
    }

    fn stat(&self) -> Result<Stat> {
        Ok(Stat {
            ino: self.ino,
            vtype: VnodeType::Directory,
            nlink: 2,
            size: self.len(),
            rdev: DevId::default(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct RamFile {
    ino: u64,
    data: Arc<SpinRwLock<Vec<u8>>>,
    nlink: AtomicUsize,
    mobj: SpinLock<Weak<FileMmObj>>,
}

impl core::fmt::Debug for RamFile {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("RamFile").field("ino", &self.ino).finish()
    }
}

impl RamFile {
    fn new() -> Arc<RamFile> {
        Arc::new(RamFile {
            ino: next_ino(),
            data: Arc::new(SpinRwLock::new(Vec::new())),
            nlink: AtomicUsize::new(1),
            mobj: SpinLock::new(Weak::new()),
        })
    }
}

impl Vnode for RamFile {
    fn vtype(&self) -> VnodeType {
        VnodeType::Regular
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn ino(&self) -> u64 {
        self.ino
    }

    fn read_at(&self, off: usize, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.read();
        if off >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - off);
        buf[..n].copy_from_slice(&data[off..off + n]);
        Ok(n)
    }

    fn write_at(&self, off: usize, buf: &[u8]) -> Result<usize> {
        let mut data = self.data.write();
        if data.len() < off + buf.len() {
            data.resize(off + buf.len(), 0);
        }
        data[off..off + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn truncate(&self, len: usize) -> Result<()> {
        self.data.write().resize(len, 0);
        Ok(())
    }

    fn stat(&self) -> Result<Stat> {
        Ok(Stat {
            ino: self.ino,
            vtype: VnodeType::Regular,
            nlink: self.nlink.load(Ordering::SeqCst),
            size: self.len(),
            rdev: DevId::default(),
        })
    }

    fn mmap(self: Arc<Self>) -> Result<Arc<dyn MmObj>> {
        let mut cached = self.mobj.lock();
        if let Some(obj) = cached.upgrade() {
            return Ok(obj);
        }
        // One object per inode, so every mapping of this file aliases the
        // same pages.
        let obj = Arc::new(FileMmObj {
            data: self.data.clone(),
            resident: ResidentSet::new(),
        });
        *cached = Arc::downgrade(&obj);
        Ok(obj)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct RamSpecial {
    ino: u64,
    vtype: VnodeType,
    devid: DevId,
}

impl core::fmt::Debug for RamSpecial {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("RamSpecial")
            .field("ino", &self.ino)
            .field("vtype", &self.vtype)
            .field("devid", &self.devid)
            .finish()
    }
}

impl Vnode for RamSpecial {
    fn vtype(&self) -> VnodeType {
        self.vtype
    }

    fn len(&self) -> usize {
        0
    }

    fn ino(&self) -> u64 {
        self.ino
    }

    fn devid(&self) -> DevId {
        self.devid
    }

    fn read_at(&self, off: usize, buf: &mut [u8]) -> Result<usize> {
        match self.vtype {
            VnodeType::CharDev => dev::bytedev_lookup(self.devid)
                .ok_or_else(|| Error::new(Errno::ENXIO))?
                .read(off, buf),
            _ => {
                dev::blockdev_lookup(self.devid).ok_or_else(|| Error::new(Errno::ENXIO))?;
                return_errno_with_message!(Errno::EINVAL, "block special files are not byte readable");
            }
        }
    }

    fn write_at(&self, off: usize, buf: &[u8]) -> Result<usize> {
        match self.vtype {
            VnodeType::CharDev => dev::bytedev_lookup(self.devid)
                .ok_or_else(|| Error::new(Errno::ENXIO))?
                .write(off, buf),
            _ => {
                dev::blockdev_lookup(self.devid).ok_or_else(|| Error::new(Errno::ENXIO))?;
                return_errno_with_message!(Errno::EINVAL, "block special files are not byte writable");
            }
        }
    }

    fn stat(&self) -> Result<Stat> {
        Ok(Stat {
            ino: self.ino,
            vtype: self.vtype,
            nlink: 1,
            size: 0,
            rdev: self.devid,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Pages of a memory-mapped regular file. Shared mappings of one inode
/// all go through the same object, so stores are visible to every mapper;
/// dirty pages are written back when the last mapping goes away.
pub(crate) struct FileMmObj {
    data: Arc<SpinRwLock<Vec<u8>>>,
    resident: ResidentSet,
}

impl MmObj for FileMmObj {
    fn resident(&self) -> &ResidentSet {
        &self.resident
    }

    fn lookup_page(self: Arc<Self>, pagenum: usize, _for_write: bool) -> Result<Arc<PFrame>> {
        if let Some(pf) = self.resident.get(pagenum) {
            crate::vm::page::wait_not_busy(&pf);
            return Ok(pf);
        }
        let obj: Arc<dyn MmObj> = self;
        pframe_get(&obj, pagenum)
    }

    fn fill_page(&self, pf: &PFrame) -> Result<()> {
        let data = self.data.read();
        let off = pf.pagenum() * PAGE_SIZE;
        pf.with_data(|page| {
            page.fill(0);
            if off < data.len() {
                let n = PAGE_SIZE.min(data.len() - off);
                page[..n].copy_from_slice(&data[off..off + n]);
            }
        });
        Ok(())
    }

    fn dirty_page(&self, pf: &PFrame) -> Result<()> {
        if let Some(resident) = self.resident.get(pf.pagenum()) {
            resident.set_dirty();
        }
        Ok(())
    }

    fn clean_page(&self, pf: &PFrame) -> Result<()> {
        let mut data = self.data.write();
        let off = pf.pagenum() * PAGE_SIZE;
        if off < data.len() {
            let n = PAGE_SIZE.min(data.len() - off);
            pf.with_data(|page| data[off..off + n].copy_from_slice(&page[..n]));
        }
        pf.clear_dirty();
        Ok(())
    }

    fn bottom_object(self: Arc<Self>) -> Arc<dyn MmObj> {
        self
    }
}

impl Drop for FileMmObj {
    fn drop(&mut self) {
        for pf in self.resident.snapshot() {
            if pf.is_dirty() {
                let _ = self.clean_page(&pf);
            }
        }
    }
}
