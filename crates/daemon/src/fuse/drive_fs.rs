//! `fuser` bridge for [`FsAdapter`]
//!
//! Metadata callbacks are spawned onto the tokio runtime and reply when done,
//! so a slow folder fetch does not hold up the session loop. Data callbacks on
//! a file handle (read, write, flush, release) run to completion on the
//! session thread to preserve the order the kernel issued them in.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use tokio::runtime::Handle;

use common::{DriveError, NodeKind};

use super::adapter::{EntryAttr, FsAdapter};
use super::inode_table::InodeTable;

const BLOCK_SIZE: u32 = 4096;

/// The FUSE filesystem for one mounted volume
pub struct DriveFs {
    adapter: Arc<FsAdapter>,
    runtime: Handle,
    ttl: Duration,
    uid: u32,
    gid: u32,
}

impl DriveFs {
    /// Must be called from within a tokio runtime
    pub fn new(adapter: Arc<FsAdapter>, ttl: Duration) -> Self {
        // SAFETY: getuid/getgid cannot fail and have no preconditions
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self {
            adapter,
            runtime: Handle::current(),
            ttl,
            uid,
            gid,
        }
    }

    pub fn adapter(&self) -> &Arc<FsAdapter> {
        &self.adapter
    }
}

/// Map a drive error onto the errno reported to the kernel
pub fn errno(err: &DriveError) -> c_int {
    match err {
        DriveError::NotFound(_) => libc::ENOENT,
        DriveError::State(_) => libc::EBADF,
        DriveError::Remote(_) => libc::EIO,
        DriveError::FileTooLarge { .. } => libc::EFBIG,
        DriveError::OutOfMemory(_) => libc::ENOMEM,
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

fn file_attr(attr: &EntryAttr, uid: u32, gid: u32) -> FileAttr {
    let (perm, nlink) = match attr.kind {
        NodeKind::Directory => (0o755, 2),
        NodeKind::File => (0o644, 1),
    };
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.mtime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: file_type(attr.kind),
        perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

impl Filesystem for DriveFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        tracing::info!(root = %self.adapter.root(), "filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(root = %self.adapter.root(), "filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str().map(str::to_owned) else {
            reply.error(libc::ENOENT);
            return;
        };
        tracing::debug!(parent, name = %name, "lookup");

        let adapter = self.adapter.clone();
        let (ttl, uid, gid) = (self.ttl, self.uid, self.gid);
        self.runtime.spawn(async move {
            match adapter.lookup(parent, &name).await {
                Ok(attr) => reply.entry(&ttl, &file_attr(&attr, uid, gid), 0),
                Err(e) => {
                    if !e.is_not_found() {
                        tracing::warn!(parent, name = %name, error = %e, "lookup failed");
                    }
                    reply.error(errno(&e));
                }
            }
        });
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        tracing::debug!(ino, "getattr");

        let adapter = self.adapter.clone();
        let (ttl, uid, gid) = (self.ttl, self.uid, self.gid);
        self.runtime.spawn(async move {
            match adapter.getattr(ino).await {
                Ok(attr) => reply.attr(&ttl, &file_attr(&attr, uid, gid)),
                Err(e) => reply.error(errno(&e)),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        tracing::debug!(ino, ?size, "setattr");

        let adapter = self.adapter.clone();
        let (ttl, uid, gid) = (self.ttl, self.uid, self.gid);
        self.runtime.spawn(async move {
            match adapter.setattr(ino).await {
                Ok(attr) => reply.attr(&ttl, &file_attr(&attr, uid, gid)),
                Err(e) => reply.error(errno(&e)),
            }
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        tracing::debug!(ino, offset, "readdir");

        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            let children = match adapter.readdir(ino).await {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(ino, error = %e, "readdir failed");
                    reply.error(errno(&e));
                    return;
                }
            };

            let parent = adapter.parent_inode(ino).unwrap_or(InodeTable::ROOT_INODE);
            let mut entries = vec![
                (ino, FileType::Directory, ".".to_string()),
                (parent, FileType::Directory, "..".to_string()),
            ];
            entries.extend(
                children
                    .into_iter()
                    .map(|entry| (entry.ino, file_type(entry.kind), entry.name)),
            );

            let skip = usize::try_from(offset).unwrap_or(0);
            for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
                // reply.add returns true once the kernel buffer is full
                if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                    break;
                }
            }
            reply.ok();
        });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        tracing::debug!(ino, "open");

        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            match adapter.open(ino).await {
                Ok(fh) => reply.opened(fh, fuser::consts::FOPEN_KEEP_CACHE),
                Err(e) => reply.error(errno(&e)),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        tracing::debug!(ino, fh, offset, size, "read");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };

        match self
            .runtime
            .block_on(self.adapter.read(fh, offset, size as usize))
        {
            Ok(data) => reply.data(&data),
            Err(e) => {
                tracing::warn!(ino, fh, error = %e, "read failed");
                reply.error(errno(&e));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        tracing::debug!(ino, fh, offset, len = data.len(), "write");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };

        match self.runtime.block_on(self.adapter.write(fh, offset, data)) {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                tracing::warn!(ino, fh, error = %e, "write failed");
                reply.error(errno(&e));
            }
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        tracing::debug!(ino, fh, "flush");

        match self.runtime.block_on(self.adapter.flush(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => {
                tracing::warn!(ino, fh, error = %e, "flush failed");
                reply.error(errno(&e));
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        tracing::debug!(ino, fh, "release");

        match self.adapter.release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::RemoteError;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(errno(&DriveError::NotFound("x".into())), libc::ENOENT);
        assert_eq!(errno(&DriveError::State("x".into())), libc::EBADF);
        assert_eq!(
            errno(&DriveError::Remote(RemoteError::Unauthenticated)),
            libc::EIO
        );
        assert_eq!(
            errno(&DriveError::FileTooLarge {
                requested: 1 << 62,
                limit: 1 << 32
            }),
            libc::EFBIG
        );
        assert_eq!(errno(&DriveError::OutOfMemory("x".into())), libc::ENOMEM);
    }

    #[test]
    fn test_file_attr_permissions() {
        let now = SystemTime::now();
        let dir = EntryAttr {
            ino: 7,
            kind: NodeKind::Directory,
            size: 0,
            mtime: now,
            ctime: now,
        };
        let file = EntryAttr {
            kind: NodeKind::File,
            size: 1025,
            ..dir.clone()
        };

        let dir_attr = file_attr(&dir, 1000, 1000);
        assert_eq!(dir_attr.kind, FileType::Directory);
        assert_eq!(dir_attr.perm, 0o755);

        let regular = file_attr(&file, 1000, 1000);
        assert_eq!(regular.kind, FileType::RegularFile);
        assert_eq!(regular.perm, 0o644);
        assert_eq!(regular.blocks, 3);
        assert_eq!(regular.uid, 1000);
    }
}
