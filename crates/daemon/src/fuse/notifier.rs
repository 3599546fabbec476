use std::ffi::OsStr;
use std::io;
use std::sync::Arc;

use common::{EntryNotifier, NodeId};

use super::adapter::FsAdapter;

/// Forwards entry invalidations to the kernel for one mount
pub struct KernelNotifier {
    notifier: fuser::Notifier,
    adapter: Arc<FsAdapter>,
}

impl KernelNotifier {
    pub fn new(notifier: fuser::Notifier, adapter: Arc<FsAdapter>) -> Self {
        Self { notifier, adapter }
    }
}

impl EntryNotifier for KernelNotifier {
    fn invalidate_entry(&self, parent: &NodeId, name: &str) -> io::Result<()> {
        // The kernel cannot hold an entry under a parent it was never shown
        let Some(parent_ino) = self.adapter.inode_of(parent) else {
            return Ok(());
        };
        match self.notifier.inval_entry(parent_ino, OsStr::new(name)) {
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => Ok(()),
            result => result,
        }
    }
}
