//! Filesystem adapter tests against an in-memory drive
//!
//! These exercise the inode and handle layer without mounting anything, so
//! they run without FUSE privileges.

use std::sync::Arc;

use common::{DriveError, MemoryRemote, NodeCache, NodeId, NodeKind, RemoteTree};
use drivefs_daemon::fuse::FsAdapter;

const ROOT_INO: u64 = 1;

struct Fixture {
    remote: Arc<MemoryRemote>,
    adapter: FsAdapter,
    a: NodeId,
    b: NodeId,
}

/// `/a/` and `/b.txt` ("abc")
async fn setup() -> Fixture {
    let remote = Arc::new(MemoryRemote::new());
    let root = remote.root_id();
    let a = remote.add_folder(&root, "a");
    let b = remote.add_file(&root, "b", "txt", "abc");

    let cache = Arc::new(NodeCache::new(remote.clone()));
    cache.get_root().await.unwrap();
    let adapter = FsAdapter::new(cache, root);

    Fixture {
        remote,
        adapter,
        a,
        b,
    }
}

#[tokio::test]
async fn test_readdir_lists_children_with_kinds() {
    let fx = setup().await;

    let mut entries = fx.adapter.readdir(ROOT_INO).await.unwrap();
    entries.sort_by(|x, y| x.name.cmp(&y.name));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "a");
    assert_eq!(entries[0].kind, NodeKind::Directory);
    assert_eq!(entries[1].name, "b.txt");
    assert_eq!(entries[1].kind, NodeKind::File);
    assert_ne!(entries[0].ino, entries[1].ino);
}

#[tokio::test]
async fn test_lookup_reports_size_and_stable_inode() {
    let fx = setup().await;

    let first = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();
    assert_eq!(first.size, 3);
    assert_eq!(first.kind, NodeKind::File);
    assert_eq!(first.ino, fx.b.stable_ino());

    let second = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();
    assert_eq!(first.ino, second.ino);
    assert_eq!(fx.adapter.inode_of(&fx.b), Some(first.ino));
}

#[tokio::test]
async fn test_lookup_missing_name_is_not_found() {
    let fx = setup().await;

    let err = fx.adapter.lookup(ROOT_INO, "nope.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_root_attributes() {
    let fx = setup().await;

    let attr = fx.adapter.getattr(ROOT_INO).await.unwrap();
    assert_eq!(attr.ino, ROOT_INO);
    assert_eq!(attr.kind, NodeKind::Directory);
}

#[tokio::test]
async fn test_setattr_leaves_file_unchanged() {
    let fx = setup().await;
    let attr = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();

    let after = fx.adapter.setattr(attr.ino).await.unwrap();
    assert_eq!(after, attr);
    assert_eq!(fx.remote.content(&fx.b).unwrap(), "abc");
}

#[tokio::test]
async fn test_write_and_flush_through_handle() {
    let fx = setup().await;
    let attr = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();

    let fh = fx.adapter.open(attr.ino).await.unwrap();
    assert_eq!(fx.adapter.read(fh, 0, 16).await.unwrap(), b"abc");

    let written = fx.adapter.write(fh, 3, b"def").await.unwrap();
    assert_eq!(written, 3);
    fx.adapter.flush(fh).await.unwrap();
    fx.adapter.release(fh).unwrap();

    assert_eq!(fx.remote.content(&fx.b).unwrap(), "abcdef");
    assert_eq!(fx.adapter.open_handles(), 0);

    // The file's attributes are current without relisting the parent
    assert_eq!(fx.adapter.getattr(attr.ino).await.unwrap().size, 6);

    // The parent was invalidated, so a fresh lookup sees the new size
    let refreshed = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();
    assert_eq!(refreshed.size, 6);
}

#[tokio::test]
async fn test_handles_are_independent() {
    let fx = setup().await;
    let attr = fx.adapter.lookup(ROOT_INO, "b.txt").await.unwrap();

    let first = fx.adapter.open(attr.ino).await.unwrap();
    let second = fx.adapter.open(attr.ino).await.unwrap();
    assert_ne!(first, second);

    fx.adapter.write(first, 0, b"x").await.unwrap();
    assert_eq!(fx.adapter.read(second, 0, 3).await.unwrap(), b"abc");
    assert_eq!(fx.adapter.open_handles(), 2);
}

#[tokio::test]
async fn test_open_directory_is_rejected() {
    let fx = setup().await;
    let attr = fx.adapter.lookup(ROOT_INO, "a").await.unwrap();

    let err = fx.adapter.open(attr.ino).await.unwrap_err();
    assert!(matches!(err, DriveError::State(_)));
}

#[tokio::test]
async fn test_unknown_inode_and_handle() {
    let fx = setup().await;

    let err = fx.adapter.getattr(9999).await.unwrap_err();
    assert!(matches!(err, DriveError::State(_)));

    let err = fx.adapter.release(42).unwrap_err();
    assert!(matches!(err, DriveError::State(_)));

    let err = fx.adapter.read(42, 0, 1).await.unwrap_err();
    assert!(matches!(err, DriveError::State(_)));
}

#[tokio::test]
async fn test_parent_inode_of_nested_folder() {
    let fx = setup().await;
    let deep = fx.remote.add_folder(&fx.a, "deep");
    let a = fx.adapter.lookup(ROOT_INO, "a").await.unwrap();

    let listing = fx.adapter.readdir(a.ino).await.unwrap();
    let deep_ino = listing.iter().find(|e| e.name == "deep").unwrap().ino;
    assert_eq!(deep_ino, deep.stable_ino());

    assert_eq!(fx.adapter.parent_inode(ROOT_INO).unwrap(), ROOT_INO);
    assert_eq!(fx.adapter.parent_inode(a.ino).unwrap(), ROOT_INO);
    assert_eq!(fx.adapter.parent_inode(deep_ino).unwrap(), a.ino);
}
