//! Integration tests for the volume records table

use tempfile::TempDir;

use drivefs_daemon::Database;

/// Create a test database
async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("volumes.db");

    let db_url = format!("sqlite://{}", db_path.display());
    let db = Database::connect(&url::Url::parse(&db_url).unwrap())
        .await
        .unwrap();

    (db, temp_dir)
}

#[tokio::test]
async fn test_create_and_get_volume() {
    let (db, _temp_dir) = setup_test_db().await;

    let volume = db
        .create_volume("docs", "/Documents", "/mnt/volumes/docs")
        .await
        .unwrap();

    assert_eq!(volume.name, "docs");
    assert_eq!(volume.remote_path, "/Documents");
    assert_eq!(volume.mount_point, "/mnt/volumes/docs");

    let retrieved = db.get_volume("docs").await.unwrap().unwrap();
    assert_eq!(retrieved.name, volume.name);
    assert_eq!(retrieved.remote_path, volume.remote_path);
}

#[tokio::test]
async fn test_get_missing_volume() {
    let (db, _temp_dir) = setup_test_db().await;

    assert!(db.get_volume("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_existing_volume_rebinds_path() {
    let (db, _temp_dir) = setup_test_db().await;

    db.create_volume("docs", "/Documents", "/mnt/volumes/docs")
        .await
        .unwrap();
    let updated = db
        .create_volume("docs", "/Documents/project", "/mnt/volumes/docs")
        .await
        .unwrap();

    assert_eq!(updated.remote_path, "/Documents/project");
    assert_eq!(db.list_volumes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_volumes() {
    let (db, _temp_dir) = setup_test_db().await;

    for i in 0..3 {
        db.create_volume(
            &format!("vol{}", i),
            &format!("/folder{}", i),
            &format!("/mnt/volumes/vol{}", i),
        )
        .await
        .unwrap();
    }

    let volumes = db.list_volumes().await.unwrap();
    assert_eq!(volumes.len(), 3);
    let mut names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["vol0", "vol1", "vol2"]);
}

#[tokio::test]
async fn test_delete_volume() {
    let (db, _temp_dir) = setup_test_db().await;

    db.create_volume("docs", "/Documents", "/mnt/volumes/docs")
        .await
        .unwrap();

    assert!(db.delete_volume("docs").await.unwrap());
    assert!(db.get_volume("docs").await.unwrap().is_none());
    // Second delete finds nothing
    assert!(!db.delete_volume("docs").await.unwrap());
}
