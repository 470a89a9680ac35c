use std::sync::Arc;

use tempfile::TempDir;

use dfs_lib::{DfsError, Path};
use dfs_naming::NamingServer;
use dfs_proto::{Command, RegistrationClient, Service, ServiceClient, Storage};

use crate::StorageServer;

fn path(s: &str) -> Path {
    Path::new(s).unwrap()
}

async fn naming_fixture() -> (Arc<NamingServer>, RegistrationClient, ServiceClient) {
    let naming = NamingServer::new(0, 0);
    naming.start().await.unwrap();
    let reg = naming.registration_addr().await.unwrap();
    let svc = naming.service_addr().await.unwrap();
    let registration = RegistrationClient::from_addr(&reg.ip().to_string(), reg.port()).unwrap();
    let service = ServiceClient::from_addr(&svc.ip().to_string(), svc.port()).unwrap();
    (naming, registration, service)
}

// ==================== local adapter ====================

#[tokio::test]
async fn create_write_read_size() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();

    assert!(server.create(&path("/w.txt")).await.unwrap());
    assert!(!server.create(&path("/w.txt")).await.unwrap());
    assert!(!server.create(&Path::root()).await.unwrap());
    assert_eq!(server.size(&path("/w.txt")).await.unwrap(), 0);

    // writes at disjoint offsets do not erase each other
    server.write(&path("/w.txt"), 2, b"bc".to_vec()).await.unwrap();
    server.write(&path("/w.txt"), 0, b"a".to_vec()).await.unwrap();
    assert_eq!(server.read(&path("/w.txt"), 0, 3).await.unwrap(), b"abc");
    assert_eq!(server.size(&path("/w.txt")).await.unwrap(), 3);

    // writing past the end extends the file
    server.write(&path("/w.txt"), 3, b"de".to_vec()).await.unwrap();
    assert_eq!(server.read(&path("/w.txt"), 0, 5).await.unwrap(), b"abcde");

    // a read returns exactly the requested number of bytes
    assert_eq!(server.read(&path("/w.txt"), 1, 2).await.unwrap(), b"bc");
    assert_eq!(server.read(&path("/w.txt"), 5, 0).await.unwrap(), b"");
}

#[tokio::test]
async fn write_gap_is_zero_filled() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();

    server.create(&path("/g.txt")).await.unwrap();
    server.write(&path("/g.txt"), 2, b"z".to_vec()).await.unwrap();
    assert_eq!(server.size(&path("/g.txt")).await.unwrap(), 3);
    assert_eq!(server.read(&path("/g.txt"), 0, 3).await.unwrap(), vec![0, 0, b'z']);
}

#[tokio::test]
async fn read_and_write_bounds() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.create(&path("/b.txt")).await.unwrap();
    server.write(&path("/b.txt"), 0, b"abc".to_vec()).await.unwrap();

    for (offset, length) in [(-1, 1), (0, -1), (0, 4), (2, 2), (i64::MAX, 1)] {
        let err = server.read(&path("/b.txt"), offset, length).await.unwrap_err();
        assert!(err.is_out_of_bounds(), "read({}, {}): {:?}", offset, length, err);
    }

    let err = server.write(&path("/b.txt"), -1, b"x".to_vec()).await.unwrap_err();
    assert!(err.is_out_of_bounds());
}

#[tokio::test]
async fn missing_files_and_directories_are_not_found() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.create(&path("/d/x.txt")).await.unwrap();

    for target in ["/nope.txt", "/d"] {
        assert!(server.size(&path(target)).await.unwrap_err().is_not_found());
        assert!(server.read(&path(target), 0, 0).await.unwrap_err().is_not_found());
        assert!(server
            .write(&path(target), 0, b"x".to_vec())
            .await
            .unwrap_err()
            .is_not_found());
    }
}

#[tokio::test]
async fn write_rejects_read_only_files() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.create(&path("/ro.txt")).await.unwrap();

    let local = tmp.path().join("ro.txt");
    let mut perms = std::fs::metadata(&local).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&local, perms).unwrap();

    let err = server.write(&path("/ro.txt"), 0, b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, DfsError::Io(_)));
}

#[tokio::test]
async fn create_builds_ancestors_and_delete_prunes_them() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();

    assert!(server.create(&path("/d/e/f.txt")).await.unwrap());
    assert!(tmp.path().join("d/e/f.txt").is_file());

    assert!(server.delete(&path("/d/e/f.txt")).await.unwrap());
    // no directory strictly between the file's parent and the root survives
    // empty
    assert!(!tmp.path().join("d").exists());
    assert!(tmp.path().exists());

    assert!(!server.delete(&path("/d/e/f.txt")).await.unwrap());
    assert!(!server.delete(&Path::root()).await.unwrap());
}

#[tokio::test]
async fn delete_removes_whole_subtrees() {
    let tmp = TempDir::new().unwrap();
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.create(&path("/d/e/f.txt")).await.unwrap();
    server.create(&path("/d/e/g.txt")).await.unwrap();
    server.create(&path("/keep.txt")).await.unwrap();

    assert!(server.delete(&path("/d")).await.unwrap());
    assert!(!tmp.path().join("d").exists());
    assert!(tmp.path().join("keep.txt").is_file());
}

#[tokio::test]
async fn start_requires_an_existing_directory_root() {
    let tmp = TempDir::new().unwrap();
    // never connected to: start fails before any network activity
    let naming = RegistrationClient::from_addr("127.0.0.1", 1).unwrap();

    let missing = tmp.path().join("missing");
    let server = StorageServer::new(&missing, None, None).unwrap();
    assert!(server
        .start("127.0.0.1", &naming)
        .await
        .unwrap_err()
        .is_not_found());

    let file = tmp.path().join("actually-a-file");
    std::fs::write(&file, b"x").unwrap();
    let server = StorageServer::new(&file, None, None).unwrap();
    assert!(server
        .start("127.0.0.1", &naming)
        .await
        .unwrap_err()
        .is_not_found());
}

// ==================== end to end ====================

#[tokio::test]
async fn single_file_round_trip() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("hello.txt"), b"abc").unwrap();

    let (naming, registration, service) = naming_fixture().await;
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.start("127.0.0.1", &registration).await.unwrap();

    assert_eq!(service.list(&Path::root()).await.unwrap(), vec!["hello.txt"]);

    let stub = service.get_storage(&path("/hello.txt")).await.unwrap();
    assert_eq!(stub.size(&path("/hello.txt")).await.unwrap(), 3);
    assert_eq!(stub.read(&path("/hello.txt"), 0, 3).await.unwrap(), b"abc");

    server.stop().await;
    naming.stop().await;
}

#[tokio::test]
async fn duplicate_registration_is_deleted_and_pruned() {
    let tmp_a = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp_a.path().join("a")).unwrap();
    std::fs::write(tmp_a.path().join("a/b.txt"), b"first").unwrap();

    let tmp_b = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp_b.path().join("a")).unwrap();
    std::fs::write(tmp_b.path().join("a/b.txt"), b"second").unwrap();
    std::fs::write(tmp_b.path().join("c.txt"), b"c").unwrap();

    let (naming, registration, service) = naming_fixture().await;
    let server_a = StorageServer::new(tmp_a.path(), None, None).unwrap();
    server_a.start("127.0.0.1", &registration).await.unwrap();
    let server_b = StorageServer::new(tmp_b.path(), None, None).unwrap();
    server_b.start("127.0.0.1", &registration).await.unwrap();

    // B lost the contested path and pruned the now-empty directory
    assert!(!tmp_b.path().join("a").exists());
    assert!(tmp_b.path().join("c.txt").is_file());
    assert!(tmp_a.path().join("a/b.txt").is_file());

    // the naming server still hands out A's stub for the contested path
    let stub = service.get_storage(&path("/a/b.txt")).await.unwrap();
    assert_eq!(
        stub.target().port,
        server_a.storage_addr().await.unwrap().port()
    );
    assert_eq!(stub.read(&path("/a/b.txt"), 0, 5).await.unwrap(), b"first");

    let stub = service.get_storage(&path("/c.txt")).await.unwrap();
    assert_eq!(
        stub.target().port,
        server_b.storage_addr().await.unwrap().port()
    );

    server_a.stop().await;
    server_b.stop().await;
    naming.stop().await;
}

#[tokio::test]
async fn create_through_naming_reaches_the_storage_server() {
    let tmp = TempDir::new().unwrap();
    let (naming, registration, service) = naming_fixture().await;
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.start("127.0.0.1", &registration).await.unwrap();

    assert!(service.create_directory(&path("/x")).await.unwrap());
    assert!(service.create_file(&path("/x/y.txt")).await.unwrap());

    // the storage server materialized the empty file under its root
    assert!(tmp.path().join("x/y.txt").is_file());
    assert!(service.is_directory(&path("/x")).await.unwrap());

    let stub = service.get_storage(&path("/x/y.txt")).await.unwrap();
    assert_eq!(stub.size(&path("/x/y.txt")).await.unwrap(), 0);

    server.stop().await;
    naming.stop().await;
}

#[tokio::test]
async fn naming_delete_cascades_to_storage() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("d/e")).unwrap();
    std::fs::write(tmp.path().join("d/e/f.txt"), b"f").unwrap();
    std::fs::write(tmp.path().join("d/e/g.txt"), b"g").unwrap();

    let (naming, registration, service) = naming_fixture().await;
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.start("127.0.0.1", &registration).await.unwrap();

    assert!(service.delete(&path("/d")).await.unwrap());
    assert!(!tmp.path().join("d").exists());
    assert!(service
        .is_directory(&path("/d"))
        .await
        .unwrap_err()
        .is_not_found());

    server.stop().await;
    naming.stop().await;
}

#[tokio::test]
async fn naming_delete_commands_each_owning_server() {
    let tmp_a = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp_a.path().join("d/e")).unwrap();
    std::fs::write(tmp_a.path().join("d/e/f.txt"), b"f").unwrap();

    let tmp_b = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp_b.path().join("d/e")).unwrap();
    std::fs::write(tmp_b.path().join("d/e/g.txt"), b"g").unwrap();

    let (naming, registration, service) = naming_fixture().await;
    let server_a = StorageServer::new(tmp_a.path(), None, None).unwrap();
    server_a.start("127.0.0.1", &registration).await.unwrap();
    let server_b = StorageServer::new(tmp_b.path(), None, None).unwrap();
    server_b.start("127.0.0.1", &registration).await.unwrap();

    assert!(service.delete(&path("/d")).await.unwrap());

    // the delete reached both owners: a delete routed through one stub
    // would have left the other server's file on disk
    assert!(!tmp_a.path().join("d").exists());
    assert!(!tmp_b.path().join("d").exists());
    assert!(service
        .is_directory(&path("/d"))
        .await
        .unwrap_err()
        .is_not_found());

    server_a.stop().await;
    server_b.stop().await;
    naming.stop().await;
}

#[tokio::test]
async fn write_then_read_through_stubs() {
    let tmp = TempDir::new().unwrap();
    let (naming, registration, service) = naming_fixture().await;
    let server = StorageServer::new(tmp.path(), None, None).unwrap();
    server.start("127.0.0.1", &registration).await.unwrap();

    assert!(service.create_file(&path("/w.txt")).await.unwrap());
    let stub = service.get_storage(&path("/w.txt")).await.unwrap();

    stub.write(&path("/w.txt"), 2, b"bc".to_vec()).await.unwrap();
    stub.write(&path("/w.txt"), 0, b"a".to_vec()).await.unwrap();
    assert_eq!(stub.read(&path("/w.txt"), 0, 3).await.unwrap(), b"abc");

    // errors cross the wire as the same kind the server raised
    let err = stub.read(&path("/w.txt"), 0, 10).await.unwrap_err();
    assert!(err.is_out_of_bounds());

    server.stop().await;
    naming.stop().await;
}
