use crate::{DfsError, Path};

use tempfile::TempDir;

#[test]
fn parse_and_render() {
    let p = Path::new("/a/b/c.txt").unwrap();
    assert_eq!(p.to_string(), "/a/b/c.txt");
    assert_eq!(
        p.components().collect::<Vec<_>>(),
        vec!["a", "b", "c.txt"]
    );

    // empty components between slashes are dropped
    let q = Path::new("//a///b/").unwrap();
    assert_eq!(q.to_string(), "/a/b");

    assert_eq!(Path::new("/").unwrap(), Path::root());
    assert_eq!(Path::root().to_string(), "/");
}

#[test]
fn parse_rejects_bad_input() {
    assert!(matches!(Path::new(""), Err(DfsError::InvalidParam(_))));
    assert!(matches!(Path::new("a/b"), Err(DfsError::InvalidParam(_))));
    assert!(matches!(Path::new("/a:b"), Err(DfsError::InvalidParam(_))));
}

#[test]
fn round_trip() {
    for s in ["/", "/a", "/a/b", "/hello.txt", "/a/b/c/d/e"] {
        let p = Path::new(s).unwrap();
        assert_eq!(Path::new(&p.to_string()).unwrap(), p);
    }
}

#[test]
fn child_parent_last() {
    let p = Path::new("/a/b").unwrap();
    let c = p.child("c.txt").unwrap();
    assert_eq!(c.to_string(), "/a/b/c.txt");
    assert_eq!(c.parent().unwrap(), p);
    assert_eq!(c.last().unwrap(), "c.txt");

    assert!(p.child("").is_err());
    assert!(p.child("x/y").is_err());
    assert!(p.child("x:y").is_err());

    assert!(Path::root().parent().is_err());
    assert!(Path::root().last().is_err());

    assert_eq!(Path::new("/a").unwrap().parent().unwrap(), Path::root());
}

#[test]
fn subpath_is_component_prefix() {
    let a = Path::new("/a").unwrap();
    let ab = Path::new("/a/b").unwrap();
    let ab_file = Path::new("/ab").unwrap();

    assert!(ab.is_subpath(&a));
    assert!(ab.is_subpath(&ab));
    assert!(ab.is_subpath(&Path::root()));
    assert!(!a.is_subpath(&ab));

    // string-prefix would claim /ab starts with /a; component-prefix does not
    assert!(!ab_file.is_subpath(&a));
}

#[test]
fn to_file_joins_under_root() {
    let p = Path::new("/a/b/c.txt").unwrap();
    let root = std::path::Path::new("/tmp/store");
    assert_eq!(p.to_file(root), std::path::PathBuf::from("/tmp/store/a/b/c.txt"));
    assert_eq!(Path::root().to_file(root), std::path::PathBuf::from("/tmp/store"));
}

#[test]
fn serde_uses_string_form() {
    let p = Path::new("/a/b").unwrap();
    let json = serde_json::to_string(&p).unwrap();
    assert_eq!(json, "\"/a/b\"");
    let back: Path = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);

    assert!(serde_json::from_str::<Path>("\"a/b\"").is_err());
}

#[tokio::test]
async fn list_enumerates_files_only() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    tokio::fs::create_dir_all(root.join("d1/d2")).await.unwrap();
    tokio::fs::create_dir_all(root.join("empty")).await.unwrap();
    tokio::fs::write(root.join("top.txt"), b"x").await.unwrap();
    tokio::fs::write(root.join("d1/a.txt"), b"y").await.unwrap();
    tokio::fs::write(root.join("d1/d2/b.txt"), b"z").await.unwrap();

    let mut listed = Path::list(root).await.unwrap();
    listed.sort();
    let mut expected = vec![
        Path::new("/top.txt").unwrap(),
        Path::new("/d1/a.txt").unwrap(),
        Path::new("/d1/d2/b.txt").unwrap(),
    ];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn list_rejects_missing_and_non_directory() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    assert!(matches!(
        Path::list(&missing).await,
        Err(DfsError::NotFound(_))
    ));

    let file = tmp.path().join("f.txt");
    tokio::fs::write(&file, b"x").await.unwrap();
    assert!(matches!(
        Path::list(&file).await,
        Err(DfsError::InvalidParam(_))
    ));
}
