use super::*;
use crate::descriptor::{OperationKind, ProblemDescriptor};
use crate::error::ErrorKind;

fn key() -> CacheKey {
    CacheKey::derive(&ProblemDescriptor::new(OperationKind::Addition, 3, 4, 7))
}

fn store(root: &Path) -> CacheStore {
    CacheStore::new(root.join("cache"), "math_viz", "/manim-cache/")
}

#[test]
fn naming_follows_prefix_and_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let key = key();

    assert_eq!(store.file_name(&key), format!("math_viz_{key}.mp4"));
    assert_eq!(
        store.stable_path(&key),
        dir.path().join("cache").join(format!("math_viz_{key}.mp4"))
    );
    assert_eq!(
        store.public_url(&key),
        format!("/manim-cache/math_viz_{key}.mp4")
    );
}

#[test]
fn lookup_is_a_pure_existence_check() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let key = key();

    assert!(store.lookup(&key).is_none());
    assert!(!store.root().exists());

    store.ensure_root().unwrap();
    std::fs::write(store.stable_path(&key), b"").unwrap();
    assert_eq!(store.lookup(&key), Some(store.stable_path(&key)));
}

#[test]
fn publish_moves_source_and_creates_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let key = key();

    let source = dir.path().join("rendered.mp4");
    std::fs::write(&source, b"video-bytes").unwrap();

    let published = store.publish(&key, &source).unwrap();
    assert_eq!(published, store.stable_path(&key));
    assert!(!source.exists());
    assert_eq!(std::fs::read(&published).unwrap(), b"video-bytes");
}

#[test]
fn publish_replaces_existing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let key = key();
    store.ensure_root().unwrap();
    std::fs::write(store.stable_path(&key), b"old").unwrap();

    let source = dir.path().join("rendered.mp4");
    std::fs::write(&source, b"new").unwrap();
    store.publish(&key, &source).unwrap();

    assert_eq!(std::fs::read(store.stable_path(&key)).unwrap(), b"new");
}

#[test]
fn publish_of_missing_source_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let err = store
        .publish(&key(), &dir.path().join("nope.mp4"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(store.lookup(&key()).is_none());
}

#[test]
fn copy_fallback_publishes_and_leaves_no_staging_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let key = key();
    store.ensure_root().unwrap();

    let source = dir.path().join("rendered.mp4");
    std::fs::write(&source, vec![7u8; 4096]).unwrap();

    let dest = store.stable_path(&key);
    store.publish_by_copy(&key, &source, &dest).unwrap();

    assert!(!source.exists());
    assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
    let leftovers: Vec<_> = std::fs::read_dir(store.root())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}
