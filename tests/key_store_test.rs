//! Integration tests for the file-backed server key cache.

use std::fs;

use pushsync::{FileKeyStore, KeyStore};
use tempfile::TempDir;

#[test]
fn missing_file_is_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = FileKeyStore::open(dir.path().join("server_keys.json")).unwrap();
    assert!(store.find("client").is_none());
}

#[test]
fn saved_keys_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("server_keys.json");

    let store = FileKeyStore::open(&path).unwrap();
    store.save("client-a", "key-1").unwrap();
    store.save("client-b", "key-2").unwrap();
    store.save("client-a", "key-3").unwrap();

    let reopened = FileKeyStore::open(&path).unwrap();
    assert_eq!(reopened.find("client-a").as_deref(), Some("key-3"));
    assert_eq!(reopened.find("client-b").as_deref(), Some("key-2"));
}

#[cfg(unix)]
#[test]
fn file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = FileKeyStore::open(dir.path().join("server_keys.json")).unwrap();
    store.save("client", "key").unwrap();

    let mode = fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn corrupted_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("server_keys.json");
    fs::write(&path, "not json").unwrap();

    let err = FileKeyStore::open(&path).unwrap_err();
    assert!(format!("{err:#}").contains("corrupted"));
}
