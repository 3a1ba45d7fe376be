// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Filesystem storage tests for the NVRAM daemon.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use nvram_core::persistence::{Storage, StorageError};
use nvram_core::{NvError, NvramManager};
use nvram_wire::Response;
use nvramd::storage::FsStorage;
use tempfile::tempdir;

#[test]
fn header_and_space_round_trip() {
    let dir = tempdir().expect("tempdir");
    let mut storage = FsStorage::open(dir.path()).expect("open storage");

    assert_eq!(storage.load_header(), Err(StorageError::NotFound));
    storage.store_header(b"header blob").expect("store header");
    assert_eq!(storage.load_header().expect("load header"), b"header blob");

    assert_eq!(storage.load_space(7), Err(StorageError::NotFound));
    storage.store_space(7, b"space blob").expect("store space");
    assert_eq!(storage.load_space(7).expect("load space"), b"space blob");

    storage.delete_space(7).expect("delete space");
    assert_eq!(storage.load_space(7), Err(StorageError::NotFound));
    assert_eq!(storage.delete_space(7), Err(StorageError::NotFound));
}

#[test]
fn writes_leave_no_temp_files() {
    let dir = tempdir().expect("tempdir");
    let mut storage = FsStorage::open(dir.path()).expect("open storage");
    storage.store_header(b"h").expect("store header");
    storage.store_space(1, b"s").expect("store space");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn spaces_survive_a_daemon_restart() {
    let dir = tempdir().expect("tempdir");

    {
        let storage = FsStorage::open(dir.path()).expect("open storage");
        let mut manager = NvramManager::new(storage);
        manager.create_space(1, 16, &[], &[]).expect("create space");
        manager
            .write_space(1, b"persisted", &[])
            .expect("write space");
    }

    let storage = FsStorage::open(dir.path()).expect("reopen storage");
    let mut manager = NvramManager::new(storage);
    match manager.read_space(1, &[]).expect("read space") {
        Response::ReadSpace { buffer } => {
            assert_eq!(&buffer[..9], b"persisted");
            assert_eq!(buffer.len(), 16);
        }
        other => panic!("unexpected response {other:?}"),
    }
    assert_eq!(manager.get_space_info(2), Err(NvError::SpaceDoesNotExist));
}
