// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Crash-consistency and recovery tests for the NVRAM manager.
// Author: Lukas Bower
#![forbid(unsafe_code)]

mod common;

use common::FakeStorage;
use nvram_core::persistence::{self, NvramHeader, NvramSpace};
use nvram_core::{NvError, NvramManager, MAX_SPACES};
use nvram_wire::Response;

fn manager(storage: &FakeStorage) -> NvramManager<FakeStorage> {
    NvramManager::new(storage.clone())
}

fn space_list(manager: &mut NvramManager<FakeStorage>) -> Vec<u32> {
    match manager.get_info().expect("get info") {
        Response::GetInfo { space_list, .. } => space_list,
        other => panic!("unexpected response {other:?}"),
    }
}

fn store_header_record(storage: &FakeStorage, header: &NvramHeader) {
    let mut handle = storage.clone();
    persistence::store_header(&mut handle, header).expect("store header record");
}

fn store_space_record(storage: &FakeStorage, index: u32, size: usize) {
    let mut handle = storage.clone();
    let space = NvramSpace {
        contents: vec![0u8; size],
        ..NvramSpace::default()
    };
    persistence::store_space(&mut handle, index, &space).expect("store space record");
}

fn header_record(allocated: &[u32], provisional: Option<u32>) -> NvramHeader {
    NvramHeader {
        version: NvramHeader::VERSION,
        flags: 0,
        allocated_indices: allocated.to_vec(),
        provisional_index: provisional,
    }
}

fn stored_header(storage: &FakeStorage) -> NvramHeader {
    let blob = storage.header_raw().expect("header blob");
    NvramHeader::decode(&blob).expect("decode header")
}

#[test]
fn half_deleted_provisional_space_is_destroyed() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_space_record(&storage, 2, 10);
    store_space_record(&storage, 4, 10);
    store_header_record(&storage, &header_record(&[1, 2, 3], Some(4)));

    let mut nvram = manager(&storage);
    assert_eq!(space_list(&mut nvram), [1, 2, 3]);
    assert!(!storage.space_present(4));
    assert_eq!(nvram.get_space_info(3), Err(NvError::Internal));
    assert_eq!(nvram.get_space_info(4), Err(NvError::SpaceDoesNotExist));
}

#[test]
fn committed_provisional_space_is_retained() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_space_record(&storage, 2, 20);
    store_header_record(&storage, &header_record(&[1, 2], Some(2)));

    let mut nvram = manager(&storage);
    assert_eq!(space_list(&mut nvram), [1, 2]);
    assert!(storage.space_present(2));
    // The provisional marker is cleared opportunistically.
    assert_eq!(stored_header(&storage).provisional_index, None);
}

#[test]
fn interrupted_create_leaves_no_trace() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_header_record(&storage, &header_record(&[1, 5], Some(5)));

    let mut nvram = manager(&storage);
    assert_eq!(space_list(&mut nvram), [1]);
    assert_eq!(nvram.get_space_info(5), Err(NvError::SpaceDoesNotExist));
    let header = stored_header(&storage);
    assert_eq!(header.allocated_indices, [1]);
    assert_eq!(header.provisional_index, None);
}

#[test]
fn interrupted_delete_completes_on_reboot() {
    // Crash point: intent header written and blob deleted, final header
    // write never happened.
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_header_record(&storage, &header_record(&[1, 3], Some(3)));

    let mut nvram = manager(&storage);
    assert_eq!(space_list(&mut nvram), [1]);
    assert_eq!(nvram.get_space_info(3), Err(NvError::SpaceDoesNotExist));
}

#[test]
fn provisional_probe_error_keeps_space_allocated() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_header_record(&storage, &header_record(&[1], Some(1)));
    storage.set_space_error(1, true);

    let mut nvram = manager(&storage);
    // Initialization completes and the index stays allocated; requests
    // against the unreadable space fail loudly instead.
    assert_eq!(space_list(&mut nvram), [1]);
    assert_eq!(nvram.get_space_info(1), Err(NvError::Internal));

    storage.set_space_error(1, false);
    assert!(matches!(
        nvram.get_space_info(1),
        Ok(Response::GetSpaceInfo { size: 10, .. })
    ));
}

#[test]
fn excess_allocated_indices_fail_initialization() {
    let storage = FakeStorage::new();
    let indices: Vec<u32> = (0..(MAX_SPACES as u32 + 1)).collect();
    for &index in &indices {
        store_space_record(&storage, index, 1);
    }
    store_header_record(&storage, &header_record(&indices, None));

    let mut nvram = manager(&storage);
    assert_eq!(nvram.get_info(), Err(NvError::Internal));
}

#[test]
fn failed_provisional_cleanup_is_tolerated() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_header_record(&storage, &header_record(&[1], Some(1)));
    storage.set_header_error(true);

    // The opportunistic header rewrite fails, initialization still succeeds.
    let mut nvram = manager(&storage);
    assert_eq!(space_list(&mut nvram), [1]);
    assert_eq!(stored_header(&storage).provisional_index, Some(1));

    storage.set_header_error(false);
    nvram.create_space(2, 8, &[], &[]).expect("create space");
    assert_eq!(stored_header(&storage).provisional_index, Some(2));
    assert_eq!(stored_header(&storage).allocated_indices, [1, 2]);
}

#[test]
fn failed_initialization_is_retried() {
    let storage = FakeStorage::new();
    store_space_record(&storage, 1, 10);
    store_header_record(&storage, &header_record(&[1], None));
    storage.set_header_error(true);

    let mut nvram = manager(&storage);
    assert_eq!(nvram.get_info(), Err(NvError::Internal));

    storage.set_header_error(false);
    assert_eq!(space_list(&mut nvram), [1]);
}

#[test]
fn delete_intent_write_failure_leaves_space_intact() {
    let storage = FakeStorage::new();
    let mut nvram = manager(&storage);
    nvram.create_space(1, 16, &[], &[]).expect("create space");

    storage.set_header_error(true);
    assert_eq!(nvram.delete_space(1, &[]), Err(NvError::Internal));
    storage.set_header_error(false);

    assert_eq!(space_list(&mut nvram), [1]);
    assert!(storage.space_present(1));
    let mut rebooted = manager(&storage);
    assert_eq!(space_list(&mut rebooted), [1]);
}

#[test]
fn header_and_stored_indices_stay_in_sync() {
    let storage = FakeStorage::new();
    let mut nvram = manager(&storage);
    nvram.create_space(1, 8, &[], &[]).expect("create space");
    nvram.create_space(2, 8, &[], &[]).expect("create space");
    nvram.create_space(3, 8, &[], &[]).expect("create space");
    nvram.delete_space(2, &[]).expect("delete space");

    let header = stored_header(&storage);
    assert_eq!(header.allocated_indices, space_list(&mut nvram));
    assert_eq!(header.allocated_indices, [1, 3]);
    for &index in &header.allocated_indices {
        assert!(storage.space_present(index));
    }
}
