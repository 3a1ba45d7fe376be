// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: In-memory storage double with per-slot error injection for tests.
// Author: Lukas Bower

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use nvram_core::persistence::{Storage, StorageError};

#[derive(Debug, Default)]
struct Slot {
    blob: Option<Vec<u8>>,
    fail: bool,
}

impl Slot {
    fn load(&self) -> Result<Vec<u8>, StorageError> {
        if self.fail {
            return Err(StorageError::Backend);
        }
        self.blob.clone().ok_or(StorageError::NotFound)
    }

    fn store(&mut self, blob: &[u8]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Backend);
        }
        self.blob = Some(blob.to_vec());
        Ok(())
    }

    fn delete(&mut self) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Backend);
        }
        if self.blob.take().is_none() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    header: Slot,
    spaces: BTreeMap<u32, Slot>,
}

/// Shared in-memory blob store. Clones refer to the same storage, so a test
/// can keep a handle for error injection and "reboot" by building a fresh
/// manager over another clone.
#[derive(Debug, Clone, Default)]
pub struct FakeStorage {
    inner: Arc<Mutex<Inner>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header_error(&self, fail: bool) {
        self.inner.lock().unwrap().header.fail = fail;
    }

    pub fn set_space_error(&self, index: u32, fail: bool) {
        self.inner
            .lock()
            .unwrap()
            .spaces
            .entry(index)
            .or_default()
            .fail = fail;
    }

    pub fn header_raw(&self) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().header.blob.clone()
    }

    pub fn put_header_raw(&self, blob: Vec<u8>) {
        self.inner.lock().unwrap().header.blob = Some(blob);
    }

    pub fn space_raw(&self, index: u32) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .spaces
            .get(&index)
            .and_then(|slot| slot.blob.clone())
    }

    pub fn put_space_raw(&self, index: u32, blob: Vec<u8>) {
        self.inner
            .lock()
            .unwrap()
            .spaces
            .entry(index)
            .or_default()
            .blob = Some(blob);
    }

    pub fn space_present(&self, index: u32) -> bool {
        self.space_raw(index).is_some()
    }
}

impl Storage for FakeStorage {
    fn load_header(&mut self) -> Result<Vec<u8>, StorageError> {
        self.inner.lock().unwrap().header.load()
    }

    fn store_header(&mut self, blob: &[u8]) -> Result<(), StorageError> {
        self.inner.lock().unwrap().header.store(blob)
    }

    fn load_space(&mut self, index: u32) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock().unwrap();
        match inner.spaces.get(&index) {
            Some(slot) => slot.load(),
            None => Err(StorageError::NotFound),
        }
    }

    fn store_space(&mut self, index: u32, blob: &[u8]) -> Result<(), StorageError> {
        self.inner
            .lock()
            .unwrap()
            .spaces
            .entry(index)
            .or_default()
            .store(blob)
    }

    fn delete_space(&mut self, index: u32) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.spaces.get_mut(&index) {
            Some(slot) => slot.delete(),
            None => Err(StorageError::NotFound),
        }
    }
}
