// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: File-backed storage implementation for the NVRAM daemon.
// Author: Lukas Bower

//! File-per-object storage under a data directory.
//!
//! The header lives in `header.nv`, each space in `space-<index>.nv`. Writes
//! go to a temp file, are synced, and land via atomic rename so a crash never
//! leaves a half-written object behind.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::error;
use nvram_core::persistence::{Storage, StorageError};

/// Blob store backed by one file per persistent object.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open (and create if needed) the data directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn header_path(&self) -> PathBuf {
        self.root.join("header.nv")
    }

    fn space_path(&self, index: u32) -> PathBuf {
        self.root.join(format!("space-{index:08x}.nv"))
    }

    fn read_object(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        match fs::read(path) {
            Ok(blob) => Ok(blob),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => {
                error!("[nvramd] failed to read {}: {err}", path.display());
                Err(StorageError::Backend)
            }
        }
    }

    fn write_object(&self, path: &Path, blob: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension("tmp");
        let written = (|| -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(blob)?;
            file.sync_all()?;
            fs::rename(&tmp, path)?;
            if let Ok(dir) = File::open(&self.root) {
                let _ = dir.sync_all();
            }
            Ok(())
        })();
        written.map_err(|err| {
            error!("[nvramd] failed to write {}: {err}", path.display());
            let _ = fs::remove_file(&tmp);
            StorageError::Backend
        })
    }

    fn delete_object(&self, path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => {
                error!("[nvramd] failed to delete {}: {err}", path.display());
                Err(StorageError::Backend)
            }
        }
    }
}

impl Storage for FsStorage {
    fn load_header(&mut self) -> Result<Vec<u8>, StorageError> {
        self.read_object(&self.header_path())
    }

    fn store_header(&mut self, blob: &[u8]) -> Result<(), StorageError> {
        self.write_object(&self.header_path(), blob)
    }

    fn load_space(&mut self, index: u32) -> Result<Vec<u8>, StorageError> {
        self.read_object(&self.space_path(index))
    }

    fn store_space(&mut self, index: u32, blob: &[u8]) -> Result<(), StorageError> {
        self.write_object(&self.space_path(index), blob)
    }

    fn delete_space(&mut self, index: u32) -> Result<(), StorageError> {
        self.delete_object(&self.space_path(index))
    }
}
