// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI entry point for the NVRAM service daemon.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! CLI entry point for the NVRAM service daemon.

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use nvram_core::NvramManager;

use nvramd::server;
use nvramd::storage::FsStorage;

/// NVRAM daemon command-line arguments.
#[derive(Debug, Parser)]
#[command(author = "Lukas Bower", version, about = "Access-controlled NVRAM service daemon", long_about = None)]
struct Cli {
    /// Directory holding the persistent NVRAM objects.
    #[arg(long, default_value = "nvram-data")]
    data_dir: PathBuf,

    /// Address to listen on for framed requests.
    #[arg(long, default_value = "127.0.0.1:5640")]
    listen: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let storage = FsStorage::open(&cli.data_dir)
        .with_context(|| format!("failed to open data directory {:?}", cli.data_dir))?;
    let mut manager = NvramManager::new(storage);

    let listener = TcpListener::bind(&cli.listen)
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(
        "[nvramd] serving {} from {}",
        cli.listen,
        cli.data_dir.display()
    );
    server::run(&mut manager, &listener)?;
    Ok(())
}
