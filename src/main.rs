// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use clap::Parser;
use rpc_server_car::db::ArchiveDb;
use rpc_server_car::rpc;
use std::net::{SocketAddr, ToSocketAddrs as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Start a Solana JSON RPC that exposes getTransaction and getBlock over
/// a CAR ledger archive.
#[derive(Debug, Parser)]
#[command(name = "rpc-server-car", version)]
struct Args {
    /// CAR archive holding the ledger data
    car_path: PathBuf,
    /// CID-to-offset index file
    cid_to_offset_index: PathBuf,
    /// Slot-to-CID index file
    slot_to_cid_index: PathBuf,
    /// Signature-to-CID index file
    sig_to_cid_index: PathBuf,
    /// Listen address; a bare `:port` binds all interfaces
    #[arg(long, default_value = ":8899")]
    listen: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let wants_exit_zero = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if wants_exit_zero {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let db = Arc::new(ArchiveDb::open(
        &args.car_path,
        &args.cid_to_offset_index,
        &args.slot_to_cid_index,
        &args.sig_to_cid_index,
    )?);
    let listen = parse_listen_addr(&args.listen)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(rpc::start_rpc(db, listen))
}

fn parse_listen_addr(listen: &str) -> anyhow::Result<SocketAddr> {
    let listen = if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else {
        listen.to_owned()
    };
    listen
        .to_socket_addrs()
        .with_context(|| format!("invalid listen address {listen}"))?
        .next()
        .with_context(|| format!("listen address {listen} resolves to nothing"))
}
