// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! JSON-RPC surface: a single POST endpoint with two methods.
//!
//! jsonrpsee owns the transport-level error codes (`-32700` parse error,
//! `-32601` method not found, `-32602` invalid params from the
//! registered handlers); internal failures always surface as a bare
//! `-32603 "Internal error"`.

pub(crate) mod error;
pub mod methods;
pub mod response;

use crate::db::ArchiveDb;
use jsonrpsee::server::{RpcModule, Server, ServerHandle};
use positioned_io::ReadAt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub struct RpcState<R> {
    pub db: Arc<ArchiveDb<R>>,
}

pub fn build_module<R>(db: Arc<ArchiveDb<R>>) -> anyhow::Result<RpcModule<RpcState<R>>>
where
    R: ReadAt + Send + Sync + 'static,
{
    let mut module = RpcModule::new(RpcState { db });
    module.register_async_method("getBlock", methods::block::get_block::<R>)?;
    module.register_async_method("getTransaction", methods::transaction::get_transaction::<R>)?;
    Ok(module)
}

/// Bind and start serving. Returns once the socket is listening.
pub async fn serve<R>(
    db: Arc<ArchiveDb<R>>,
    listen: SocketAddr,
) -> anyhow::Result<(SocketAddr, ServerHandle)>
where
    R: ReadAt + Send + Sync + 'static,
{
    let module = build_module(db)?;
    let server = Server::builder().build(listen).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(module);
    info!(%local_addr, "ready for RPC connections");
    Ok((local_addr, handle))
}

/// Serve until ctrl-c.
pub async fn start_rpc<R>(db: Arc<ArchiveDb<R>>, listen: SocketAddr) -> anyhow::Result<()>
where
    R: ReadAt + Send + Sync + 'static,
{
    let (_, handle) = serve(db, listen).await?;
    tokio::select! {
        _ = handle.clone().stopped() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
            let _ = handle.stop();
            handle.stopped().await;
        }
    }
    info!("stopped accepting RPC connections");
    Ok(())
}
