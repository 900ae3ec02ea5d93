// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod common;

use common::*;
use jsonrpsee::core::client::{ClientT as _, Error as ClientError};
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::rpc_params;
use rpc_server_car::rpc;
use rpc_server_car::solana::Signature;
use serde_json::Value;
use std::sync::Arc;

async fn serve_fixture() -> (std::net::SocketAddr, jsonrpsee::server::ServerHandle) {
    let mut fixture = ArchiveBuilder::new();
    let sig = signature(1);
    let data = fixture.data_frames(&wire_transaction(sig), 1);
    let metadata = fixture.data_frames(&[], 1);
    let tx = fixture.add_transaction(data, metadata, 0, sig);
    let entry = fixture.add_entry([0xAB; 32], vec![tx]);
    fixture.add_block(0, 0, 0, vec![entry], None);
    let db = Arc::new(fixture.build());
    rpc::serve(db, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap()
}

fn call_error(err: ClientError) -> (i32, String) {
    match err {
        ClientError::Call(object) => (object.code(), object.message().to_owned()),
        other => panic!("expected a call error, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_methods_are_rejected() {
    let (addr, handle) = serve_fixture().await;
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let err = client
        .request::<Value, _>("getFoo", rpc_params![])
        .await
        .unwrap_err();
    let (code, message) = call_error(err);
    assert_eq!(code, -32601);
    assert_eq!(message, "Method not found");

    let _ = handle.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_signatures_report_internal_error() {
    let (addr, handle) = serve_fixture().await;
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let missing = Signature(signature(99)).to_string();
    let err = client
        .request::<Value, _>("getTransaction", rpc_params![missing])
        .await
        .unwrap_err();
    let (code, message) = call_error(err);
    assert_eq!(code, -32603);
    assert_eq!(message, "Internal error");

    let _ = handle.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_params_are_rejected() {
    let (addr, handle) = serve_fixture().await;
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let err = client
        .request::<Value, _>("getBlock", rpc_params!["not-a-slot"])
        .await
        .unwrap_err();
    let (code, message) = call_error(err);
    assert_eq!(code, -32602);
    assert_eq!(message, "Invalid params");

    let _ = handle.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn get_block_round_trips_over_http() {
    let (addr, handle) = serve_fixture().await;
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let block: Value = client.request("getBlock", rpc_params![0u64]).await.unwrap();
    assert_eq!(block["parentSlot"], 0);
    assert_eq!(block["blockHeight"], 0);
    assert_eq!(block["previousBlockhash"], "");
    assert_eq!(block["rewards"], Value::Null);
    assert_eq!(block["transactions"][0]["transaction"][1], "base64");
    assert_eq!(block["transactions"][0]["version"], "legacy");

    let missing: Result<Value, _> = client.request("getBlock", rpc_params![404u64]).await;
    let (code, _) = call_error(missing.unwrap_err());
    assert_eq!(code, -32603);

    let _ = handle.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn get_transaction_round_trips_over_http() {
    let (addr, handle) = serve_fixture().await;
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let sig = Signature(signature(1)).to_string();
    let tx: Value = client
        .request("getTransaction", rpc_params![sig])
        .await
        .unwrap();
    assert_eq!(tx["meta"], Value::Null);
    assert_eq!(tx["version"], "legacy");
    assert!(tx.get("slot").is_none());

    let _ = handle.stop();
}
