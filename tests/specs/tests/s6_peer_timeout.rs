// SPDX-License-Identifier: MIT OR Apache-2.0

//! A receiver partitioned to an unreachable/hung peer node times out on
//! its own, without affecting the outcome for receivers in other
//! partitions of the same send.

use std::sync::Arc;
use std::time::Duration;

use rosenbridge::directory::{DirectoryStore, InMemoryDirectoryStore};
use rosenbridge::model::DirectoryRow;
use rosenbridge_specs::{connect_bridge, spawn_black_hole, spawn_node_with_directory};

#[tokio::test]
async fn unreachable_peer_partition_times_out_without_affecting_others() -> anyhow::Result<()> {
    let directory: Arc<dyn DirectoryStore> = Arc::new(InMemoryDirectoryStore::new());
    let node = spawn_node_with_directory("cluster", "secret", Arc::clone(&directory)).await?;

    let mut carol = connect_bridge(&node.ws_url(), "carol").await?;
    carol.recv_frame("BRIDGE_CREATE_RESPONSE").await?;

    // "dana" resolves to a peer node-addr that accepts TCP connections but
    // never answers — standing in for a cluster partition or a wedged peer.
    let black_hole_addr = spawn_black_hole().await?;
    directory
        .insert(
            DirectoryRow {
                bridge_id: "dana-bridge".to_owned(),
                client_id: "dana".to_owned(),
                node_addr: black_hole_addr,
                connected_at_ms: 0,
            },
            Duration::from_secs(1),
        )
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/messages", node.base_url()))
        .header("x-client-id", "alice")
        .json(&serde_json::json!({ "receiver_ids": ["carol", "dana"], "message": "split delivery" }))
        .send()
        .await?
        .json()
        .await?;

    let statuses = resp["statuses"].as_array().expect("statuses array");
    let carol_status = statuses.iter().find(|s| s["client_id"] == "carol").expect("carol status present");
    let dana_status = statuses.iter().find(|s| s["client_id"] == "dana").expect("dana status present");

    assert_eq!(carol_status["code"], "OK");
    assert_eq!(dana_status["code"], "TIMEOUT");

    tokio::time::timeout(Duration::from_secs(10), carol.recv_frame("INCOMING_MESSAGE_REQ")).await??;

    Ok(())
}
