// SPDX-License-Identifier: MIT OR Apache-2.0

//! A Directory Row surviving past its bridge (e.g. the node restarted and
//! lost registry state while the externally-shared directory kept the old
//! row) must be reported BRIDGE_NOT_FOUND and reclaimed by the Local
//! Deliverer's reaper, not retried forever.

use std::sync::Arc;
use std::time::Duration;

use rosenbridge::directory::{DirectoryStore, InMemoryDirectoryStore};
use rosenbridge::model::DirectoryRow;
use rosenbridge_specs::spawn_node_with_directory;

#[tokio::test]
async fn stale_row_is_reported_not_found_and_reaped_within_a_second() -> anyhow::Result<()> {
    let directory: Arc<dyn DirectoryStore> = Arc::new(InMemoryDirectoryStore::new());
    let node = spawn_node_with_directory("cluster", "secret", Arc::clone(&directory)).await?;

    // No bridge ever connected under this id; the row is inserted straight
    // into the shared store, standing in for a node that crashed and lost
    // its in-memory registry without the directory catching up yet.
    directory
        .insert(
            DirectoryRow {
                bridge_id: "ghost-bridge".to_owned(),
                client_id: "ghost".to_owned(),
                node_addr: node.addr.clone(),
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
        .json(&serde_json::json!({ "receiver_ids": ["ghost"], "message": "hello?" }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(resp["statuses"][0]["code"], "BRIDGE_NOT_FOUND");

    tokio::time::sleep(Duration::from_secs(1)).await;
    let (rows, _) = directory
        .get_by_client_ids(&["ghost".to_owned()], Duration::from_secs(1))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    assert!(rows.is_empty(), "stale row should have been reclaimed");

    Ok(())
}
