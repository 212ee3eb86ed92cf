// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender and receiver land on different nodes sharing one directory
//! store, exercising Resolve -> Partition -> Dispatch over the Intercom
//! channel end to end.

use std::time::Duration;

use rosenbridge_specs::{connect_bridge, spawn_cluster};

#[tokio::test]
async fn cross_node_delivery_fans_out_over_intercom() -> anyhow::Result<()> {
    let nodes = spawn_cluster(2, "cluster", "secret").await?;
    let (n1, n2) = (&nodes[0], &nodes[1]);

    let mut receiver = connect_bridge(&n2.ws_url(), "bob").await?;
    receiver.recv_frame("BRIDGE_CREATE_RESPONSE").await?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/messages", n1.base_url()))
        .header("x-client-id", "alice")
        .json(&serde_json::json!({ "receiver_ids": ["bob"], "message": "hello from another node" }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(resp["code"], "OK");
    assert_eq!(resp["statuses"][0]["code"], "OK");
    assert_eq!(resp["statuses"][0]["client_id"], "bob");

    let incoming =
        tokio::time::timeout(Duration::from_secs(10), receiver.recv_frame("INCOMING_MESSAGE_REQ")).await??;
    assert_eq!(incoming["body"]["sender_id"], "alice");
    assert_eq!(incoming["body"]["message"], "hello from another node");

    Ok(())
}

#[tokio::test]
async fn directory_listing_is_visible_from_either_node() -> anyhow::Result<()> {
    let nodes = spawn_cluster(2, "cluster", "secret").await?;
    let (n1, n2) = (&nodes[0], &nodes[1]);

    let mut receiver = connect_bridge(&n1.ws_url(), "carol").await?;
    receiver.recv_frame("BRIDGE_CREATE_RESPONSE").await?;

    // The row was written on n1; n2 must see it too, since both point at
    // the same cluster-shared directory store.
    let client = reqwest::Client::new();
    let resp: serde_json::Value =
        client.get(format!("{}/api/bridges?client_id=carol", n2.base_url())).send().await?.json().await?;

    let rows = resp["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["client_id"], "carol");
    assert_eq!(rows[0]["node_addr"], n1.addr);

    Ok(())
}
