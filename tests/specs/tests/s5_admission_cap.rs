// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission limits are enforced atomically under concurrent connects: with
//! `max_bridges_total = 2`, exactly two of three concurrent upgrade
//! attempts are admitted.

use rosenbridge_specs::{connect_bridge, spawn_node_with_opts, NodeOpts};

#[tokio::test]
async fn total_admission_cap_admits_exactly_the_limit() -> anyhow::Result<()> {
    let node = spawn_node_with_opts(
        "cluster",
        "secret",
        NodeOpts { max_bridges_total: Some(2), max_bridges_per_client: Some(10) },
    )
    .await?;

    let attempts = futures_util::future::join_all((0..3).map(|i| {
        let ws_url = node.ws_url();
        async move {
            let mut socket = connect_bridge(&ws_url, &format!("client-{i}")).await?;
            socket.recv_frame("BRIDGE_CREATE_RESPONSE").await?;
            Ok::<_, anyhow::Error>(socket)
        }
    }))
    .await;

    let admitted = attempts.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 2, "exactly max_bridges_total connections should be admitted");

    Ok(())
}

#[tokio::test]
async fn per_client_admission_cap_is_independent_of_total() -> anyhow::Result<()> {
    let node = spawn_node_with_opts(
        "cluster",
        "secret",
        NodeOpts { max_bridges_total: Some(10), max_bridges_per_client: Some(1) },
    )
    .await?;

    let mut first = connect_bridge(&node.ws_url(), "bob").await?;
    first.recv_frame("BRIDGE_CREATE_RESPONSE").await?;

    let mut second = connect_bridge(&node.ws_url(), "bob").await?;
    let second_admitted = second.recv_frame("BRIDGE_CREATE_RESPONSE").await.is_ok();
    assert!(!second_admitted, "a second bridge for the same client should be rejected");

    Ok(())
}
