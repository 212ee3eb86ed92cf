// SPDX-License-Identifier: MIT OR Apache-2.0

//! An offline receiver (no Directory Row at all) is reported OFFLINE; the
//! `if_error` persistence mode archives the message because the send
//! never reached that receiver.

use rosenbridge_specs::spawn_node;

#[tokio::test]
async fn offline_receiver_is_reported_and_archived_on_if_error() -> anyhow::Result<()> {
    let node = spawn_node("cluster", "secret").await?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/messages", node.base_url()))
        .header("x-client-id", "alice")
        .json(&serde_json::json!({
            "receiver_ids": ["ghost"],
            "message": "are you there?",
            "persist": "if_error",
        }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(resp["statuses"][0]["code"], "OFFLINE");
    assert_eq!(resp["statuses"][0]["client_id"], "ghost");
    assert_eq!(resp["persistence"]["code"], "OK");

    Ok(())
}

#[tokio::test]
async fn offline_receiver_is_not_archived_when_persist_is_false() -> anyhow::Result<()> {
    let node = spawn_node("cluster", "secret").await?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/messages", node.base_url()))
        .header("x-client-id", "alice")
        .json(&serde_json::json!({ "receiver_ids": ["ghost"], "message": "are you there?" }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(resp["statuses"][0]["code"], "OFFLINE");
    assert_eq!(resp["persistence"]["code"], "NOT_REQUESTED");

    Ok(())
}

#[tokio::test]
async fn mixed_online_and_offline_receivers_only_archives_the_failed_one() -> anyhow::Result<()> {
    use rosenbridge_specs::connect_bridge;

    let node = spawn_node("cluster", "secret").await?;
    let mut bob = connect_bridge(&node.ws_url(), "bob").await?;
    bob.recv_frame("BRIDGE_CREATE_RESPONSE").await?;

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/api/messages", node.base_url()))
        .header("x-client-id", "alice")
        .json(&serde_json::json!({
            "receiver_ids": ["bob", "ghost"],
            "message": "partial delivery",
            "persist": "if_error",
        }))
        .send()
        .await?
        .json()
        .await?;

    let statuses = resp["statuses"].as_array().expect("statuses array");
    let bob_status = statuses.iter().find(|s| s["client_id"] == "bob").expect("bob status present");
    let ghost_status = statuses.iter().find(|s| s["client_id"] == "ghost").expect("ghost status present");
    assert_eq!(bob_status["code"], "OK");
    assert_eq!(ghost_status["code"], "OFFLINE");
    assert_eq!(resp["persistence"]["code"], "OK");

    Ok(())
}
