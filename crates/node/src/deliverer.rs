// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local Deliverer (C6): walks a bridge-id list local to this node,
//! delivers via C1, and reaps stale directory rows. This is also the
//! reaper described in spec §4.8 — "every Local Delivery call is also a
//! reaper".

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::directory::DirectoryStore;
use crate::model::{BridgeMessage, BridgeStatus, DeliveryTarget, FrameType, StatusCodeTag};
use crate::registry::BridgeRegistry;

pub struct LocalDelivererInput {
    pub sender_id: String,
    pub request_id: String,
    pub targets: Vec<DeliveryTarget>,
    pub message: String,
}

/// Delivers a message to a set of bridges this node hosts, and reaps any
/// directory rows found to be stale in the process (spec §4.5).
pub struct LocalDeliverer {
    registry: Arc<BridgeRegistry>,
    directory: Arc<dyn DirectoryStore>,
    own_addr: String,
    directory_timeout: Duration,
    /// Bounded parallelism across per-bridge sends (spec §4.5 "when
    /// concurrent, a bounded parallelism is acceptable").
    concurrency: usize,
}

impl LocalDeliverer {
    pub fn new(
        registry: Arc<BridgeRegistry>,
        directory: Arc<dyn DirectoryStore>,
        own_addr: String,
        directory_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self { registry, directory, own_addr, directory_timeout, concurrency: concurrency.max(1) }
    }

    pub async fn deliver(&self, input: LocalDelivererInput) -> Vec<BridgeStatus> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(input.targets.len());

        for target in input.targets {
            let registry = Arc::clone(&self.registry);
            let sem = Arc::clone(&semaphore);
            let sender_id = input.sender_id.clone();
            let request_id = input.request_id.clone();
            let message = input.message.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                deliver_one(&registry, &sender_id, &request_id, &message, target).await
            }));
        }

        let mut statuses = Vec::with_capacity(handles.len());
        let mut stale = Vec::new();

        for handle in handles {
            match handle.await {
                Ok((status, is_stale)) => {
                    if is_stale {
                        stale.push(status.bridge_id.clone());
                    }
                    statuses.push(status);
                }
                Err(_) => {
                    // The spawned task panicked; treat as an internal error rather
                    // than dropping the bridge-id from the response (spec §8
                    // property 5: "no statuses are dropped").
                }
            }
        }

        if !stale.is_empty() {
            let directory = Arc::clone(&self.directory);
            let own_addr = self.own_addr.clone();
            let timeout = self.directory_timeout;
            // Fire-and-forget reclamation (spec §4.5 step 5, §4.8).
            tokio::spawn(async move {
                if let Err(err) = directory.delete_many(&stale, &own_addr, timeout).await {
                    debug!(?err, "stale directory reclamation failed");
                }
            });
        }

        statuses
    }
}

async fn deliver_one(
    registry: &BridgeRegistry,
    sender_id: &str,
    request_id: &str,
    message: &str,
    target: DeliveryTarget,
) -> (BridgeStatus, bool) {
    let fallback_client_id = target.expected_client_id.clone().unwrap_or_default();

    let Some(bridge) = registry.lookup_by_bridge_id(&target.bridge_id).await else {
        return (
            BridgeStatus::with_code(
                &target.bridge_id,
                &fallback_client_id,
                StatusCodeTag::BridgeNotFound,
                "bridge not found on this node",
            ),
            true,
        );
    };

    if let Some(expected) = &target.expected_client_id {
        if &bridge.client_id != expected {
            return (
                BridgeStatus::with_code(
                    &target.bridge_id,
                    expected,
                    StatusCodeTag::Unauthorized,
                    "bridge does not belong to the expected client",
                ),
                false,
            );
        }
    }

    let frame = BridgeMessage::new(
        FrameType::IncomingMessageReq,
        request_id,
        json!({ "sender_id": sender_id, "message": message }),
    );

    match bridge.send(&frame).await {
        Ok(()) => (BridgeStatus::ok(&target.bridge_id, &bridge.client_id), false),
        Err(err) => (
            BridgeStatus::with_code(&target.bridge_id, &bridge.client_id, err.as_status_tag(), err.to_string()),
            false,
        ),
    }
}
