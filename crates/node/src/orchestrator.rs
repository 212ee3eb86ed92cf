// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out Orchestrator (C7): the heart of the engine. Resolves receivers
//! to bridges, partitions by node, dispatches concurrently (local + peers),
//! merges results, and decides persistence (spec §4.6).
//!
//! Dispatch is one cooperative task per target, bounded by a semaphore and
//! joined afterward once every target has either answered or timed out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::deliverer::{LocalDeliverer, LocalDelivererInput};
use crate::directory::DirectoryStore;
use crate::discovery::AddressResolver;
use crate::intercom::Intercom;
use crate::model::{
    BridgeIdentity, BridgeStatus, DeliveryTarget, PersistMode, PersistedMessage, PersistenceOutcome,
    PostMessageInternalParams, SendResponse, StatusCodeTag, epoch_ms,
};
use crate::error::RosenbridgeError;
use crate::store::MessageStore;

pub struct SendParams {
    pub sender_id: String,
    pub request_id: String,
    pub receiver_ids: Vec<String>,
    pub message: String,
    pub persist: PersistMode,
}

pub struct FanoutOrchestrator {
    directory: Arc<dyn DirectoryStore>,
    intercom: Arc<dyn Intercom>,
    deliverer: Arc<LocalDeliverer>,
    address: Arc<AddressResolver>,
    message_store: Arc<dyn MessageStore>,
    operation_timeout: Duration,
    archive_timeout: Duration,
    fanout_concurrency: usize,
}

impl FanoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        intercom: Arc<dyn Intercom>,
        deliverer: Arc<LocalDeliverer>,
        address: Arc<AddressResolver>,
        message_store: Arc<dyn MessageStore>,
        operation_timeout: Duration,
        archive_timeout: Duration,
        fanout_concurrency: usize,
    ) -> Self {
        Self {
            directory,
            intercom,
            deliverer,
            address,
            message_store,
            operation_timeout,
            archive_timeout,
            fanout_concurrency: fanout_concurrency.max(1),
        }
    }

    /// Deliver directly to this node's own bridges, bypassing Resolve/
    /// Partition/Dispatch — used by the `POST /api/internal/message`
    /// handler, which already received a bridge-id list scoped to this
    /// node from a peer's Step 3 dispatch.
    pub async fn deliver_local(
        &self,
        input: crate::deliverer::LocalDelivererInput,
    ) -> Vec<BridgeStatus> {
        self.deliverer.deliver(input).await
    }

    pub async fn send(&self, params: SendParams) -> Result<SendResponse, RosenbridgeError> {
        let own_addr = self.address.resolve().await?;

        // Step 1 — Resolve.
        let (rows, offline_clients) =
            self.directory.get_by_client_ids(&params.receiver_ids, self.operation_timeout).await?;

        let mut statuses: Vec<BridgeStatus> = offline_clients
            .iter()
            .map(|client_id| BridgeStatus::with_code("", client_id, StatusCodeTag::Offline, "client has no live bridge"))
            .collect();

        // Step 2 — Partition by node-addr.
        let mut by_node: HashMap<String, Vec<BridgeIdentity>> = HashMap::new();
        for row in rows {
            by_node.entry(row.node_addr).or_default().push(BridgeIdentity {
                bridge_id: row.bridge_id,
                client_id: row.client_id,
            });
        }

        // Step 3 — Dispatch concurrently, one task per target node.
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.fanout_concurrency));
        let mut handles = Vec::with_capacity(by_node.len());

        for (node_addr, targets) in by_node {
            let sem = Arc::clone(&semaphore);
            let is_local = node_addr == own_addr;
            let deliverer = Arc::clone(&self.deliverer);
            let intercom = Arc::clone(&self.intercom);
            let sender_id = params.sender_id.clone();
            let request_id = params.request_id.clone();
            let message = params.message.clone();
            let persist = params.persist;
            let deadline = self.operation_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                dispatch_to_node(
                    is_local,
                    &node_addr,
                    targets,
                    deliverer,
                    intercom,
                    sender_id,
                    request_id,
                    message,
                    persist,
                    deadline,
                )
                .await
            }));
        }

        // Step 4 — Merge. Await all completions, no partial streaming
        // (spec §5 "the aggregated response is returned only after all N
        // complete").
        for handle in handles {
            match handle.await {
                Ok(mut partition_statuses) => statuses.append(&mut partition_statuses),
                Err(e) => warn!(?e, "fan-out task panicked"),
            }
        }

        // Step 5 — Persistence decision.
        let never_passed = compute_never_passed(&params.receiver_ids, &statuses);
        let persistence = self.decide_persistence(&params, never_passed).await;

        Ok(SendResponse { code: StatusCodeTag::Ok, persistence, statuses })
    }

    async fn decide_persistence(&self, params: &SendParams, never_passed: Vec<String>) -> PersistenceOutcome {
        let receiver_ids = match params.persist {
            PersistMode::False => return PersistenceOutcome::not_requested(),
            PersistMode::True => params.receiver_ids.clone(),
            PersistMode::IfError => {
                if never_passed.is_empty() {
                    return PersistenceOutcome::not_requested();
                }
                never_passed
            }
        };

        let archived = PersistedMessage {
            request_id: params.request_id.clone(),
            receiver_ids,
            message: params.message.clone(),
            persist: params.persist,
            created_at_ms: epoch_ms(),
        };

        match self.message_store.insert(archived, self.archive_timeout).await {
            Ok(()) => PersistenceOutcome::ok(),
            Err(err) => PersistenceOutcome::failed(err.to_string()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_to_node(
    is_local: bool,
    node_addr: &str,
    targets: Vec<BridgeIdentity>,
    deliverer: Arc<LocalDeliverer>,
    intercom: Arc<dyn Intercom>,
    sender_id: String,
    request_id: String,
    message: String,
    _persist: PersistMode,
    deadline: Duration,
) -> Vec<BridgeStatus> {
    if is_local {
        let targets = targets
            .into_iter()
            .map(|t| DeliveryTarget { bridge_id: t.bridge_id, expected_client_id: Some(t.client_id) })
            .collect();
        return deliverer.deliver(LocalDelivererInput { sender_id, request_id, targets, message }).await;
    }

    let bridge_ids: Vec<String> = targets.iter().map(|t| t.bridge_id.clone()).collect();
    let params = PostMessageInternalParams { sender_id, bridge_ids, message };

    match intercom.post_internal(node_addr, &request_id, params, deadline).await {
        Ok(response) if response.code != StatusCodeTag::Ok => {
            // Peer answered but with a non-OK overall code -> fan that code
            // out onto every bridge-id in the partition, same as a transport
            // error for the whole peer (spec §4.6 step 4).
            let code = response.code;
            targets
                .into_iter()
                .map(|t| BridgeStatus::with_code(t.bridge_id, t.client_id, code, "peer reported non-OK overall status"))
                .collect()
        }
        Ok(response) => response.statuses,
        Err(err) => {
            // Transport error for an entire peer -> every bridge-id in that
            // partition gets this code (spec §4.6 step 4).
            let tag = err.as_status_tag();
            let reason = err.to_string();
            targets
                .into_iter()
                .map(|t| BridgeStatus::with_code(t.bridge_id, t.client_id, tag, reason.clone()))
                .collect()
        }
    }
}

/// `never_passed` := clients with no bridge that produced OK, unioned with
/// clients resolved to zero bridges at Step 1 (spec §4.6 step 5). Offline
/// clients already contribute an OFFLINE status with no bridge-id, so they
/// are captured by the same "no OK status for this client" rule.
fn compute_never_passed(receiver_ids: &[String], statuses: &[BridgeStatus]) -> Vec<String> {
    let mut ok_clients: HashSet<&str> = HashSet::new();
    let mut seen_clients: HashSet<&str> = HashSet::new();
    for status in statuses {
        seen_clients.insert(status.client_id.as_str());
        if status.code == StatusCodeTag::Ok {
            ok_clients.insert(status.client_id.as_str());
        }
    }

    receiver_ids
        .iter()
        .filter(|client_id| !ok_clients.contains(client_id.as_str()) && seen_clients.contains(client_id.as_str()))
        .cloned()
        .collect()
}
