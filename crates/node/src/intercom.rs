// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intercom (C4): node-to-node RPC for internal delivery.
//!
//! Each peer gets its own pooled `reqwest::Client`, looked up or created
//! under a single lock-guarded map, since each peer is a distinct
//! TLS/TCP destination worth reusing connections to. Basic-auth headers
//! and `x-request-id`/`x-client-id` propagate on every call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RosenbridgeError;
use crate::model::{InternalMessageResponse, PostMessageInternalParams};

/// Cluster credential used on the intra-cluster HTTP basic-auth channel.
#[derive(Debug, Clone)]
pub struct ClusterCredential {
    pub username: String,
    pub password: String,
}

/// Node-to-node RPC channel used by the Fan-out Orchestrator.
#[async_trait]
pub trait Intercom: Send + Sync {
    /// Deliver an internal send request to peer `peer_addr`. `request_id`
    /// travels as the `x-request-id` header (spec §6), not in the body.
    /// Fails with `Transport` on unreachability/non-2xx, `Timeout` if
    /// `deadline` elapses first (spec §4.4).
    async fn post_internal(
        &self,
        peer_addr: &str,
        request_id: &str,
        params: PostMessageInternalParams,
        deadline: Duration,
    ) -> Result<InternalMessageResponse, RosenbridgeError>;
}

/// HTTP-based [`Intercom`]. Maintains one reusable `reqwest::Client` per
/// peer (pooled, thread-safe) — spec §4.4 "Maintains one reusable
/// transport client per peer".
pub struct HttpIntercom {
    clients: RwLock<HashMap<String, reqwest::Client>>,
    protocol: String,
    credential: ClusterCredential,
}

impl HttpIntercom {
    pub fn new(protocol: impl Into<String>, credential: ClusterCredential) -> Self {
        Self { clients: RwLock::new(HashMap::new()), protocol: protocol.into(), credential }
    }

    async fn client_for(&self, peer_addr: &str) -> reqwest::Client {
        {
            let guard = self.clients.read().await;
            if let Some(client) = guard.get(peer_addr) {
                return client.clone();
            }
        }

        let mut guard = self.clients.write().await;
        if let Some(client) = guard.get(peer_addr) {
            return client.clone();
        }
        let client = reqwest::Client::new();
        guard.insert(peer_addr.to_owned(), client.clone());
        client
    }
}

#[async_trait]
impl Intercom for HttpIntercom {
    async fn post_internal(
        &self,
        peer_addr: &str,
        request_id: &str,
        params: PostMessageInternalParams,
        deadline: Duration,
    ) -> Result<InternalMessageResponse, RosenbridgeError> {
        let client = self.client_for(peer_addr).await;
        let endpoint = format!("{}://{}/api/internal/message", self.protocol, peer_addr);

        let request = client
            .post(&endpoint)
            .basic_auth(&self.credential.username, Some(&self.credential.password))
            .header("x-request-id", request_id.to_owned())
            .header("x-client-id", params.sender_id.clone())
            .json(&params);

        let response = tokio::time::timeout(deadline, request.send())
            .await
            .map_err(|_| RosenbridgeError::Timeout)?
            .map_err(|_| RosenbridgeError::Transport)?;

        if !response.status().is_success() {
            return Err(RosenbridgeError::Transport);
        }

        tokio::time::timeout(deadline, response.json::<InternalMessageResponse>())
            .await
            .map_err(|_| RosenbridgeError::Timeout)?
            .map_err(|_| RosenbridgeError::Transport)
    }
}
