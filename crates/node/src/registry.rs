// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge Registry (C2): per-node in-memory index of live bridges.
//!
//! Keyed two ways: a nested `client_id -> { bridge_id -> Bridge }` map (for
//! `lookup_by_client_id` without a scan) plus a flat `bridge_id -> Bridge`
//! map (for O(1) `lookup_by_bridge_id`), both updated under one write lock
//! so admission-limit checks and index inserts are atomic (spec §4.2 R2).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use tokio::sync::RwLock;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::RosenbridgeError;

struct RegistryInner {
    by_bridge_id: HashMap<String, Arc<Bridge>>,
    by_client_id: HashMap<String, HashMap<String, Arc<Bridge>>>,
    total: usize,
}

/// Per-node index of live bridges, enforcing admission limits.
pub struct BridgeRegistry {
    inner: RwLock<RegistryInner>,
    max_total: usize,
    max_per_client: usize,
}

impl BridgeRegistry {
    pub fn new(max_total: usize, max_per_client: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_bridge_id: HashMap::new(),
                by_client_id: HashMap::new(),
                total: 0,
            }),
            max_total,
            max_per_client,
        }
    }

    /// Enforce both admission limits, wrap the upgraded socket under the
    /// given `bridge_id`, install it under both indices, and start its
    /// read loop — all of it (limit checks + insert) under one exclusive
    /// hold (spec §4.2 R2, §8 property 8).
    ///
    /// `bridge_id` is generated by the caller, not here: the directory-first
    /// admission protocol (spec §4.7) must know the bridge-id before this
    /// call, to insert the Directory Row ahead of registry admission.
    pub async fn admit(
        &self,
        bridge_id: String,
        client_id: String,
        socket: WebSocket,
    ) -> Result<Arc<Bridge>, RosenbridgeError> {
        let mut guard = self.inner.write().await;

        if guard.total >= self.max_total {
            return Err(RosenbridgeError::TooManyBridges);
        }
        let per_client = guard.by_client_id.get(&client_id).map(|m| m.len()).unwrap_or(0);
        if per_client >= self.max_per_client {
            return Err(RosenbridgeError::TooManyBridgesForClient);
        }

        let (bridge, stream) = Bridge::new(bridge_id.clone(), client_id.clone(), socket);
        bridge.spawn_read_loop(stream);

        guard.by_bridge_id.insert(bridge_id.clone(), Arc::clone(&bridge));
        guard.by_client_id.entry(client_id).or_default().insert(bridge_id, Arc::clone(&bridge));
        guard.total += 1;
        debug!(total = guard.total, "admitted bridge");

        Ok(bridge)
    }

    pub async fn lookup_by_bridge_id(&self, bridge_id: &str) -> Option<Arc<Bridge>> {
        self.inner.read().await.by_bridge_id.get(bridge_id).cloned()
    }

    pub async fn lookup_by_client_id(&self, client_id: &str) -> Vec<Arc<Bridge>> {
        self.inner
            .read()
            .await
            .by_client_id
            .get(client_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Close and de-index a bridge. Safe to call more than once or on an
    /// unknown bridge-id.
    pub async fn remove(&self, bridge_id: &str) {
        let bridge = {
            let mut guard = self.inner.write().await;
            let Some(bridge) = guard.by_bridge_id.remove(bridge_id) else {
                return;
            };
            if let Some(per_client) = guard.by_client_id.get_mut(&bridge.client_id) {
                per_client.remove(bridge_id);
                if per_client.is_empty() {
                    guard.by_client_id.remove(&bridge.client_id);
                }
            }
            guard.total = guard.total.saturating_sub(1);
            debug!(total = guard.total, "removed bridge");
            bridge
        };
        bridge.close("removed".to_owned()).await;
    }

    pub async fn total(&self) -> usize {
        self.inner.read().await.total
    }

    /// Snapshot of every bridge-id currently admitted. Used for shutdown
    /// draining (spec §6 "close all bridges with reason SHUTDOWN").
    pub async fn bridge_ids(&self) -> Vec<String> {
        self.inner.read().await.by_bridge_id.keys().cloned().collect()
    }
}
