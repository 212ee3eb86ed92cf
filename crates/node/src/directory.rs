// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory Store (C3): cluster-shared `client_id -> {bridge_id, node_addr}`
//! mapping. Externalised per spec §1 ("any directory store supporting the
//! operations in §6") — the core only depends on the [`DirectoryStore`]
//! trait. [`InMemoryDirectoryStore`] is the reference implementation used
//! by the default `--directory-dsn memory` wiring and by all tests; it
//! exposes the same operation set a shared backend would (insert,
//! lookup-by-clients, delete-for-node) over indexed in-memory maps rather
//! than a remote collection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RosenbridgeError;
use crate::model::DirectoryRow;

/// Cluster-shared directory of bridge locations. Every operation carries
/// its own timeout (spec §4.3).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn insert(&self, row: DirectoryRow, timeout: Duration) -> Result<(), RosenbridgeError>;

    async fn get_by_bridge_ids(
        &self,
        bridge_ids: &[String],
        timeout: Duration,
    ) -> Result<Vec<DirectoryRow>, RosenbridgeError>;

    /// Returns the rows found, plus the subset of `client_ids` for which no
    /// row existed (used directly by the orchestrator's Step 1).
    async fn get_by_client_ids(
        &self,
        client_ids: &[String],
        timeout: Duration,
    ) -> Result<(Vec<DirectoryRow>, Vec<String>), RosenbridgeError>;

    /// Delete scoped by `node_addr` — a node may delete only rows it owns
    /// (spec §4.3 "Delete scoping rule").
    async fn delete_one(
        &self,
        bridge_id: &str,
        node_addr: &str,
        timeout: Duration,
    ) -> Result<(), RosenbridgeError>;

    async fn delete_many(
        &self,
        bridge_ids: &[String],
        node_addr: &str,
        timeout: Duration,
    ) -> Result<(), RosenbridgeError>;
}

#[derive(Default)]
struct Indexes {
    by_bridge_id: HashMap<String, DirectoryRow>,
    by_client_id: HashMap<String, HashSet<String>>,
}

/// In-memory, single-process reference [`DirectoryStore`]. Indexed on
/// bridge_id (unique, the map key) and client_id (spec §4.3 "Indexes
/// required for performance").
pub struct InMemoryDirectoryStore {
    inner: tokio::sync::RwLock<Indexes>,
}

impl Default for InMemoryDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self { inner: tokio::sync::RwLock::new(Indexes::default()) }
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn insert(&self, row: DirectoryRow, _timeout: Duration) -> Result<(), RosenbridgeError> {
        let mut guard = self.inner.write().await;
        guard.by_client_id.entry(row.client_id.clone()).or_default().insert(row.bridge_id.clone());
        guard.by_bridge_id.insert(row.bridge_id.clone(), row);
        Ok(())
    }

    async fn get_by_bridge_ids(
        &self,
        bridge_ids: &[String],
        _timeout: Duration,
    ) -> Result<Vec<DirectoryRow>, RosenbridgeError> {
        let guard = self.inner.read().await;
        Ok(bridge_ids.iter().filter_map(|id| guard.by_bridge_id.get(id).cloned()).collect())
    }

    async fn get_by_client_ids(
        &self,
        client_ids: &[String],
        _timeout: Duration,
    ) -> Result<(Vec<DirectoryRow>, Vec<String>), RosenbridgeError> {
        let guard = self.inner.read().await;
        let mut rows = Vec::new();
        let mut not_found = Vec::new();

        for client_id in client_ids {
            match guard.by_client_id.get(client_id) {
                Some(bridge_ids) if !bridge_ids.is_empty() => {
                    for bridge_id in bridge_ids {
                        if let Some(row) = guard.by_bridge_id.get(bridge_id) {
                            rows.push(row.clone());
                        }
                    }
                }
                _ => not_found.push(client_id.clone()),
            }
        }

        Ok((rows, not_found))
    }

    async fn delete_one(
        &self,
        bridge_id: &str,
        node_addr: &str,
        _timeout: Duration,
    ) -> Result<(), RosenbridgeError> {
        let mut guard = self.inner.write().await;
        if let Some(row) = guard.by_bridge_id.get(bridge_id) {
            if row.node_addr != node_addr {
                return Ok(());
            }
            let client_id = row.client_id.clone();
            guard.by_bridge_id.remove(bridge_id);
            if let Some(set) = guard.by_client_id.get_mut(&client_id) {
                set.remove(bridge_id);
                if set.is_empty() {
                    guard.by_client_id.remove(&client_id);
                }
            }
        }
        Ok(())
    }

    async fn delete_many(
        &self,
        bridge_ids: &[String],
        node_addr: &str,
        timeout: Duration,
    ) -> Result<(), RosenbridgeError> {
        for bridge_id in bridge_ids {
            self.delete_one(bridge_id, node_addr, timeout).await?;
        }
        Ok(())
    }
}

/// Build a [`DirectoryStore`] from an opaque connection string. The core
/// never interprets the DSN beyond this dispatch point — only `"memory"` is
/// understood today; anything else is a configuration error at startup,
/// matching spec §6's "process exits non-zero on config load failure".
pub fn build_directory_store(dsn: &str) -> anyhow::Result<Box<dyn DirectoryStore>> {
    match dsn {
        "memory" => Ok(Box::new(InMemoryDirectoryStore::new())),
        other => anyhow::bail!("unsupported directory store dsn: {other}"),
    }
}
