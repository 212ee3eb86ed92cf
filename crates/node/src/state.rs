// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared node state, wired once at startup and handed to every axum
//! handler via `State<Arc<NodeState>>`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;
use crate::directory::DirectoryStore;
use crate::discovery::AddressResolver;
use crate::intercom::{ClusterCredential, Intercom};
use crate::orchestrator::FanoutOrchestrator;
use crate::registry::BridgeRegistry;
use crate::store::MessageStore;

/// Everything a Rosenbridge node needs to serve requests, registered once
/// in [`crate::run`] and shared behind an `Arc`.
pub struct NodeState {
    pub config: NodeConfig,
    pub own_addr: String,
    pub registry: Arc<BridgeRegistry>,
    pub directory: Arc<dyn DirectoryStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub address: Arc<AddressResolver>,
    pub intercom: Arc<dyn Intercom>,
    pub credential: ClusterCredential,
    pub orchestrator: FanoutOrchestrator,
    pub shutdown: CancellationToken,
}

impl NodeState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        own_addr: String,
        registry: Arc<BridgeRegistry>,
        directory: Arc<dyn DirectoryStore>,
        message_store: Arc<dyn MessageStore>,
        address: Arc<AddressResolver>,
        intercom: Arc<dyn Intercom>,
        credential: ClusterCredential,
        shutdown: CancellationToken,
    ) -> Self {
        let deliverer = Arc::new(crate::deliverer::LocalDeliverer::new(
            Arc::clone(&registry),
            Arc::clone(&directory),
            own_addr.clone(),
            config.operation_timeout(),
            config.fanout_concurrency,
        ));

        let orchestrator = FanoutOrchestrator::new(
            Arc::clone(&directory),
            Arc::clone(&intercom),
            deliverer,
            Arc::clone(&address),
            Arc::clone(&message_store),
            config.operation_timeout(),
            config.archive_timeout(),
            config.fanout_concurrency,
        );

        Self {
            config,
            own_addr,
            registry,
            directory,
            message_store,
            address,
            intercom,
            credential,
            orchestrator,
            shutdown,
        }
    }
}
