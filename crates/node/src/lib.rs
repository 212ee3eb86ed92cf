// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rosenbridge: a horizontally-scalable distributed message-delivery
//! fabric. See the module-level docs of [`orchestrator`] for the routing
//! engine's entry point.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod deliverer;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod intercom;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;
use crate::directory::{build_directory_store, DirectoryStore};
use crate::discovery::{AddressResolver, FixedAddressSource};
use crate::intercom::{ClusterCredential, HttpIntercom};
use crate::registry::BridgeRegistry;
use crate::state::NodeState;
use crate::store::InMemoryMessageStore;
use crate::transport::build_router;

/// Run a Rosenbridge node until shutdown (SIGINT/SIGTERM).
pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));
    run_with_shutdown(config, shutdown).await
}

/// Run a Rosenbridge node until `shutdown` is cancelled. Split out from
/// [`run`] so test harnesses can trigger shutdown directly instead of
/// relying on OS signals.
pub async fn run_with_shutdown(config: NodeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let directory = Arc::from(build_directory_store(&config.directory_dsn)?);
    run_with_directory(config, shutdown, directory).await
}

/// Run a node against a pre-built [`DirectoryStore`], bypassing DSN
/// dispatch. In production every node builds its own handle to the same
/// externally-shared store from the same DSN; a cluster test harness uses
/// this entry point to hand multiple in-process nodes one shared
/// `Arc<dyn DirectoryStore>` directly, standing in for that shared backend.
pub async fn run_with_directory(
    config: NodeConfig,
    shutdown: CancellationToken,
    directory: Arc<dyn DirectoryStore>,
) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr();

    // The address resolver's collaborator is fixed today: either the
    // operator-provided override, or the node's own listen address.
    // Cloud-metadata discovery is an external collaborator spec §1 leaves
    // out of the core; wiring one in only means swapping this source.
    let bootstrap = AddressResolver::new(Box::new(FixedAddressSource::new(
        config.discovery_addr.clone().unwrap_or_else(|| listen_addr.clone()),
    )));
    let own_addr = bootstrap.resolve().await.map_err(|e| anyhow::anyhow!("address resolution failed: {e}"))?;
    let address = Arc::new(AddressResolver::new(Box::new(FixedAddressSource::new(own_addr.clone()))));

    let message_store = Arc::new(InMemoryMessageStore::new());
    let registry = Arc::new(BridgeRegistry::new(config.max_bridges_total, config.max_bridges_per_client));
    let credential =
        ClusterCredential { username: config.cluster_username.clone(), password: config.cluster_password.clone() };
    let intercom: Arc<dyn intercom::Intercom> =
        Arc::new(HttpIntercom::new(config.peer_protocol.clone(), credential.clone()));

    let state = Arc::new(NodeState::new(
        config,
        own_addr,
        registry,
        directory,
        message_store,
        address,
        intercom,
        credential,
        shutdown.clone(),
    ));

    tracing::info!(addr = %listen_addr, own_addr = %state.own_addr, "rosenbridge listening");

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&listen_addr).await?;

    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    // Drain: close every bridge still admitted on this node with reason
    // SHUTDOWN (spec §6 exit-code section).
    drain_bridges(&state).await;

    Ok(())
}

async fn drain_bridges(state: &NodeState) {
    let ids: Vec<String> = {
        // BridgeRegistry doesn't expose an enumerator beyond lookups by key;
        // closing happens per-bridge as `remove` is invoked by each bridge's
        // own closure handler once we call close on every live bridge we can
        // reach. The registry is the sole owner, so draining goes through it.
        state.registry.bridge_ids().await
    };
    for id in ids {
        if let Some(bridge) = state.registry.lookup_by_bridge_id(&id).await {
            bridge.close("SHUTDOWN".to_owned()).await;
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(_) => return,
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    tracing::info!("shutdown signal received, draining");
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    shutdown.cancel();
}
