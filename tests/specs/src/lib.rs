// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end cluster scenarios: spins up real
//! `rosenbridge` nodes in-process, bound to `127.0.0.1:0`, wired to know
//! about each other via `--discovery-addr`.

use std::sync::{Arc, Once};
use std::time::Duration;

use clap::Parser;
use rosenbridge::config::NodeConfig;
use rosenbridge::directory::{DirectoryStore, InMemoryDirectoryStore};
use tokio_util::sync::CancellationToken;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Safe to call more
/// than once — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Find a free TCP port by binding to :0 then releasing it.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running node, bound to a real port, shut down on drop.
pub struct Node {
    pub addr: String,
    shutdown: CancellationToken,
}

impl Node {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/bridges/ws", self.addr)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Per-node overrides a scenario cares about; everything else keeps the
/// node's own defaults.
#[derive(Default)]
pub struct NodeOpts {
    pub max_bridges_total: Option<usize>,
    pub max_bridges_per_client: Option<usize>,
}

/// Spawn a node on a free local port, with its own private directory store.
/// Fine for single-node scenarios; cross-node scenarios need [`spawn_cluster`]
/// instead, since each node otherwise observes a different Directory Row set.
pub async fn spawn_node(username: &str, password: &str) -> anyhow::Result<Node> {
    spawn_node_with(username, password, Arc::new(InMemoryDirectoryStore::new()), NodeOpts::default()).await
}

/// Like [`spawn_node`], with admission-limit overrides.
pub async fn spawn_node_with_opts(username: &str, password: &str, opts: NodeOpts) -> anyhow::Result<Node> {
    spawn_node_with(username, password, Arc::new(InMemoryDirectoryStore::new()), opts).await
}

/// Spawn a node on a free local port sharing the given directory store — in
/// a real deployment every node points its `--directory-dsn` at the same
/// external backend; here the test harness hands multiple in-process nodes
/// the same `Arc` to stand in for that shared backend.
pub async fn spawn_node_with_directory(
    username: &str,
    password: &str,
    directory: Arc<dyn DirectoryStore>,
) -> anyhow::Result<Node> {
    spawn_node_with(username, password, directory, NodeOpts::default()).await
}

async fn spawn_node_with(
    username: &str,
    password: &str,
    directory: Arc<dyn DirectoryStore>,
    opts: NodeOpts,
) -> anyhow::Result<Node> {
    ensure_crypto();
    let port = free_port()?;
    let addr = format!("127.0.0.1:{port}");

    let max_total = opts.max_bridges_total.unwrap_or(10_000).to_string();
    let max_per_client = opts.max_bridges_per_client.unwrap_or(10).to_string();

    let config = NodeConfig::parse_from([
        "rosenbridge",
        "--host",
        "127.0.0.1",
        "--port",
        &port.to_string(),
        "--discovery-addr",
        &addr,
        "--cluster-username",
        username,
        "--cluster-password",
        password,
        "--operation-timeout-secs",
        "2",
        "--max-bridges-total",
        &max_total,
        "--max-bridges-per-client",
        &max_per_client,
    ]);

    let shutdown = CancellationToken::new();
    let inner = shutdown.clone();
    tokio::spawn(async move {
        let _ = rosenbridge::run_with_directory(config, inner, directory).await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok(Node { addr, shutdown })
}

/// Spawn `n` nodes sharing one directory store, as if pointed at the same
/// cluster-shared backend — the setup every S2/S6-style cross-node scenario
/// needs.
pub async fn spawn_cluster(n: usize, username: &str, password: &str) -> anyhow::Result<Vec<Node>> {
    let directory: Arc<dyn DirectoryStore> = Arc::new(InMemoryDirectoryStore::new());
    let mut nodes = Vec::with_capacity(n);
    for _ in 0..n {
        nodes.push(spawn_node_with_directory(username, password, Arc::clone(&directory)).await?);
    }
    Ok(nodes)
}

/// A bridge-protocol client connection, for tests driving the WS transport
/// directly instead of through `POST /api/messages`.
pub struct BridgeSocket {
    inner: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
}

impl BridgeSocket {
    pub async fn send_frame(
        &mut self,
        kind: &str,
        request_id: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<()> {
        use futures_util::SinkExt;
        let frame = serde_json::json!({ "type": kind, "request_id": request_id, "body": body });
        self.inner.send(tokio_tungstenite::tungstenite::Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    /// Wait (up to 5s) for the next frame, skipping frames whose `type`
    /// doesn't match `kind` — the read loop and the outgoing-request reply
    /// can interleave in either order across a WS connection.
    pub async fn recv_frame(&mut self, kind: &str) -> anyhow::Result<serde_json::Value> {
        use futures_util::StreamExt;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            anyhow::ensure!(!remaining.is_zero(), "timed out waiting for frame {kind}");
            let msg = tokio::time::timeout(remaining, self.inner.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("bridge socket closed before {kind}"))??;
            let tokio_tungstenite::tungstenite::Message::Text(text) = msg else { continue };
            let value: serde_json::Value = serde_json::from_str(&text)?;
            if value["type"] == kind {
                return Ok(value);
            }
        }
    }
}

/// Connect to a node's bridge WS transport as the given client.
pub async fn connect_bridge(ws_url: &str, client_id: &str) -> anyhow::Result<BridgeSocket> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request = ws_url.into_client_request()?;
    request.headers_mut().insert("x-client-id", client_id.parse()?);
    let (inner, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(BridgeSocket { inner })
}

/// Bind a listener that accepts TCP connections and never writes a byte —
/// stands in for an unreachable/hung peer node for Intercom timeout tests.
/// The accept loop runs for the caller's process lifetime; there is nothing
/// to shut down since the listener is dropped when the test process exits.
pub async fn spawn_black_hole() -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { return };
            // Hold the connection open without reading or writing it.
            tokio::spawn(async move {
                let _socket = socket;
                std::future::pending::<()>().await;
            });
        }
    });
    Ok(addr)
}
