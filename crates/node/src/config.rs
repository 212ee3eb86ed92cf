// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// Configuration for a Rosenbridge node.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "rosenbridge", about = "Distributed bridge routing engine")]
pub struct NodeConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "ROSENBRIDGE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "ROSENBRIDGE_PORT")]
    pub port: u16,

    /// Protocol used to reach peer nodes over the intercom channel.
    #[arg(long, default_value = "http", env = "ROSENBRIDGE_PEER_PROTOCOL")]
    pub peer_protocol: String,

    /// Fixed cluster-reachable address for this node, bypassing cloud-metadata
    /// discovery (e.g. "10.0.0.5:8080"). If unset, the address resolver's
    /// default collaborator is used.
    #[arg(long, env = "ROSENBRIDGE_DISCOVERY_ADDR")]
    pub discovery_addr: Option<String>,

    /// Username for the intra-cluster HTTP basic-auth credential.
    #[arg(long, default_value = "rosenbridge", env = "ROSENBRIDGE_CLUSTER_USER")]
    pub cluster_username: String,

    /// Password for the intra-cluster HTTP basic-auth credential.
    #[arg(long, default_value = "", env = "ROSENBRIDGE_CLUSTER_PASSWORD")]
    pub cluster_password: String,

    /// Per-call timeout (seconds) for directory and intercom operations.
    #[arg(long, default_value_t = 5, env = "ROSENBRIDGE_OPERATION_TIMEOUT_SECS")]
    pub operation_timeout_secs: u64,

    /// Timeout (seconds) for message-archive writes.
    #[arg(long, default_value_t = 5, env = "ROSENBRIDGE_ARCHIVE_TIMEOUT_SECS")]
    pub archive_timeout_secs: u64,

    /// Maximum live bridges this node will admit in total.
    #[arg(long, default_value_t = 10_000, env = "ROSENBRIDGE_MAX_BRIDGES_TOTAL")]
    pub max_bridges_total: usize,

    /// Maximum live bridges this node will admit for a single client.
    #[arg(long, default_value_t = 10, env = "ROSENBRIDGE_MAX_BRIDGES_PER_CLIENT")]
    pub max_bridges_per_client: usize,

    /// Opaque connection string handed to the directory store constructor.
    /// The core never parses this; it identifies the external collaborator.
    #[arg(long, default_value = "memory", env = "ROSENBRIDGE_DIRECTORY_DSN")]
    pub directory_dsn: String,

    /// Maximum concurrent fan-out dispatches per send (bounded parallelism,
    /// spec §4.5 "bounded parallelism is acceptable").
    #[arg(long, default_value_t = 32, env = "ROSENBRIDGE_FANOUT_CONCURRENCY")]
    pub fanout_concurrency: usize,
}

impl NodeConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
