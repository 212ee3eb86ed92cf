// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address Resolver (C5): produces this node's own cluster-reachable address.
//!
//! Cloud-metadata discovery itself is out of scope for the core (spec §1) —
//! it is an external collaborator behind the [`AddressSource`] trait. The
//! resolver's job is only to cache whatever that collaborator returns under
//! a one-shot initializer (spec §5: "caches its result under a one-shot
//! initialiser; readers take a shared lock").

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RosenbridgeError;

/// A collaborator capable of producing this node's cluster-reachable address.
/// Concrete implementations (cloud metadata HTTP calls, a fixed override)
/// live outside the core per spec §1.
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn discover(&self) -> Result<String, RosenbridgeError>;
}

/// Always returns a configured, fixed address. Used when the operator sets
/// `ROSENBRIDGE_DISCOVERY_ADDR`, and by every test harness.
pub struct FixedAddressSource {
    addr: String,
}

impl FixedAddressSource {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl AddressSource for FixedAddressSource {
    async fn discover(&self) -> Result<String, RosenbridgeError> {
        Ok(self.addr.clone())
    }
}

/// Resolves and caches this node's own address exactly once.
///
/// Mirrors the Go original's `DiscoveryAddressResolver` interface
/// (`Resolve`/`Read`), generalized into a single async accessor with an
/// internal one-shot cache rather than two separate methods, since Rust
/// callers always want "the address, resolving on first use if needed".
pub struct AddressResolver {
    source: Box<dyn AddressSource>,
    cached: RwLock<Option<String>>,
}

impl AddressResolver {
    pub fn new(source: Box<dyn AddressSource>) -> Self {
        Self { source, cached: RwLock::new(None) }
    }

    /// Return the resolved address, discovering it on first call only.
    pub async fn resolve(&self) -> Result<String, RosenbridgeError> {
        if let Some(addr) = self.cached.read().await.as_ref() {
            return Ok(addr.clone());
        }

        let mut guard = self.cached.write().await;
        // Double-check after acquiring the write lock (another caller may
        // have resolved it while we waited).
        if let Some(addr) = guard.as_ref() {
            return Ok(addr.clone());
        }

        let addr = self.source.discover().await?;
        *guard = Some(addr.clone());
        Ok(addr)
    }
}
