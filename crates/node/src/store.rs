// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message Store (C8): persisted-message archive for receivers that
//! failed delivery or were offline. Externalised like the directory store
//! (spec §1); [`InMemoryMessageStore`] is the reference implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RosenbridgeError;
use crate::model::PersistedMessage;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: PersistedMessage, timeout: Duration) -> Result<(), RosenbridgeError>;
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<PersistedMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: PersistedMessage, _timeout: Duration) -> Result<(), RosenbridgeError> {
        self.messages.write().await.push(message);
        Ok(())
    }
}
