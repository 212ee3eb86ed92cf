// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge (C1): a framed, bidirectional connection to one client.
//!
//! Built on an axum `WebSocketUpgrade`, split into sink and stream halves;
//! message/closure handlers are registered under an
//! `RwLock<HashMap<HandlerId, Handler>>` and the read loop is scoped to a
//! `CancellationToken` so a close can unwind it from any direction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::RosenbridgeError;
use crate::model::BridgeMessage;

/// Opaque handle returned by `on_message`/`on_closure`, passed back to
/// `unregister`. Fresh per registration (spec §9 design note).
pub type HandlerId = u64;

/// Invoked for every inbound TEXT/DATA frame. Must be non-blocking or fan
/// out itself (spec §4.1): handlers are dispatched via `tokio::spawn`.
pub type MessageHandler = Arc<dyn Fn(BridgeMessage) + Send + Sync>;

/// Invoked exactly once, at CLOSING -> CLOSED, with the closure reason.
pub type ClosureHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Open,
    Closing,
    Closed,
}

/// A live bidirectional connection between one client and this node.
///
/// Owned exclusively by the [`crate::registry::BridgeRegistry`] that
/// admitted it; other components receive only non-owning `Arc` lookups
/// (spec §3 "Ownership").
pub struct Bridge {
    pub bridge_id: String,
    pub client_id: String,

    state: Mutex<BridgeState>,
    writer: Mutex<SplitSink<WebSocket, Message>>,
    read_loop_cancel: CancellationToken,

    on_message: RwLock<HashMap<HandlerId, MessageHandler>>,
    on_closure: RwLock<HashMap<HandlerId, ClosureHandler>>,
    next_handler_id: AtomicU64,
}

impl Bridge {
    /// Split a freshly upgraded socket and wrap it as a `Bridge`. Does not
    /// start the read loop — callers (the registry, during admission) do
    /// that with [`Bridge::spawn_read_loop`] once the bridge is fully
    /// wired into their indices.
    pub fn new(bridge_id: String, client_id: String, socket: WebSocket) -> (Arc<Self>, SplitStream<WebSocket>) {
        let (sink, stream) = socket.split();
        let bridge = Arc::new(Self {
            bridge_id,
            client_id,
            state: Mutex::new(BridgeState::Open),
            writer: Mutex::new(sink),
            read_loop_cancel: CancellationToken::new(),
            on_message: RwLock::new(HashMap::new()),
            on_closure: RwLock::new(HashMap::new()),
            next_handler_id: AtomicU64::new(1),
        });
        (bridge, stream)
    }

    /// Register an inbound-message handler. Returns a handle usable with
    /// [`Bridge::unregister`].
    pub async fn on_message(&self, handler: MessageHandler) -> HandlerId {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.on_message.write().await.insert(id, handler);
        id
    }

    /// Register a closure handler. Fires exactly once, at CLOSING -> CLOSED.
    pub async fn on_closure(&self, handler: ClosureHandler) -> HandlerId {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.on_closure.write().await.insert(id, handler);
        id
    }

    /// Remove a previously registered handler (message or closure).
    pub async fn unregister(&self, handle: HandlerId) {
        self.on_message.write().await.remove(&handle);
        self.on_closure.write().await.remove(&handle);
    }

    /// Deliver one message frame to the peer. Fails with `Transport` on I/O
    /// error and closes the bridge — a write failure is how higher layers
    /// learn about a broken connection (spec §4.1 "Failure semantics").
    pub async fn send(&self, message: &BridgeMessage) -> Result<(), RosenbridgeError> {
        {
            let state = self.state.lock().await;
            if *state != BridgeState::Open {
                return Err(RosenbridgeError::Transport);
            }
        }

        let text = serde_json::to_string(message).map_err(|_| RosenbridgeError::Internal)?;
        let mut writer = self.writer.lock().await;
        if writer.send(Message::Text(text.into())).await.is_err() {
            drop(writer);
            self.close("write error".to_owned()).await;
            return Err(RosenbridgeError::Transport);
        }
        Ok(())
    }

    /// Idempotent shutdown. Guarantees every registered closure handler
    /// runs exactly once, with `reason`, across however many callers race
    /// to close the same bridge (spec §4.1 state machine, §8 property 7).
    pub async fn close(&self, reason: String) {
        {
            let mut state = self.state.lock().await;
            if *state != BridgeState::Open {
                return;
            }
            *state = BridgeState::Closing;
        }

        self.read_loop_cancel.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.send(Message::Close(None)).await;
        let _ = writer.close().await;
        drop(writer);

        {
            let mut state = self.state.lock().await;
            *state = BridgeState::Closed;
        }

        let handlers: Vec<ClosureHandler> = self.on_closure.read().await.values().cloned().collect();
        for handler in handlers {
            let reason = reason.clone();
            handler(reason);
        }
    }

    pub async fn is_open(&self) -> bool {
        *self.state.lock().await == BridgeState::Open
    }

    /// Start the single-threaded read loop. Consumes frames until a CLOSE
    /// frame, a read error, or external cancellation; any of those closes
    /// the bridge. Each TEXT frame is parsed and fanned out to every
    /// registered message handler concurrently via `tokio::spawn`.
    pub fn spawn_read_loop(self: &Arc<Self>, mut stream: SplitStream<WebSocket>) {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = bridge.read_loop_cancel.cancelled() => break,
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                bridge.dispatch_inbound(text.to_string()).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                bridge.close("peer closed".to_owned()).await;
                                break;
                            }
                            Some(Err(_)) => {
                                bridge.close("read error".to_owned()).await;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
        });
    }

    async fn dispatch_inbound(&self, text: String) {
        let message: BridgeMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(_) => return,
        };
        let handlers: Vec<MessageHandler> = self.on_message.read().await.values().cloned().collect();
        for handler in handlers {
            let message = message.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler(message) });
        }
    }
}
