// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge transport: upgrades `GET /api/bridges/ws` to the bidirectional
//! framed connection and runs the directory-first admission protocol
//! (spec §4.7).
//!
//! A connection is admitted locally before the directory row is written,
//! and unwound on either failure, so a bridge is never reachable from a
//! peer before it's reachable locally.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::RosenbridgeError;
use crate::model::{BridgeMessage, DirectoryRow, FrameType, PersistMode, SendRequest, epoch_ms};
use crate::orchestrator::SendParams;
use crate::state::NodeState;

/// `GET /api/bridges/ws` — upgrade to bridge transport.
///
/// Requires `x-client-id` (1-100 chars, no control characters) per spec §6.
pub async fn bridges_ws(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let client_id = match extract_client_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    ws.on_upgrade(move |socket| admit_and_serve(state, client_id, socket)).into_response()
}

fn extract_client_id(headers: &HeaderMap) -> Result<String, RosenbridgeError> {
    let value = headers.get("x-client-id").and_then(|v| v.to_str().ok()).ok_or(RosenbridgeError::BadRequest)?;

    if value.is_empty() || value.len() > 100 || value.chars().any(|c| c.is_control()) {
        return Err(RosenbridgeError::BadRequest);
    }
    Ok(value.to_owned())
}

/// Runs the admission protocol of spec §4.7 once the transport handshake
/// has already completed (axum performs the WS handshake as part of the
/// upgrade itself, so step 3's "transport handshake" is this function's
/// call into [`crate::registry::BridgeRegistry::admit`]).
async fn admit_and_serve(state: Arc<NodeState>, client_id: String, socket: axum::extract::ws::WebSocket) {
    let bridge_id = uuid::Uuid::new_v4().to_string();
    let connected_at_ms = epoch_ms();

    // Step 1-2: directory-first insert.
    let row = DirectoryRow {
        bridge_id: bridge_id.clone(),
        client_id: client_id.clone(),
        node_addr: state.own_addr.clone(),
        connected_at_ms,
    };
    if let Err(err) = state.directory.insert(row, state.config.operation_timeout()).await {
        warn!(?err, "directory insert failed, aborting admission");
        return;
    }

    // Step 3: admit into the registry. On failure, best-effort compensating
    // delete; the reaper also covers this if the delete itself fails.
    let bridge = match state.registry.admit(bridge_id.clone(), client_id.clone(), socket).await {
        Ok(bridge) => bridge,
        Err(err) => {
            debug!(?err, "registry admission failed after directory insert, compensating");
            let directory = Arc::clone(&state.directory);
            let own_addr = state.own_addr.clone();
            let timeout = state.config.operation_timeout();
            tokio::spawn(async move {
                let _ = directory.delete_one(&bridge_id, &own_addr, timeout).await;
            });
            return;
        }
    };

    // Step 4: install the closure action (registry removal + directory
    // delete, exactly once).
    let directory = Arc::clone(&state.directory);
    let own_addr = state.own_addr.clone();
    let timeout = state.config.operation_timeout();
    let closure_bridge_id = bridge.bridge_id.clone();
    bridge
        .on_closure(Arc::new(move |_reason: String| {
            let directory = Arc::clone(&directory);
            let own_addr = own_addr.clone();
            let bridge_id = closure_bridge_id.clone();
            tokio::spawn(async move {
                let _ = directory.delete_one(&bridge_id, &own_addr, timeout).await;
            });
        }))
        .await;

    // `BridgeRegistry::remove` both de-indexes and calls `bridge.close`,
    // which is idempotent — safe to invoke again from inside the bridge's
    // own closure handler, where `close` has already run once.
    let registry = Arc::clone(&state.registry);
    let registry_bridge_id = bridge.bridge_id.clone();
    bridge
        .on_closure(Arc::new(move |_reason: String| {
            let registry = Arc::clone(&registry);
            let bridge_id = registry_bridge_id.clone();
            tokio::spawn(async move {
                registry.remove(&bridge_id).await;
            });
        }))
        .await;

    // Step 5: BRIDGE_CREATE_RESPONSE.
    let created = BridgeMessage::new(
        FrameType::BridgeCreateResponse,
        "",
        json!({
            "bridge_id": bridge.bridge_id,
            "client_id": bridge.client_id,
            "node_addr": state.own_addr,
            "created_at": connected_at_ms,
        }),
    );
    if bridge.send(&created).await.is_err() {
        return;
    }

    install_outgoing_handler(&state, &bridge).await;
}

/// Wires `OUTGOING_MESSAGE_REQ` frames from this bridge into the Fan-out
/// Orchestrator, replying with `OUTGOING_MESSAGE_RES` or `ERROR_RES`.
async fn install_outgoing_handler(state: &Arc<NodeState>, bridge: &Arc<crate::bridge::Bridge>) {
    let state = Arc::clone(state);
    let sender_id = bridge.client_id.clone();
    let reply_bridge = Arc::clone(bridge);

    bridge
        .on_message(Arc::new(move |frame: BridgeMessage| {
            if frame.kind != FrameType::OutgoingMessageReq {
                return;
            }
            let state = Arc::clone(&state);
            let sender_id = sender_id.clone();
            let reply_bridge = Arc::clone(&reply_bridge);
            let request_id = frame.request_id.clone();

            tokio::spawn(async move {
                let send_request: SendRequest = match serde_json::from_value(frame.body) {
                    Ok(req) => req,
                    Err(_) => {
                        let err = RosenbridgeError::BadRequest;
                        let error_frame = BridgeMessage::new(
                            FrameType::ErrorRes,
                            request_id,
                            serde_json::to_value(err.to_error_body("malformed request body")).unwrap_or_default(),
                        );
                        let _ = reply_bridge.send(&error_frame).await;
                        return;
                    }
                };

                let persist = send_request.persist.as_deref().map(PersistMode::parse).unwrap_or_default();
                let params = SendParams {
                    sender_id,
                    request_id: request_id.clone(),
                    receiver_ids: send_request.receiver_ids,
                    message: send_request.message,
                    persist,
                };

                match state.orchestrator.send(params).await {
                    Ok(response) => {
                        let frame = BridgeMessage::new(
                            FrameType::OutgoingMessageRes,
                            request_id,
                            serde_json::to_value(response).unwrap_or_default(),
                        );
                        let _ = reply_bridge.send(&frame).await;
                    }
                    Err(err) => {
                        let frame = BridgeMessage::new(
                            FrameType::ErrorRes,
                            request_id,
                            serde_json::to_value(err.to_error_body(err.to_string())).unwrap_or_default(),
                        );
                        let _ = reply_bridge.send(&frame).await;
                    }
                }
            });
        }))
        .await;
}

