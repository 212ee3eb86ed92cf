// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers: directory lookup, the HTTP equivalent of a send, the
//! intra-cluster internal-delivery endpoint, and liveness.

use std::sync::Arc;

use axum::extract::State;
use axum_extra::extract::Query;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::validate_basic;
use crate::error::RosenbridgeError;
use crate::model::{DeliveryTarget, DirectoryRow, InternalMessageResponse, PersistMode, PostMessageInternalParams, SendRequest, StatusCodeTag};
use crate::orchestrator::SendParams;
use crate::state::NodeState;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub code: &'static str,
}

/// `GET /api` — liveness.
pub async fn liveness() -> impl IntoResponse {
    Json(LivenessResponse { code: "OK" })
}

#[derive(Debug, Deserialize)]
pub struct BridgesQuery {
    #[serde(default)]
    pub client_id: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BridgesResponse {
    pub rows: Vec<DirectoryRow>,
}

/// `GET /api/bridges?client_id=...&client_id=...` — list Directory Rows.
pub async fn list_bridges(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<BridgesQuery>,
) -> Result<impl IntoResponse, RosenbridgeError> {
    let (rows, _not_found) = state.directory.get_by_client_ids(&query.client_id, state.config.operation_timeout()).await?;
    Ok(Json(BridgesResponse { rows }))
}

/// `POST /api/messages` — HTTP equivalent of `OUTGOING_MESSAGE_REQ`.
///
/// `sender_id` comes from the `x-client-id` header, matching the bridge
/// protocol's convention that the sender is the connection's owner.
pub async fn post_message(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> Result<impl IntoResponse, RosenbridgeError> {
    let sender_id =
        headers.get("x-client-id").and_then(|v| v.to_str().ok()).ok_or(RosenbridgeError::BadRequest)?.to_owned();
    let request_id =
        headers.get("x-request-id").and_then(|v| v.to_str().ok()).map(str::to_owned).unwrap_or_default();

    let persist = body.persist.as_deref().map(PersistMode::parse).unwrap_or_default();
    let params = SendParams { sender_id, request_id, receiver_ids: body.receiver_ids, message: body.message, persist };

    let response = state.orchestrator.send(params).await?;
    Ok(Json(response))
}

/// `POST /api/internal/message` — intra-cluster delivery invocation
/// (spec §4.5), protected by shared cluster basic-auth credential.
pub async fn post_internal_message(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(body): Json<PostMessageInternalParams>,
) -> Result<impl IntoResponse, RosenbridgeError> {
    validate_basic(&headers, &state.credential)?;
    let request_id =
        headers.get("x-request-id").and_then(|v| v.to_str().ok()).map(str::to_owned).unwrap_or_default();

    let targets = body
        .bridge_ids
        .into_iter()
        .map(|bridge_id| DeliveryTarget { bridge_id, expected_client_id: None })
        .collect();

    let statuses = state
        .orchestrator
        .deliver_local(crate::deliverer::LocalDelivererInput {
            sender_id: body.sender_id,
            request_id,
            targets,
            message: body.message,
        })
        .await;

    Ok(Json(InternalMessageResponse { code: StatusCodeTag::Ok, statuses }))
}
