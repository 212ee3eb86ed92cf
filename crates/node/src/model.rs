// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire and domain types shared across the bridge routing engine.

use serde::{Deserialize, Serialize};

/// Frame type vocabulary for the client bridge protocol (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    BridgeCreateResponse,
    OutgoingMessageReq,
    OutgoingMessageRes,
    IncomingMessageReq,
    ErrorRes,
}

/// A framed bridge message: `{type, request_id, body}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    #[serde(rename = "type")]
    pub kind: FrameType,
    pub request_id: String,
    pub body: serde_json::Value,
}

impl BridgeMessage {
    pub fn new(kind: FrameType, request_id: impl Into<String>, body: serde_json::Value) -> Self {
        Self { kind, request_id: request_id.into(), body }
    }
}

/// Persistence policy carried on a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    #[default]
    False,
    True,
    IfError,
}

impl PersistMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "true" => Self::True,
            "if_error" => Self::IfError,
            _ => Self::False,
        }
    }
}

/// Body of `OUTGOING_MESSAGE_REQ` / `POST /api/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub receiver_ids: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub persist: Option<String>,
}

/// Response codes surfaced on a per-bridge delivery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCodeTag {
    Ok,
    Offline,
    BridgeNotFound,
    Unauthorized,
    Timeout,
    Transport,
    Internal,
}

/// Outcome of a delivery attempt to one bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge_id: String,
    pub client_id: String,
    pub code: StatusCodeTag,
    pub reason: String,
}

impl BridgeStatus {
    pub fn ok(bridge_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            client_id: client_id.into(),
            code: StatusCodeTag::Ok,
            reason: "delivered".to_owned(),
        }
    }

    pub fn with_code(
        bridge_id: impl Into<String>,
        client_id: impl Into<String>,
        code: StatusCodeTag,
        reason: impl Into<String>,
    ) -> Self {
        Self { bridge_id: bridge_id.into(), client_id: client_id.into(), code, reason: reason.into() }
    }
}

/// Outcome of the persistence decision (spec §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceCode {
    Ok,
    NotRequested,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceOutcome {
    pub code: PersistenceCode,
    pub reason: String,
}

impl PersistenceOutcome {
    pub fn not_requested() -> Self {
        Self { code: PersistenceCode::NotRequested, reason: "persist mode is false".to_owned() }
    }

    pub fn ok() -> Self {
        Self { code: PersistenceCode::Ok, reason: "archived".to_owned() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { code: PersistenceCode::Failed, reason: reason.into() }
    }
}

/// Aggregated response to a send request (spec §3 "Send Response").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub code: StatusCodeTag,
    pub persistence: PersistenceOutcome,
    pub statuses: Vec<BridgeStatus>,
}

/// Cluster-shared mapping row: client_id -> (bridge_id, node_addr).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryRow {
    pub bridge_id: String,
    pub client_id: String,
    pub node_addr: String,
    pub connected_at_ms: u64,
}

/// An archived message, written when persistence is requested or required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub request_id: String,
    pub receiver_ids: Vec<String>,
    pub message: String,
    pub persist: PersistMode,
    pub created_at_ms: u64,
}

/// Identifies a bridge independent of which node hosts it. Used in-process
/// (directory rows, partitioning) — never serialized onto the wire as-is;
/// the internal-delivery wire body only ever carries bare bridge-ids
/// (spec §6 "Body = {sender_id, bridge_ids:[string], message:string}").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BridgeIdentity {
    pub bridge_id: String,
    pub client_id: String,
}

/// A delivery target for the Local Deliverer. `expected_client_id` is the
/// "owner constraint" of spec §4.5 step 3 — present for in-process
/// dispatch (the orchestrator already resolved the owning client from the
/// directory), absent when the target arrived over the internal-delivery
/// wire, which does not carry per-bridge client-ids.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub bridge_id: String,
    pub expected_client_id: Option<String>,
}

/// Wire body for `POST /api/internal/message` (spec §6). `request_id` and
/// `sender_id` are also propagated as the `x-request-id`/`x-client-id`
/// headers per spec; `sender_id` is duplicated in the body because the
/// spec's documented shape includes it there too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageInternalParams {
    pub sender_id: String,
    pub bridge_ids: Vec<String>,
    pub message: String,
}

/// Response to an internal-delivery RPC: just the per-bridge outcomes for
/// the bridge-ids that peer was asked about, plus that peer's overall code
/// (spec §4.6 step 4 "peer returned with non-OK overall code").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalMessageResponse {
    pub code: StatusCodeTag,
    pub statuses: Vec<BridgeStatus>,
}

// BridgeIdentity needs manual (de)serialize since it isn't tagged; derive works fine with serde.
impl Serialize for BridgeIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Repr<'a> {
            bridge_id: &'a str,
            client_id: &'a str,
        }
        Repr { bridge_id: &self.bridge_id, client_id: &self.client_id }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BridgeIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Repr {
            bridge_id: String,
            client_id: String,
        }
        let repr = Repr::deserialize(deserializer)?;
        Ok(Self { bridge_id: repr.bridge_id, client_id: repr.client_id })
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
