//! JSON text-frame codec
//!
//! Every WebSocket text frame is one JSON object:
//!
//! ```json
//! {"type": "FETCH_FILES", "payload": {"repository_id": "r1"}, "request_id": "…", "epoch": 2}
//! ```
//!
//! `request_id` correlates a response with the request that caused it and
//! `epoch` names the client session the request belongs to. Both are absent
//! on frames the server sends unprompted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::messages::WireMessage;

/// Maximum accepted frame size (16 MB)
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Correlation identifier carried by a request and echoed by its responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A message plus its correlation envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<M> {
    pub message: M,
    pub request_id: Option<RequestId>,
    pub epoch: Option<u64>,
}

impl<M> Frame<M> {
    /// A frame not tied to any request
    pub fn unsolicited(message: M) -> Self {
        Self {
            message,
            request_id: None,
            epoch: None,
        }
    }

    /// A new request with a fresh correlation id
    pub fn request(message: M, epoch: u64) -> Self {
        Self {
            message,
            request_id: Some(RequestId::new()),
            epoch: Some(epoch),
        }
    }

    /// A frame answering `request`, echoing its correlation envelope
    pub fn reply_to<R>(message: M, request: &Frame<R>) -> Self {
        Self {
            message,
            request_id: request.request_id,
            epoch: request.epoch,
        }
    }
}

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown message type: {kind}")]
    UnknownKind { kind: String },

    #[error("Invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: String,
        request_id: Option<RequestId>,
        epoch: Option<u64>,
        #[source]
        source: serde_json::Error,
    },

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

impl CodecError {
    /// Whether the frame was well formed but named a kind this side does
    /// not know (forward-compatibility noise rather than corruption)
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, CodecError::UnknownKind { .. })
    }
}

/// Envelope as it appears on the wire, before the payload is typed
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    request_id: Option<RequestId>,
    #[serde(default)]
    epoch: Option<u64>,
}

/// Decode one text frame into a typed message
pub fn decode_frame<M: WireMessage>(text: &str) -> Result<Frame<M>, CodecError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let raw: RawFrame = serde_json::from_str(text)?;
    let kind = raw.kind.to_ascii_uppercase();

    if !M::is_known_kind(&kind) {
        return Err(CodecError::UnknownKind { kind });
    }

    let mut tagged = Map::new();
    tagged.insert("type".into(), Value::String(kind.clone()));
    if let Some(payload) = raw.payload {
        tagged.insert("payload".into(), payload);
    }

    let message = serde_json::from_value(Value::Object(tagged)).map_err(|source| {
        CodecError::InvalidPayload {
            kind,
            request_id: raw.request_id,
            epoch: raw.epoch,
            source,
        }
    })?;

    Ok(Frame {
        message,
        request_id: raw.request_id,
        epoch: raw.epoch,
    })
}

/// Encode a frame as JSON text
pub fn encode_frame<M: WireMessage>(frame: &Frame<M>) -> Result<String, CodecError> {
    let mut value = serde_json::to_value(&frame.message)?;
    if let Value::Object(map) = &mut value {
        if let Some(id) = frame.request_id {
            map.insert("request_id".into(), serde_json::to_value(id)?);
        }
        if let Some(epoch) = frame.epoch {
            map.insert("epoch".into(), Value::from(epoch));
        }
    }
    Ok(serde_json::to_string(&value)?)
}
