//! The wire protocol: the small closed set of JSON envelopes exchanged
//! over the signaling WebSocket (spec.md section 6.2). The server
//! never inspects SDP or candidate payload bytes -- Offer, Answer and
//! Candidate are round-tripped opaquely.

use serde::{Deserialize, Serialize};

/// The two sides of the WebRTC SDP handshake. Carries `type` alongside
/// `sdp` because clients re-serialize this object directly into
/// `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

/// An ICE connectivity candidate. Opaque to the server beyond its
/// shape -- forwarded byte-for-byte to the addressed peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u16,
}

/// Parsed `role` field of a `roomInitiation` message (spec.md 4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Participant,
}

/// Parses the raw `role` string. Kept separate from serde so an
/// unrecognized role (e.g. "admin") reaches the `roomInitiation`
/// handler as data rather than failing JSON decode -- spec.md 4.4.2
/// wants `{success:false, message:"Invalid role"}`, not the generic
/// "Incorrect message format" decode error.
pub fn parse_role(raw: &str) -> Option<Role> {
    match raw {
        "creator" => Some(Role::Creator),
        "participant" => Some(Role::Participant),
        _ => None,
    }
}

/// Frames a client may send. Deserialized from one JSON text frame per
/// spec.md 6.2; only the fields relevant to `type` are populated by a
/// well-behaved client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "initiation")]
    Initiation { name: String },
    #[serde(rename = "roomInitiation")]
    RoomInitiation { room_id: String, role: String },
    #[serde(rename = "offer")]
    Offer { name: String, offer: Offer },
    #[serde(rename = "answer")]
    Answer { name: String, answer: Answer },
    #[serde(rename = "candidate")]
    Candidate { name: String, candidate: Candidate },
    #[serde(rename = "leaveRoom")]
    LeaveRoom,
}

/// Frames the server may send (spec.md 6.2, server -> client list).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "initiation")]
    Initiation {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "roomInitiation")]
    RoomInitiation {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        participants: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "offer")]
    Offer { name: String, offer: Offer },
    #[serde(rename = "answer")]
    Answer { name: String, answer: Answer },
    #[serde(rename = "candidate")]
    Candidate { name: String, candidate: Candidate },
    #[serde(rename = "peerLeavingRoom")]
    PeerLeavingRoom { name: String, room_destroy: bool },
    #[serde(rename = "leaveConfirmed")]
    LeaveConfirmed { success: bool, message: String },
    #[serde(rename = "error")]
    Error { success: bool, message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            success: false,
            message: message.into(),
        }
    }

    /// Serializes to the JSON text that goes out on the wire. Only
    /// fails for values that can't occur in these variants (e.g. NaN
    /// floats), so callers treat this as infallible.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }
}

/// Decodes one incoming text frame. Malformed JSON or an unrecognized
/// `type` both surface as `DecodeError` (spec.md 4.3 step 2, 7).
#[derive(Debug)]
pub enum DecodeError {
    /// JSON parse failure, or a recognized `type` with missing/wrong
    /// fields.
    Malformed,
    /// Valid JSON envelope, but `type` is outside the closed set.
    UnknownCommand,
}

pub fn decode(text: &str) -> Result<ClientMessage, DecodeError> {
    // Distinguish "valid JSON but unknown type" from "not even valid
    // JSON" so the dispatcher can reply with the right message
    // (spec.md 4.4 "Unrecognized command" vs 4.3 step 2 "Incorrect
    // message format").
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| DecodeError::Malformed)?;
    let is_known_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(|t| {
            matches!(
                t,
                "initiation" | "roomInitiation" | "offer" | "answer" | "candidate" | "leaveRoom"
            )
        })
        .unwrap_or(false);

    if !is_known_type {
        return Err(DecodeError::UnknownCommand);
    }

    serde_json::from_value(value).map_err(|_| DecodeError::Malformed)
}
