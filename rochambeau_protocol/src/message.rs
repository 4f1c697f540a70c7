// Protocol messages for the gameplay and matchmaking sockets.
//
// Gameplay socket (`PeerMessage`): exactly two messages cross in each
// direction per match, a `DisplayName` during the handshake and a `Choice`
// during the exchange. The choice travels as a string token rather than the
// `Choice` enum so that an out-of-domain token can be reported as a protocol
// violation instead of a generic decode error.
//
// Matchmaking socket: the client sends one `JoinRequest`; the service answers
// with one `MatchReply`. `MatchReply::Host` serializes as the literal JSON
// string `"host"`, and a guest reply carries the host's identifier in its own
// field, so an identifier that happens to be the text "host" is never
// mistaken for the host marker.
//
// `send_message` / `recv_message` combine JSON with the framing in
// `framing.rs`.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::framing::{read_frame, write_frame};
use crate::types::{Choice, PeerIdentity};

/// Messages exchanged between the two players of a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Handshake: the sender's display name.
    DisplayName { name: String },
    /// Exchange: the sender's committed choice token.
    Choice { token: String },
}

impl PeerMessage {
    pub fn display_name(identity: &PeerIdentity) -> Self {
        PeerMessage::DisplayName {
            name: identity.name().to_string(),
        }
    }

    pub fn choice(choice: Choice) -> Self {
        PeerMessage::Choice {
            token: choice.token().to_string(),
        }
    }

    /// Extract the opponent's display name, normalized.
    pub fn into_identity(self) -> Result<PeerIdentity, ProtocolError> {
        match self {
            PeerMessage::DisplayName { name } => Ok(PeerIdentity::new(&name)),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "DisplayName",
                got: other.kind().to_string(),
            }),
        }
    }

    /// Extract and validate the opponent's choice.
    pub fn into_choice(self) -> Result<Choice, ProtocolError> {
        match self {
            PeerMessage::Choice { token } => token.parse(),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "Choice",
                got: other.kind().to_string(),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PeerMessage::DisplayName { .. } => "DisplayName",
            PeerMessage::Choice { .. } => "Choice",
        }
    }
}

/// Sent once by a client right after connecting to the matchmaker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub identifier: String,
}

/// The matchmaker's single answer to a `JoinRequest`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchReply {
    /// This client is the host and should start listening.
    #[serde(rename = "host")]
    Host,
    /// This client is the guest; `host_identifier` names the host to reach.
    Guest { host_identifier: String },
    /// The request was refused (e.g. empty identifier).
    Rejected { reason: String },
}

/// Serialize a message to JSON and write it as one frame.
pub fn send_message<W: Write, M: Serialize>(writer: &mut W, msg: &M) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    write_frame(writer, &json)?;
    Ok(())
}

/// Read one frame and deserialize it as `M`.
pub fn recv_message<R: Read, M: DeserializeOwned>(reader: &mut R) -> Result<M, ProtocolError> {
    let bytes = read_frame(reader)?;
    Ok(serde_json::from_slice(&bytes)?)
}
