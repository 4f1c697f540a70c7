// Session-level error taxonomy.
//
// Every variant is recoverable: the lifecycle catches it at the session
// boundary, shows its `Display` text as the status line, and returns the role
// to `Idle`. Lower-level `ProtocolError`s and `MatchmakingError`s are folded
// in with the stage they happened in, so the same I/O failure reads as
// "handshake failed" during the handshake and "opponent disconnected" during
// the exchange.

use std::fmt;
use std::io;

use rochambeau_matchmaker::MatchmakingError;
use rochambeau_protocol::{ProtocolError, Role};
use thiserror::Error;

/// The blocking step a timeout happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Accepting,
    Handshake,
    LocalChoice,
    RemoteChoice,
    Matchmaking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Accepting => "waiting for an opponent to connect",
            Stage::Handshake => "exchanging names",
            Stage::LocalChoice => "waiting for your choice",
            Stage::RemoteChoice => "waiting for the opponent's choice",
            Stage::Matchmaking => "waiting for a match",
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The target refused the connection or could not be reached.
    #[error("Couldn't connect to {addr}")]
    PeerUnavailable {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The target string could not be parsed or resolved.
    #[error("Invalid address entered: {addr} ({reason})")]
    InvalidAddress { addr: String, reason: String },
    /// The host could not listen on its configured address.
    #[error("Couldn't listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The stream closed or failed before both names were exchanged.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
    /// The opponent disconnected during the choice exchange.
    #[error("Session aborted: {0}")]
    SessionAborted(String),
    /// The opponent sent something outside the protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    /// The matchmaker (or local validation) refused our identifier.
    #[error("Matchmaking rejected: {0}")]
    MatchmakingRejected(String),
    #[error("Timed out {0}")]
    TimedOut(Stage),
    #[error("Cancelled")]
    Cancelled,
    #[error("A {0} session is already running")]
    AlreadyRunning(Role),
    #[error("No {0} session is running")]
    NotRunning(Role),
    #[error("A choice was already committed this round")]
    ChoiceAlreadyCommitted,
    /// The opponent is not connected yet.
    #[error("Choices open once the opponent has connected")]
    ChoiceNotOpen,
}

impl SessionError {
    /// Classify a handshake-stage protocol failure.
    pub(crate) fn handshake(err: ProtocolError) -> Self {
        if err.is_timeout() {
            SessionError::TimedOut(Stage::Handshake)
        } else {
            match err {
                ProtocolError::Io(e) => SessionError::HandshakeFailed(e.to_string()),
                other => SessionError::ProtocolViolation(other.to_string()),
            }
        }
    }

    /// Classify an exchange-stage protocol failure.
    pub(crate) fn exchange(err: ProtocolError) -> Self {
        if err.is_timeout() {
            SessionError::TimedOut(Stage::RemoteChoice)
        } else if err.is_disconnect() {
            SessionError::SessionAborted("opponent disconnected".into())
        } else {
            match err {
                ProtocolError::Io(e) => SessionError::SessionAborted(e.to_string()),
                other => SessionError::ProtocolViolation(other.to_string()),
            }
        }
    }
}

impl From<MatchmakingError> for SessionError {
    fn from(err: MatchmakingError) -> Self {
        match err {
            MatchmakingError::InvalidIdentifier(reason) | MatchmakingError::Rejected(reason) => {
                SessionError::MatchmakingRejected(reason)
            }
            MatchmakingError::Unreachable { addr, source } => {
                SessionError::PeerUnavailable { addr, source }
            }
            MatchmakingError::TimedOut => SessionError::TimedOut(Stage::Matchmaking),
            MatchmakingError::Protocol(e) => SessionError::ProtocolViolation(e.to_string()),
        }
    }
}
