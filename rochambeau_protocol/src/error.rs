// Error type for decoding and sending protocol messages.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Framing or socket failure (including `UnexpectedEof` on a closed
    /// stream).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The frame payload was not a valid JSON message.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// A choice token outside rock/paper/scissors.
    #[error("unknown choice token {0:?}")]
    UnknownChoice(String),
    /// A well-formed message arrived where a different kind was expected.
    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: String,
    },
}

impl ProtocolError {
    /// True when the underlying stream was closed or reset by the peer.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }

    /// True when a read timed out (`set_read_timeout` expiry).
    pub fn is_timeout(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
