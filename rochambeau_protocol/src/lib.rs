// rochambeau_protocol: rules and wire protocol for Rochambeau matches.
//
// This crate defines the game's value types, the pure outcome evaluator, and
// the framing and message types used on both TCP sockets: the gameplay socket
// between two peers and the matchmaking socket between a player and the
// matchmaker. It is shared by `rochambeau_matchmaker` and `rochambeau_peer`
// and does no networking of its own.
//
// Module overview:
// - `types.rs`:    `Choice`, `Role`, `PeerIdentity`, `MatchResult`.
// - `outcome.rs`:  `evaluate(local, remote)`, the round's only rule.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then payload.
// - `message.rs`:  `PeerMessage` (gameplay), `JoinRequest` / `MatchReply`
//                  (matchmaking), and JSON send/receive helpers.
// - `error.rs`:    `ProtocolError`.
//
// Design decisions:
// - **JSON payloads.** Messages are tiny and only two cross per direction per
//   match, so readability wins over compactness.
// - **No async runtime.** Framing uses `std::io::Read`/`Write`, so it works on
//   blocking `TcpStream`s, buffered wrappers and in-memory cursors alike.

pub mod error;
pub mod framing;
pub mod message;
pub mod outcome;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{JoinRequest, MatchReply, PeerMessage, recv_message, send_message};
pub use outcome::evaluate;
pub use types::{
    Choice, DEFAULT_DISPLAY_NAME, MAX_DISPLAY_NAME_CHARS, MatchResult, PeerIdentity, Role,
};

/// Default port for the gameplay socket between two peers.
pub const DEFAULT_GAMEPLAY_PORT: u16 = 5555;

/// Default port for the matchmaking service.
pub const DEFAULT_MATCHMAKING_PORT: u16 = 5556;
