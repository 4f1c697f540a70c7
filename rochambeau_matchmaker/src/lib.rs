// rochambeau_matchmaker: rendezvous service that pairs waiting players.
//
// Players connect, send one identifier, and wait. Whenever two are waiting,
// the earlier arrival is told to host and the later one is told the host's
// identifier so it can connect as guest. The service only assigns roles; the
// match itself is played over a direct peer connection (`rochambeau_peer`).
//
// Module overview:
// - `queue.rs`:   `MatchmakingQueue` (FIFO of `MatchRequest`s), identifier
//                 validation, pairing and notification.
// - `server.rs`:  TCP listener, per-connection reader threads, the shared
//                 queue lock, and `start_matchmaker` / `MatchmakerHandle`.
// - `client.rs`:  `join_matchmaking()` for players, `MatchAssignment`,
//                 `MatchmakingError`.
//
// Dependencies: `rochambeau_protocol` (messages and framing).
//
// The service can run as a standalone binary (`main.rs`) or be embedded in a
// player's process via `start_matchmaker`, so a host can be its own
// matchmaking server.

pub mod client;
pub mod queue;
pub mod server;

pub use client::{MatchAssignment, MatchmakingError, join_matchmaking};
pub use server::{MatchmakerConfig, MatchmakerHandle, start_matchmaker};
