// rochambeau_peer: one player's side of a Rochambeau match.
//
// A match is a single round between two peers over a direct TCP connection:
// the host listens, the guest connects, they swap display names, each locks
// in a choice, both choices are revealed, and each side evaluates the result
// locally. Roles come either from the user (host / join an address) or from
// the matchmaker (`rochambeau_matchmaker`).
//
// Module overview:
// - `lifecycle.rs`:    `SessionController`, the UI-facing surface; one slot
//                      per role, running flag, worker threads.
// - `session.rs`:      The worker's state machine (`SessionState`),
//                      `SessionControls`, `RoundOutcome`.
// - `connection.rs`:   `Connection` (framed gameplay stream), `HostListener`,
//                      guest `connect` / `connect_with_retry`.
// - `handshake.rs`:    Display-name exchange.
// - `exchange.rs`:     Simultaneous-reveal choice exchange.
// - `signal.rs`:       `Signal<T>` and `CancelToken`, the UI-to-worker
//                      rendezvous.
// - `presentation.rs`: `Presentation` trait the worker reports through.
// - `accounts.rs`:     `LocalPlayer`, `AccountStore`, `Scoreboard`.
// - `config.rs`:       `PeerConfig` (addresses and timeouts).
// - `error.rs`:        `SessionError`, `Stage`.
//
// Threading model: the UI thread calls `SessionController` methods, which
// never block on the network except `join_matchmaking`. Each session runs on
// its own worker thread that owns the gameplay socket. The two sides meet
// only through `SessionControls` and the `Presentation` trait.

pub mod accounts;
pub mod config;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod handshake;
pub mod lifecycle;
pub mod presentation;
pub mod session;
pub mod signal;

pub use accounts::{AccountStore, LocalPlayer, NoAccounts, PlayerStats, RoundRecord, Scoreboard};
pub use config::PeerConfig;
pub use error::{SessionError, Stage};
pub use lifecycle::SessionController;
pub use presentation::{NullPresentation, Presentation};
pub use session::{RoundOutcome, SessionControls, SessionState};
