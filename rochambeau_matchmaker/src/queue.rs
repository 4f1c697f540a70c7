// Matchmaking queue: FIFO of waiting players and the pairing step.
//
// `MatchmakingQueue` holds `MatchRequest`s in arrival order. `server.rs` keeps
// it behind a single `Mutex` and runs "enqueue, prune, pair, notify" while
// holding that lock, so a later arrival can never be interleaved into a
// pairing already in progress. The queue itself does no locking.
//
// Every request leaves the queue exactly once: either through `pair_next`
// (the two oldest entries, earliest becomes host) or through
// `prune_disconnected` when its holder has already hung up.
//
// Notifying a pair writes one `MatchReply` to each connection and then drops
// both streams, closing the matchmaker's side. Gameplay uses a separate
// connection opened by the players themselves.

use std::collections::VecDeque;
use std::io::{self, BufWriter};
use std::net::TcpStream;

use log::{debug, info, warn};
use rochambeau_protocol::message::{MatchReply, send_message};

/// Identifiers longer than this many bytes are rejected.
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Check an identifier received from (or about to be sent by) a client.
/// Returns the trimmed identifier, or the rejection reason.
pub fn validate_identifier(raw: &str) -> Result<&str, String> {
    let identifier = raw.trim();
    if identifier.is_empty() {
        return Err("empty identifier".into());
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "identifier too long: {} bytes (max {MAX_IDENTIFIER_LEN})",
            identifier.len()
        ));
    }
    if identifier.chars().any(char::is_control) {
        return Err("identifier contains control characters".into());
    }
    Ok(identifier)
}

/// A waiting participant: their identifier plus the connection used to tell
/// them their role.
pub struct MatchRequest {
    pub identifier: String,
    /// Arrival order, assigned by the queue.
    pub arrival: u64,
    stream: TcpStream,
}

impl MatchRequest {
    /// Whether the holder is still connected. Peeks the socket without
    /// blocking: a zero-length peek is an orderly close.
    fn is_connected(&self) -> bool {
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut byte = [0u8; 1];
        let alive = match self.stream.peek(&mut byte) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        };
        alive && self.stream.set_nonblocking(false).is_ok()
    }

    fn notify(&self, reply: &MatchReply) -> Result<(), String> {
        let mut writer = BufWriter::new(&self.stream);
        send_message(&mut writer, reply).map_err(|e| e.to_string())
    }
}

/// Two requests taken from the front of the queue.
pub struct Pairing {
    /// Earlier arrival.
    pub host: MatchRequest,
    /// Later arrival.
    pub guest: MatchRequest,
}

/// What happened when a pairing was delivered.
#[derive(Debug, PartialEq)]
pub enum PairingOutcome {
    /// Both players were told their roles.
    Notified { host: String, guest: String },
    /// The host could not be told; the guest was put back at the front.
    HostLost { host: String, requeued: String },
    /// The host was told but the guest could not be.
    GuestLost { host: String, guest: String },
}

/// FIFO of players waiting for an opponent.
#[derive(Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<MatchRequest>,
    next_arrival: u64,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Identifiers of waiting players, oldest first.
    pub fn identifiers(&self) -> Vec<String> {
        self.waiting.iter().map(|r| r.identifier.clone()).collect()
    }

    /// Append a request and return its arrival number.
    pub fn enqueue(&mut self, identifier: String, stream: TcpStream) -> u64 {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.waiting.push_back(MatchRequest {
            identifier,
            arrival,
            stream,
        });
        arrival
    }

    /// Drop requests whose holder has disconnected. Returns their identifiers.
    pub fn prune_disconnected(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        self.waiting.retain(|request| {
            let keep = request.is_connected();
            if !keep {
                removed.push(request.identifier.clone());
            }
            keep
        });
        removed
    }

    /// Take the two oldest requests, if there are at least two.
    pub fn pair_next(&mut self) -> Option<Pairing> {
        if self.waiting.len() < 2 {
            return None;
        }
        let host = self.waiting.pop_front()?;
        let guest = self.waiting.pop_front()?;
        Some(Pairing { host, guest })
    }

    /// Send each half of a pairing its role. The host learns only that it
    /// hosts; the guest learns the host's identifier. Both connections are
    /// closed afterwards, except a guest requeued because its host vanished.
    pub fn deliver(&mut self, pairing: Pairing) -> PairingOutcome {
        let Pairing { host, guest } = pairing;

        if let Err(e) = host.notify(&MatchReply::Host) {
            warn!(
                "[Matchmaking] Could not notify host {}: {e}; requeueing {}",
                host.identifier, guest.identifier
            );
            let requeued = guest.identifier.clone();
            self.waiting.push_front(guest);
            return PairingOutcome::HostLost {
                host: host.identifier,
                requeued,
            };
        }

        let reply = MatchReply::Guest {
            host_identifier: host.identifier.clone(),
        };
        if let Err(e) = guest.notify(&reply) {
            warn!(
                "[Matchmaking] Host {} notified but guest {} unreachable: {e}",
                host.identifier, guest.identifier
            );
            info!(
                "[Matchmaking] Host {} stays assigned; it gives up after its accept timeout",
                host.identifier
            );
            return PairingOutcome::GuestLost {
                host: host.identifier,
                guest: guest.identifier,
            };
        }

        debug!(
            "[Matchmaking] Paired host {} (#{}) with guest {} (#{})",
            host.identifier, host.arrival, guest.identifier, guest.arrival
        );
        PairingOutcome::Notified {
            host: host.identifier,
            guest: guest.identifier,
        }
    }

    /// Pair and notify until fewer than two requests remain. Disconnected
    /// holders are pruned first so they are never paired.
    pub fn pair_all(&mut self) -> Vec<PairingOutcome> {
        for gone in self.prune_disconnected() {
            debug!("[Matchmaking] Dropped disconnected request from {gone}");
        }
        let mut outcomes = Vec::new();
        while let Some(pairing) = self.pair_next() {
            outcomes.push(self.deliver(pairing));
        }
        outcomes
    }
}
