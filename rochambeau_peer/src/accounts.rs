// Account boundary: who the local player is and where round results go.
//
// `AccountStore::record_round` is called once per completed round, after the
// result is known and before the exit-acknowledgment wait, never from inside
// a blocking protocol step. Credential checks and durable storage live
// behind this trait in the embedding application; `Scoreboard` is an
// in-memory implementation with the same counters and leaderboard ordering.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use rochambeau_protocol::{MatchResult, PeerIdentity};

/// The local participant: a stable account id plus a display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPlayer {
    pub user_id: String,
    pub display_name: String,
}

impl LocalPlayer {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Normalized identity sent during the handshake.
    pub fn identity(&self) -> PeerIdentity {
        PeerIdentity::new(&self.display_name)
    }
}

/// One completed round, from `player_id`'s point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub player_id: String,
    pub opponent: PeerIdentity,
    pub result: MatchResult,
}

pub trait AccountStore: Send + Sync {
    fn record_round(&self, record: &RoundRecord);
}

/// Store that records nothing.
pub struct NoAccounts;

impl AccountStore for NoAccounts {
    fn record_round(&self, _record: &RoundRecord) {}
}

/// Per-player counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    /// +1 per win, -1 per loss.
    pub score: i64,
}

impl PlayerStats {
    fn apply(&mut self, result: MatchResult) {
        match result {
            MatchResult::Win => self.wins += 1,
            MatchResult::Loss => self.losses += 1,
            MatchResult::Tie => self.ties += 1,
        }
        self.score += result.score_delta();
    }
}

/// In-memory account store with a leaderboard.
#[derive(Default)]
pub struct Scoreboard {
    players: Mutex<BTreeMap<String, PlayerStats>>,
    history: Mutex<Vec<RoundRecord>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, player_id: &str) -> Option<PlayerStats> {
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player_id)
            .copied()
    }

    /// All players, highest score first; ties broken by id.
    pub fn leaderboard(&self) -> Vec<(String, PlayerStats)> {
        let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<(String, PlayerStats)> =
            players.iter().map(|(id, s)| (id.clone(), *s)).collect();
        rows.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));
        rows
    }

    /// Every recorded round, oldest first.
    pub fn history(&self) -> Vec<RoundRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AccountStore for Scoreboard {
    fn record_round(&self, record: &RoundRecord) {
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(record.player_id.clone())
            .or_default()
            .apply(record.result);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}
