// Core value types shared by the matchmaker and the peer session crates.
//
// `Choice` and `Role` are small closed enums. `PeerIdentity` is the display
// name exchanged during the handshake; it is normalized on construction so
// every consumer sees the same defaulting and length rules. `MatchResult` is
// always relative to the local participant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Name used when a participant leaves their display name empty.
pub const DEFAULT_DISPLAY_NAME: &str = "Default";

/// Display names longer than this (in chars) are truncated.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// One of the three hand shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// The single choice this one defeats.
    pub fn beats(self) -> Choice {
        match self {
            Choice::Rock => Choice::Scissors,
            Choice::Paper => Choice::Rock,
            Choice::Scissors => Choice::Paper,
        }
    }

    /// Lowercase wire token.
    pub fn token(self) -> &'static str {
        match self {
            Choice::Rock => "rock",
            Choice::Paper => "paper",
            Choice::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Choice {
    type Err = ProtocolError;

    /// Case-insensitive, ignores surrounding whitespace. Anything outside the
    /// three tokens is an error, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Choice::ALL
            .into_iter()
            .find(|c| c.token() == normalized)
            .ok_or_else(|| ProtocolError::UnknownChoice(s.to_string()))
    }
}

/// Session role. Fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Listens for and accepts the single inbound connection.
    Host,
    /// Initiates the outbound connection.
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Guest => f.write_str("guest"),
        }
    }
}

/// Unauthenticated display name of a participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Trims the name, substitutes `DEFAULT_DISPLAY_NAME` for an empty value
    /// and truncates to `MAX_DISPLAY_NAME_CHARS`.
    pub fn new(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Self(DEFAULT_DISPLAY_NAME.to_string());
        }
        Self(trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a round from the local participant's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    Tie,
    Win,
    Loss,
}

impl MatchResult {
    /// The same round seen from the opponent's side.
    pub fn inverse(self) -> MatchResult {
        match self {
            MatchResult::Tie => MatchResult::Tie,
            MatchResult::Win => MatchResult::Loss,
            MatchResult::Loss => MatchResult::Win,
        }
    }

    /// Leaderboard points awarded for this result.
    pub fn score_delta(self) -> i64 {
        match self {
            MatchResult::Win => 1,
            MatchResult::Tie => 0,
            MatchResult::Loss => -1,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            MatchResult::Win => "You won the game!",
            MatchResult::Loss => "You lost the game!",
            MatchResult::Tie => "The game was a tie!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_parses_case_insensitively() {
        assert_eq!("ROCK".parse::<Choice>().unwrap(), Choice::Rock);
        assert_eq!(" Paper\n".parse::<Choice>().unwrap(), Choice::Paper);
        assert_eq!("scissors".parse::<Choice>().unwrap(), Choice::Scissors);
    }

    #[test]
    fn unknown_choice_token_is_rejected() {
        let err = "lizard".parse::<Choice>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownChoice(ref t) if t == "lizard"));
        assert!("".parse::<Choice>().is_err());
    }

    #[test]
    fn choice_display_matches_token() {
        for choice in Choice::ALL {
            assert_eq!(choice.to_string(), choice.token());
            assert_eq!(choice.token().parse::<Choice>().unwrap(), choice);
        }
    }

    #[test]
    fn empty_identity_defaults() {
        assert_eq!(PeerIdentity::new("").name(), DEFAULT_DISPLAY_NAME);
        assert_eq!(PeerIdentity::new("   ").name(), DEFAULT_DISPLAY_NAME);
        assert_eq!(PeerIdentity::new(" Alice ").name(), "Alice");
    }

    #[test]
    fn long_identity_truncated_on_char_boundary() {
        let long: String = "é".repeat(MAX_DISPLAY_NAME_CHARS + 10);
        let id = PeerIdentity::new(&long);
        assert_eq!(id.name().chars().count(), MAX_DISPLAY_NAME_CHARS);
    }

    #[test]
    fn result_inverse_and_score() {
        assert_eq!(MatchResult::Win.inverse(), MatchResult::Loss);
        assert_eq!(MatchResult::Loss.inverse(), MatchResult::Win);
        assert_eq!(MatchResult::Tie.inverse(), MatchResult::Tie);
        assert_eq!(MatchResult::Win.score_delta(), 1);
        assert_eq!(MatchResult::Tie.score_delta(), 0);
        assert_eq!(MatchResult::Loss.score_delta(), -1);
    }
}
