// Outcome evaluation: maps (local, remote) choices to a `MatchResult`.
//
// Pure and total over the `Choice` domain. Both peers run it independently on
// the same pair of choices (mirrored), so the two results are always
// complementary.

use crate::types::{Choice, MatchResult};

/// Evaluate a round from the local participant's point of view.
pub fn evaluate(local: Choice, remote: Choice) -> MatchResult {
    if local == remote {
        MatchResult::Tie
    } else if local.beats() == remote {
        MatchResult::Win
    } else {
        MatchResult::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winning_pairs() {
        assert_eq!(evaluate(Choice::Scissors, Choice::Paper), MatchResult::Win);
        assert_eq!(evaluate(Choice::Rock, Choice::Scissors), MatchResult::Win);
        assert_eq!(evaluate(Choice::Paper, Choice::Rock), MatchResult::Win);
    }

    #[test]
    fn losing_pairs() {
        assert_eq!(evaluate(Choice::Paper, Choice::Scissors), MatchResult::Loss);
        assert_eq!(evaluate(Choice::Scissors, Choice::Rock), MatchResult::Loss);
        assert_eq!(evaluate(Choice::Rock, Choice::Paper), MatchResult::Loss);
    }

    #[test]
    fn same_choice_ties() {
        for c in Choice::ALL {
            assert_eq!(evaluate(c, c), MatchResult::Tie);
        }
    }

    #[test]
    fn results_are_complementary() {
        for a in Choice::ALL {
            for b in Choice::ALL {
                assert_eq!(evaluate(a, b), evaluate(b, a).inverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn each_choice_beats_one_and_loses_to_one() {
        for a in Choice::ALL {
            let wins = Choice::ALL
                .iter()
                .filter(|&&b| evaluate(a, b) == MatchResult::Win)
                .count();
            let losses = Choice::ALL
                .iter()
                .filter(|&&b| evaluate(a, b) == MatchResult::Loss)
                .count();
            assert_eq!((wins, losses), (1, 1), "{a}");
        }
    }
}
