// End-to-end match tests.
//
// Each test runs real `SessionController`s (via `ScriptedPlayer`) over
// localhost TCP and checks what both players saw: the outcome, the
// presentation updates, the lifecycle states, and the recorded scores.

use std::thread;
use std::time::{Duration, Instant};

use match_tests::{ScriptedPlayer, free_port, test_config};
use rochambeau_matchmaker::{MatchAssignment, MatchmakerConfig, start_matchmaker};
use rochambeau_peer::{PeerConfig, SessionError, SessionState};
use rochambeau_protocol::{Choice, MatchResult, Role};

const FULL_ROUND: [SessionState; 8] = [
    SessionState::Connecting,
    SessionState::Handshaking,
    SessionState::AwaitingLocalChoice,
    SessionState::AwaitingRemoteChoice,
    SessionState::ResultReady,
    SessionState::AwaitingExitAck,
    SessionState::Closed,
    SessionState::Idle,
];

/// Host and guest each play `choice` in parallel; returns both outcomes.
fn play_match(
    host: &ScriptedPlayer,
    host_choice: Choice,
    guest: &ScriptedPlayer,
    guest_choice: Choice,
) -> (
    Result<rochambeau_peer::RoundOutcome, SessionError>,
    Result<rochambeau_peer::RoundOutcome, SessionError>,
) {
    let addr = host.host();
    thread::scope(|s| {
        let host_side = s.spawn(|| host.play(Role::Host, host_choice));
        guest.join(&addr.to_string());
        let guest_out = guest.play(Role::Guest, guest_choice);
        (host_side.join().unwrap(), guest_out)
    })
}

// ---------------------------------------------------------------------------
// Full rounds
// ---------------------------------------------------------------------------

#[test]
fn rock_beats_scissors_and_empty_name_defaults() {
    let host = ScriptedPlayer::new("alice", "Alice");
    let guest = ScriptedPlayer::new("anon", "");

    let (host_out, guest_out) = play_match(&host, Choice::Rock, &guest, Choice::Scissors);
    let host_out = host_out.unwrap();
    let guest_out = guest_out.unwrap();

    assert_eq!(host_out.result, MatchResult::Win);
    assert_eq!(host_out.opponent.name(), "Default");
    assert_eq!(guest_out.result, MatchResult::Loss);
    assert_eq!(guest_out.opponent.name(), "Alice");

    assert!(host.presentation.statuses().contains(&"You won the game!".to_string()));
    assert!(guest.presentation.statuses().contains(&"You lost the game!".to_string()));
    assert_eq!(
        host.presentation.choice_displays().last().unwrap(),
        "You chose rock, opponent chose scissors"
    );
    assert_eq!(
        guest.presentation.choice_displays().last().unwrap(),
        "You chose scissors, opponent chose rock"
    );
    assert!(host.presentation.statuses().contains(&"Connected to Default".to_string()));
    assert_eq!(
        host.presentation.last_status().unwrap(),
        "Not connected right now"
    );
    assert!(!host.presentation.exit_visible());
    assert!(!guest.presentation.options_visible());
}

#[test]
fn paper_against_paper_is_a_tie() {
    let host = ScriptedPlayer::new("carol", "Carol");
    let guest = ScriptedPlayer::new("dave", "Dave");

    let (host_out, guest_out) = play_match(&host, Choice::Paper, &guest, Choice::Paper);
    assert_eq!(host_out.unwrap().result, MatchResult::Tie);
    assert_eq!(guest_out.unwrap().result, MatchResult::Tie);
    assert!(host.presentation.statuses().contains(&"The game was a tie!".to_string()));
    assert!(guest.presentation.statuses().contains(&"The game was a tie!".to_string()));
}

#[test]
fn both_sides_walk_every_state_in_order() {
    let host = ScriptedPlayer::new("erin", "Erin");
    let guest = ScriptedPlayer::new("frank", "Frank");
    let (host_out, guest_out) = play_match(&host, Choice::Scissors, &guest, Choice::Paper);
    host_out.unwrap();
    guest_out.unwrap();

    // Handshaking always precedes AwaitingLocalChoice.
    assert_eq!(host.presentation.states(Role::Host), FULL_ROUND);
    assert_eq!(guest.presentation.states(Role::Guest), FULL_ROUND);
    assert_eq!(host.controller.state(Role::Host), SessionState::Idle);
    assert!(!guest.controller.is_running(Role::Guest));
}

#[test]
fn results_are_recorded_once_per_round() {
    let host = ScriptedPlayer::new("gina", "Gina");
    let guest = ScriptedPlayer::new("hank", "Hank");
    let (host_out, guest_out) = play_match(&host, Choice::Paper, &guest, Choice::Rock);
    host_out.unwrap();
    guest_out.unwrap();

    let gina = host.board.stats("gina").unwrap();
    assert_eq!((gina.wins, gina.losses, gina.ties, gina.score), (1, 0, 0, 1));
    let hank = guest.board.stats("hank").unwrap();
    assert_eq!((hank.wins, hank.losses, hank.score), (0, 1, -1));
    assert_eq!(host.board.history().len(), 1);
    assert_eq!(host.board.history()[0].opponent.name(), "Hank");
}

// ---------------------------------------------------------------------------
// Failures and control
// ---------------------------------------------------------------------------

#[test]
fn join_without_listener_reports_and_returns_to_idle() {
    let guest = ScriptedPlayer::new("ivy", "Ivy");
    guest.join(&format!("127.0.0.1:{}", free_port()));

    let err = guest.finish(Role::Guest).unwrap_err();
    assert!(matches!(err, SessionError::PeerUnavailable { .. }), "{err:?}");
    assert!(
        guest
            .presentation
            .last_status()
            .unwrap()
            .starts_with("Couldn't connect to")
    );
    assert_eq!(
        guest.presentation.states(Role::Guest),
        [SessionState::Connecting, SessionState::Idle]
    );
    assert!(!guest.controller.is_running(Role::Guest));
}

#[test]
fn invalid_target_is_reported() {
    let guest = ScriptedPlayer::new("jack", "Jack");
    guest.join("127.0.0.1:notaport");
    let err = guest.finish(Role::Guest).unwrap_err();
    assert!(matches!(err, SessionError::InvalidAddress { .. }), "{err:?}");
    assert_eq!(guest.controller.state(Role::Guest), SessionState::Idle);
}

#[test]
fn second_host_start_is_rejected_then_allowed_after_cancel() {
    let host = ScriptedPlayer::new("kate", "Kate");
    host.host();
    let err = host.controller.start_host(&host.player).unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRunning(Role::Host)));

    host.controller.cancel(Role::Host);
    assert!(matches!(host.finish(Role::Host), Err(SessionError::Cancelled)));
    assert_eq!(host.presentation.last_status().unwrap(), "Cancelled");

    // The slot is free again.
    host.host();
    host.controller.cancel(Role::Host);
    assert!(matches!(host.finish(Role::Host), Err(SessionError::Cancelled)));
}

#[test]
fn cancel_mid_round_aborts_the_opponent() {
    let host = ScriptedPlayer::new("liam", "Liam");
    let guest = ScriptedPlayer::new("mia", "Mia");
    let addr = host.host();
    guest.join(&addr.to_string());

    host.wait_for_state(Role::Host, SessionState::AwaitingLocalChoice);
    guest.wait_for_state(Role::Guest, SessionState::AwaitingLocalChoice);
    host.controller.cancel(Role::Host);
    assert!(matches!(host.finish(Role::Host), Err(SessionError::Cancelled)));

    guest
        .controller
        .on_choice_selected(Role::Guest, Choice::Rock)
        .unwrap();
    let err = guest.finish(Role::Guest).unwrap_err();
    assert!(matches!(err, SessionError::SessionAborted(_)), "{err:?}");
}

#[test]
fn silent_local_player_times_out() {
    let config = PeerConfig {
        choice_timeout: Some(Duration::from_millis(200)),
        ..test_config()
    };
    let host = ScriptedPlayer::with_config("nora", "Nora", config);
    let guest = ScriptedPlayer::new("otto", "Otto");
    let addr = host.host();
    guest.join(&addr.to_string());

    let err = host.finish(Role::Host).unwrap_err();
    assert!(matches!(err, SessionError::TimedOut(_)), "{err:?}");
    guest.controller.cancel(Role::Guest);
    let _ = guest.finish(Role::Guest);
}

// ---------------------------------------------------------------------------
// Matchmaking
// ---------------------------------------------------------------------------

#[test]
fn matchmade_players_play_a_round() {
    let (matchmaker, mm_addr) = start_matchmaker(MatchmakerConfig {
        port: 0,
        ..MatchmakerConfig::default()
    })
    .unwrap();
    let server = mm_addr.to_string();

    let host = ScriptedPlayer::with_config(
        "pia",
        "Pia",
        PeerConfig {
            gameplay_port: free_port(),
            ..test_config()
        },
    );
    let guest = ScriptedPlayer::with_config(
        "quinn",
        "Quinn",
        PeerConfig {
            gameplay_port: free_port(),
            ..test_config()
        },
    );

    let (host_out, guest_out) = thread::scope(|s| {
        let host_side = s.spawn(|| {
            let assignment = host.matchmake(&server);
            assert_eq!(assignment, MatchAssignment::Host);
            host.play(Role::Host, Choice::Scissors)
        });

        // Make sure the host is queued first so it gets the host role.
        let start = Instant::now();
        while matchmaker.waiting() == 0 {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(10));
        }
        let assignment = guest.matchmake(&server);
        assert_eq!(
            assignment,
            MatchAssignment::Guest {
                host_identifier: host.controller.config().advertised_identifier()
            }
        );
        let guest_out = guest.play(Role::Guest, Choice::Paper);
        (host_side.join().unwrap(), guest_out)
    });

    assert_eq!(host_out.unwrap().result, MatchResult::Win);
    let guest_out = guest_out.unwrap();
    assert_eq!(guest_out.result, MatchResult::Loss);
    assert_eq!(guest_out.opponent.name(), "Pia");
    assert_eq!(matchmaker.waiting(), 0);
    matchmaker.stop();
}
