// Test-only player for end-to-end match tests.
//
// Wraps a real `SessionController` with a `RecordingPresentation` and an
// in-memory `Scoreboard`, and adds blocking helpers that wait for lifecycle
// states the way a user at the terminal would. All networking and session
// logic runs through the same code paths as the `rochambeau` binary; the only
// test-specific code here is the polling in `wait_for_state` and the
// recording of presentation calls.
//
// See also: `tests/full_round.rs` for the scenarios.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rochambeau_matchmaker::MatchAssignment;
use rochambeau_peer::{
    LocalPlayer, PeerConfig, Presentation, RoundOutcome, Scoreboard, SessionController,
    SessionError, SessionState,
};
use rochambeau_protocol::{Choice, Role};

/// Default timeout for blocking waits.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between state polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Presentation that remembers everything it was told.
#[derive(Default)]
pub struct RecordingPresentation {
    statuses: Mutex<Vec<String>>,
    choice_displays: Mutex<Vec<String>>,
    states: Mutex<Vec<(Role, SessionState)>>,
    options_visible: AtomicBool,
    exit_visible: AtomicBool,
}

impl RecordingPresentation {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn choice_displays(&self) -> Vec<String> {
        self.choice_displays.lock().unwrap().clone()
    }

    /// Every state `role` passed through, in order.
    pub fn states(&self, role: Role) -> Vec<SessionState> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn options_visible(&self) -> bool {
        self.options_visible.load(Ordering::SeqCst)
    }

    pub fn exit_visible(&self) -> bool {
        self.exit_visible.load(Ordering::SeqCst)
    }
}

impl Presentation for RecordingPresentation {
    fn set_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn set_choice_display(&self, text: &str) {
        self.choice_displays.lock().unwrap().push(text.to_string());
    }

    fn show_choice_options(&self) {
        self.options_visible.store(true, Ordering::SeqCst);
    }

    fn hide_choice_options(&self) {
        self.options_visible.store(false, Ordering::SeqCst);
    }

    fn show_exit(&self) {
        self.exit_visible.store(true, Ordering::SeqCst);
    }

    fn hide_exit(&self) {
        self.exit_visible.store(false, Ordering::SeqCst);
    }

    fn state_changed(&self, role: Role, state: SessionState) {
        self.states.lock().unwrap().push((role, state));
    }
}

/// Config for tests: OS-assigned gameplay port and bounded waits.
pub fn test_config() -> PeerConfig {
    PeerConfig {
        gameplay_port: 0,
        connect_timeout: Duration::from_secs(1),
        matched_connect_window: Duration::from_secs(5),
        accept_timeout: Some(WAIT_TIMEOUT),
        handshake_timeout: Some(WAIT_TIMEOUT),
        choice_timeout: Some(WAIT_TIMEOUT),
        remote_choice_timeout: Some(WAIT_TIMEOUT),
        exit_timeout: Some(WAIT_TIMEOUT),
        remote_exit_timeout: Some(WAIT_TIMEOUT),
        matchmaking_wait: Some(WAIT_TIMEOUT),
        ..PeerConfig::default()
    }
}

/// A free localhost port (bound and released immediately).
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("no free port")
        .port()
}

/// One player driven by the test instead of a terminal.
pub struct ScriptedPlayer {
    pub controller: SessionController,
    pub presentation: Arc<RecordingPresentation>,
    pub board: Arc<Scoreboard>,
    pub player: LocalPlayer,
}

impl ScriptedPlayer {
    pub fn new(user_id: &str, display_name: &str) -> Self {
        Self::with_config(user_id, display_name, test_config())
    }

    pub fn with_config(user_id: &str, display_name: &str, config: PeerConfig) -> Self {
        let presentation = Arc::new(RecordingPresentation::default());
        let board = Arc::new(Scoreboard::new());
        let controller =
            SessionController::with_accounts(config, presentation.clone(), board.clone());
        Self {
            controller,
            presentation,
            board,
            player: LocalPlayer::new(user_id, display_name),
        }
    }

    /// Start hosting and return the bound address.
    pub fn host(&self) -> SocketAddr {
        self.controller
            .start_host(&self.player)
            .expect("start_host failed")
    }

    pub fn join(&self, target: &str) {
        self.controller
            .start_guest(&self.player, target)
            .expect("start_guest failed");
    }

    /// Wait in the matchmaking queue, then start the assigned session.
    pub fn matchmake(&self, server: &str) -> MatchAssignment {
        let identifier = self.controller.config().advertised_identifier();
        let assignment = self
            .controller
            .join_matchmaking(server, &identifier)
            .expect("join_matchmaking failed");
        self.controller
            .start_matched(&self.player, &assignment)
            .expect("start_matched failed");
        assignment
    }

    /// Block until `role` reaches `state`.
    pub fn wait_for_state(&self, role: Role, state: SessionState) {
        let start = Instant::now();
        while self.controller.state(role) != state {
            assert!(
                start.elapsed() < WAIT_TIMEOUT,
                "timed out waiting for {role} to reach {state:?} (at {:?})",
                self.controller.state(role)
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Play the rest of the round: choose, wait for the result, acknowledge,
    /// and return the worker's outcome.
    pub fn play(&self, role: Role, choice: Choice) -> Result<RoundOutcome, SessionError> {
        self.wait_for_state(role, SessionState::AwaitingLocalChoice);
        self.controller.on_choice_selected(role, choice)?;
        self.wait_for_state(role, SessionState::AwaitingExitAck);
        self.controller.on_exit_requested(role)?;
        self.finish(role)
    }

    /// Wait for the worker to end.
    pub fn finish(&self, role: Role) -> Result<RoundOutcome, SessionError> {
        self.controller
            .join(role)
            .expect("no session was started for this role")
    }
}
