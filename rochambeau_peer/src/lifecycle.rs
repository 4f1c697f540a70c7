// Session lifecycle: one controller, at most one running session per role.
//
// `SessionController` is the surface the user interface drives. It holds a
// `RoleSlot` for the host role and one for the guest role; each slot has an
// atomic `running` flag flipped with compare-exchange at activation, so a
// second start while a session of that role is live fails with
// `AlreadyRunning` instead of opening a second socket. Host and guest slots
// are independent, which lets a single process host a match against itself.
//
// Each start spawns a worker thread (`session::run_worker`). The worker's
// `RunningGuard` resets the slot to `Idle` and clears `running` on every
// exit path, including panics. Errors are shown through the presentation and
// also returned from `join`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use rochambeau_matchmaker::{MatchAssignment, join_matchmaking};
use rochambeau_protocol::{Choice, Role};

use crate::accounts::{AccountStore, LocalPlayer, NoAccounts};
use crate::config::PeerConfig;
use crate::connection::HostListener;
use crate::error::SessionError;
use crate::presentation::Presentation;
use crate::session::{
    Establish, RoundOutcome, SessionContext, SessionControls, SessionState, run_worker,
};

type Worker = JoinHandle<Result<RoundOutcome, SessionError>>;

#[derive(Default)]
struct RoleSlot {
    running: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    controls: Mutex<Option<Arc<SessionControls>>>,
    worker: Mutex<Option<Worker>>,
}

/// Returns the slot to `Idle` when the worker ends, however it ends.
struct RunningGuard {
    role: Role,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    controls: Arc<SessionControls>,
    presentation: Arc<dyn Presentation>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.controls.close();
        *lock(&self.state) = SessionState::Idle;
        self.presentation.state_changed(self.role, SessionState::Idle);
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct SessionController {
    config: PeerConfig,
    presentation: Arc<dyn Presentation>,
    accounts: Arc<dyn AccountStore>,
    host: RoleSlot,
    guest: RoleSlot,
}

impl SessionController {
    pub fn new(config: PeerConfig, presentation: Arc<dyn Presentation>) -> Self {
        Self::with_accounts(config, presentation, Arc::new(NoAccounts))
    }

    pub fn with_accounts(
        config: PeerConfig,
        presentation: Arc<dyn Presentation>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            config,
            presentation,
            accounts,
            host: RoleSlot::default(),
            guest: RoleSlot::default(),
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Bind the gameplay port and wait for an opponent in the background.
    /// Returns the bound address (useful with port 0).
    pub fn start_host(&self, player: &LocalPlayer) -> Result<SocketAddr, SessionError> {
        self.host_session(player, self.config.accept_timeout)
    }

    /// Connect to `target` (`host`, `host:port`) in the background.
    pub fn start_guest(&self, player: &LocalPlayer, target: &str) -> Result<(), SessionError> {
        self.activate(Role::Guest)?;
        self.spawn(
            Role::Guest,
            player,
            Establish::Guest {
                target: target.to_string(),
                retry_window: None,
            },
        )
    }

    /// Start the session a matchmaker assigned.
    pub fn start_matched(
        &self,
        player: &LocalPlayer,
        assignment: &MatchAssignment,
    ) -> Result<(), SessionError> {
        match assignment {
            // The paired guest may never arrive if it dropped off the
            // matchmaker between the two notifications.
            MatchAssignment::Host => self
                .host_session(player, self.config.matched_accept_timeout)
                .map(|_| ()),
            MatchAssignment::Guest { host_identifier } => {
                self.activate(Role::Guest)?;
                self.spawn(
                    Role::Guest,
                    player,
                    Establish::Guest {
                        target: host_identifier.clone(),
                        retry_window: Some(self.config.matched_connect_window),
                    },
                )
            }
        }
    }

    /// Wait in the matchmaking queue at `server` under `identifier`.
    /// Blocks the caller until paired, rejected or timed out.
    pub fn join_matchmaking(
        &self,
        server: &str,
        identifier: &str,
    ) -> Result<MatchAssignment, SessionError> {
        self.presentation.set_status("Joining matchmaking...");
        let result = join_matchmaking(
            server,
            identifier,
            self.config.connect_timeout,
            self.config.matchmaking_wait,
        )
        .map_err(SessionError::from);
        match &result {
            Ok(assignment) => {
                info!("[Matchmaking] Assigned {}", assignment.role());
                self.presentation
                    .set_status(&format!("Matched as {}", assignment.role()));
            }
            Err(err) => self.presentation.set_status(&err.to_string()),
        }
        result
    }

    /// Commit the local choice for `role`'s current round. Refused until the
    /// handshake has finished and the choice options are shown.
    pub fn on_choice_selected(&self, role: Role, choice: Choice) -> Result<(), SessionError> {
        let controls = self.controls(role)?;
        if matches!(
            self.state(role),
            SessionState::Idle | SessionState::Connecting | SessionState::Handshaking
        ) {
            return Err(SessionError::ChoiceNotOpen);
        }
        controls.commit_choice(role, choice)
    }

    /// Acknowledge the result of `role`'s round.
    pub fn on_exit_requested(&self, role: Role) -> Result<(), SessionError> {
        self.controls(role)?.request_exit(role)
    }

    /// Interrupt `role`'s session. A no-op when nothing is running.
    pub fn cancel(&self, role: Role) {
        if let Some(controls) = lock(&self.slot(role).controls).as_ref() {
            info!("[Session] Cancelling {role} session");
            controls.cancel();
        }
    }

    pub fn state(&self, role: Role) -> SessionState {
        *lock(&self.slot(role).state)
    }

    pub fn is_running(&self, role: Role) -> bool {
        self.slot(role).running.load(Ordering::SeqCst)
    }

    /// Wait for `role`'s most recent worker to finish. `None` if no session
    /// was started since the last join.
    pub fn join(&self, role: Role) -> Option<Result<RoundOutcome, SessionError>> {
        let handle = lock(&self.slot(role).worker).take()?;
        Some(handle.join().unwrap_or_else(|_| {
            Err(SessionError::SessionAborted("session worker panicked".into()))
        }))
    }

    fn host_session(
        &self,
        player: &LocalPlayer,
        accept_timeout: Option<Duration>,
    ) -> Result<SocketAddr, SessionError> {
        self.activate(Role::Host)?;
        let listener = match HostListener::bind(&self.config.bind_host, self.config.gameplay_port)
        {
            Ok(listener) => listener,
            Err(err) => {
                self.host.running.store(false, Ordering::SeqCst);
                self.presentation.set_status(&err.to_string());
                return Err(err);
            }
        };
        let addr = listener.local_addr();
        self.spawn(
            Role::Host,
            player,
            Establish::Host {
                listener,
                accept_timeout,
            },
        )?;
        Ok(addr)
    }

    fn slot(&self, role: Role) -> &RoleSlot {
        match role {
            Role::Host => &self.host,
            Role::Guest => &self.guest,
        }
    }

    fn activate(&self, role: Role) -> Result<(), SessionError> {
        self.slot(role)
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| SessionError::AlreadyRunning(role))
    }

    fn controls(&self, role: Role) -> Result<Arc<SessionControls>, SessionError> {
        if !self.is_running(role) {
            return Err(SessionError::NotRunning(role));
        }
        lock(&self.slot(role).controls)
            .clone()
            .ok_or(SessionError::NotRunning(role))
    }

    /// Spawn the worker for an activated slot.
    fn spawn(
        &self,
        role: Role,
        player: &LocalPlayer,
        establish: Establish,
    ) -> Result<(), SessionError> {
        let slot = self.slot(role);
        let controls = Arc::new(SessionControls::new());
        *lock(&slot.controls) = Some(controls.clone());

        let ctx = SessionContext {
            role,
            config: self.config.clone(),
            presentation: self.presentation.clone(),
            accounts: self.accounts.clone(),
            player: player.clone(),
            controls: controls.clone(),
            state: slot.state.clone(),
        };
        let guard = RunningGuard {
            role,
            running: slot.running.clone(),
            state: slot.state.clone(),
            controls,
            presentation: self.presentation.clone(),
        };

        // A previous worker for this role has already released the slot, so
        // its handle only holds a finished result.
        drop(lock(&slot.worker).take());

        let spawned = thread::Builder::new()
            .name(format!("rochambeau-{role}"))
            .spawn(move || {
                let _guard = guard;
                let result = run_worker(&ctx, establish);
                report(&ctx, &result);
                result
            });
        match spawned {
            Ok(handle) => {
                *lock(&slot.worker) = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The closure (and its guard) was dropped, resetting the slot.
                let err = SessionError::SessionAborted(format!("couldn't start session: {e}"));
                self.presentation.set_status(&err.to_string());
                Err(err)
            }
        }
    }
}

fn report(ctx: &SessionContext, result: &Result<RoundOutcome, SessionError>) {
    let presentation = &ctx.presentation;
    match result {
        Ok(_) => presentation.set_status("Not connected right now"),
        Err(err) => {
            warn!("[Session] {} session ended: {err}", ctx.role);
            presentation.hide_choice_options();
            presentation.hide_exit();
            presentation.set_choice_display("");
            presentation.set_status(&err.to_string());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Instant;

    use crate::presentation::NullPresentation;

    use super::*;

    fn controller() -> SessionController {
        let config = PeerConfig {
            gameplay_port: 0,
            connect_timeout: Duration::from_millis(500),
            ..PeerConfig::default()
        };
        SessionController::new(config, Arc::new(NullPresentation))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition never held");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn choice_before_opponent_connects_is_refused() {
        let ctl = controller();
        ctl.start_host(&LocalPlayer::new("a", "Alice")).unwrap();
        assert!(matches!(
            ctl.on_choice_selected(Role::Host, Choice::Rock),
            Err(SessionError::ChoiceNotOpen)
        ));

        ctl.cancel(Role::Host);
        let _ = ctl.join(Role::Host);

        // With an opponent connected the choice is accepted.
        let addr = ctl.start_host(&LocalPlayer::new("a", "Alice")).unwrap();
        ctl.start_guest(&LocalPlayer::new("b", "Bob"), &addr.to_string())
            .unwrap();
        wait_until(|| ctl.state(Role::Host) == SessionState::AwaitingLocalChoice);
        ctl.on_choice_selected(Role::Host, Choice::Paper).unwrap();
        ctl.cancel(Role::Host);
        ctl.cancel(Role::Guest);
        let _ = ctl.join(Role::Host);
        let _ = ctl.join(Role::Guest);
    }

    #[test]
    fn matched_host_gives_up_when_guest_never_arrives() {
        let config = PeerConfig {
            gameplay_port: 0,
            matched_accept_timeout: Some(Duration::from_millis(100)),
            ..PeerConfig::default()
        };
        let ctl = SessionController::new(config, Arc::new(NullPresentation));
        ctl.start_matched(&LocalPlayer::new("a", "Alice"), &MatchAssignment::Host)
            .unwrap();
        let err = ctl.join(Role::Host).unwrap().unwrap_err();
        assert!(
            matches!(err, SessionError::TimedOut(crate::error::Stage::Accepting)),
            "{err:?}"
        );
        assert!(!ctl.is_running(Role::Host));
    }

    #[test]
    fn second_host_start_is_rejected() {
        let ctl = controller();
        let player = LocalPlayer::new("a", "Alice");
        ctl.start_host(&player).unwrap();
        let err = ctl.start_host(&player).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning(Role::Host)));

        ctl.cancel(Role::Host);
        assert!(matches!(ctl.join(Role::Host), Some(Err(SessionError::Cancelled))));
        assert!(!ctl.is_running(Role::Host));
        assert_eq!(ctl.state(Role::Host), SessionState::Idle);
    }

    #[test]
    fn input_without_session_is_not_running() {
        let ctl = controller();
        assert!(matches!(
            ctl.on_choice_selected(Role::Guest, Choice::Rock),
            Err(SessionError::NotRunning(Role::Guest))
        ));
        assert!(matches!(
            ctl.on_exit_requested(Role::Host),
            Err(SessionError::NotRunning(Role::Host))
        ));
        assert!(ctl.join(Role::Host).is_none());
        ctl.cancel(Role::Guest);
    }

    #[test]
    fn guest_failure_returns_to_idle() {
        // Grab a free port, then release it so nothing listens there.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let ctl = controller();
        ctl.start_guest(&LocalPlayer::new("b", "Bob"), &format!("127.0.0.1:{port}"))
            .unwrap();
        let result = ctl.join(Role::Guest).unwrap();
        assert!(matches!(result, Err(SessionError::PeerUnavailable { .. })));
        assert!(!ctl.is_running(Role::Guest));
        assert_eq!(ctl.state(Role::Guest), SessionState::Idle);
    }

    #[test]
    fn bind_failure_does_not_leave_slot_running() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = PeerConfig {
            gameplay_port: taken.local_addr().unwrap().port(),
            ..PeerConfig::default()
        };
        let ctl = SessionController::new(config, Arc::new(NullPresentation));
        let err = ctl.start_host(&LocalPlayer::new("a", "Alice")).unwrap_err();
        assert!(matches!(err, SessionError::Bind { .. }));
        assert!(!ctl.is_running(Role::Host));
    }

    #[test]
    fn host_and_guest_play_in_one_process() {
        let ctl = controller();
        let addr = ctl.start_host(&LocalPlayer::new("a", "Alice")).unwrap();
        ctl.start_guest(&LocalPlayer::new("b", "Bob"), &addr.to_string())
            .unwrap();

        for role in [Role::Host, Role::Guest] {
            wait_until(|| ctl.state(role) == SessionState::AwaitingLocalChoice);
        }
        ctl.on_choice_selected(Role::Host, Choice::Paper).unwrap();
        ctl.on_choice_selected(Role::Guest, Choice::Rock).unwrap();
        assert!(matches!(
            ctl.on_choice_selected(Role::Host, Choice::Scissors),
            Err(SessionError::ChoiceAlreadyCommitted)
        ));

        for role in [Role::Host, Role::Guest] {
            wait_until(|| ctl.state(role) == SessionState::AwaitingExitAck);
            ctl.on_exit_requested(role).unwrap();
        }
        let host = ctl.join(Role::Host).unwrap().unwrap();
        let guest = ctl.join(Role::Guest).unwrap().unwrap();
        assert_eq!(host.local, Choice::Paper);
        assert_eq!(host.remote, Choice::Rock);
        assert_eq!(guest.result, host.result.inverse());
        assert_eq!(ctl.state(Role::Host), SessionState::Idle);
    }
}
