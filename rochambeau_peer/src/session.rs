// One round between two peers, run on a dedicated worker thread.
//
// The worker owns the gameplay connection for its whole life and walks the
// session through its states:
//
//   Idle → Connecting → Handshaking → AwaitingLocalChoice
//        → AwaitingRemoteChoice → ResultReady → AwaitingExitAck → Closed
//
// The UI side never touches the socket. It talks to the worker only through
// `SessionControls`: the choice signal, the exit signal and the cancel
// token. Every presentation update is issued from here.
//
// Exit acknowledgment is mutual without an extra message type: once the
// local user acknowledges, the worker half-closes its write side and reads
// until the opponent's EOF, which the opponent only produces after its own
// user acknowledged. Neither side can truncate a read the other still has
// pending.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use rochambeau_protocol::{Choice, MatchResult, PeerIdentity, Role, evaluate};

use crate::accounts::{AccountStore, LocalPlayer, RoundRecord};
use crate::config::PeerConfig;
use crate::connection::{Connection, HostListener, connect, connect_with_retry};
use crate::error::SessionError;
use crate::exchange::{receive_choice, send_committed_choice};
use crate::handshake::exchange_names;
use crate::presentation::Presentation;
use crate::signal::{CancelToken, FireError, Signal, WaitError};

/// Observable lifecycle state of one role's session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Handshaking,
    AwaitingLocalChoice,
    AwaitingRemoteChoice,
    ResultReady,
    AwaitingExitAck,
    Closed,
}

/// Everything a completed round produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    pub role: Role,
    pub opponent: PeerIdentity,
    pub local: Choice,
    pub remote: Choice,
    pub result: MatchResult,
}

impl RoundOutcome {
    pub fn choice_summary(&self) -> String {
        format!("You chose {}, opponent chose {}", self.local, self.remote)
    }
}

/// UI-to-worker rendezvous for one session. Created fresh per session, so
/// each signal is armed at most once.
#[derive(Default)]
pub struct SessionControls {
    choice: Signal<Choice>,
    exit: Signal<()>,
    cancel: CancelToken,
}

impl SessionControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the local choice for this round.
    pub fn commit_choice(&self, role: Role, choice: Choice) -> Result<(), SessionError> {
        self.choice.fire(choice).map_err(|e| match e {
            FireError::AlreadyFired => SessionError::ChoiceAlreadyCommitted,
            FireError::Closed => SessionError::NotRunning(role),
        })
    }

    /// Acknowledge the result. Repeated requests are harmless.
    pub fn request_exit(&self, role: Role) -> Result<(), SessionError> {
        match self.exit.fire(()) {
            Ok(()) | Err(FireError::AlreadyFired) => Ok(()),
            Err(FireError::Closed) => Err(SessionError::NotRunning(role)),
        }
    }

    /// Interrupt every blocking wait of the worker.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.choice.interrupt();
        self.exit.interrupt();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Refuse further input; called when the worker finishes.
    pub fn close(&self) {
        self.choice.close();
        self.exit.close();
    }
}

/// How the worker obtains its connection.
pub(crate) enum Establish {
    /// Already bound; wait up to `accept_timeout` for the first opponent.
    Host {
        listener: HostListener,
        accept_timeout: Option<Duration>,
    },
    /// Connect out. `retry_window` keeps retrying refused connects, for a
    /// matchmade guest whose host may not be listening yet.
    Guest {
        target: String,
        retry_window: Option<Duration>,
    },
}

/// What the worker shares with its controller.
pub(crate) struct SessionContext {
    pub role: Role,
    pub config: PeerConfig,
    pub presentation: Arc<dyn Presentation>,
    pub accounts: Arc<dyn AccountStore>,
    pub player: LocalPlayer,
    pub controls: Arc<SessionControls>,
    pub state: Arc<Mutex<SessionState>>,
}

impl SessionContext {
    pub fn transition(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        debug!("[Session] {} -> {next:?}", self.role);
        self.presentation.state_changed(self.role, next);
    }
}

/// Run one full session. Always returns with the connection released.
pub(crate) fn run_worker(
    ctx: &SessionContext,
    establish: Establish,
) -> Result<RoundOutcome, SessionError> {
    let cancel = ctx.controls.cancel_token();
    ctx.transition(SessionState::Connecting);

    let conn = match establish {
        Establish::Host {
            listener,
            accept_timeout,
        } => {
            ctx.presentation.set_status(&format!(
                "Waiting for an opponent on {}...",
                listener.local_addr()
            ));
            listener.accept(cancel, accept_timeout)?
        }
        Establish::Guest {
            target,
            retry_window,
        } => {
            ctx.presentation
                .set_status(&format!("Connecting to {target}..."));
            let port = ctx.config.gameplay_port;
            let timeout = ctx.config.connect_timeout;
            match retry_window {
                Some(window) => connect_with_retry(&target, port, timeout, window, cancel)?,
                None => connect(&target, port, timeout, cancel)?,
            }
        }
    };
    cancel
        .attach(conn.stream())
        .map_err(|e| SessionError::HandshakeFailed(format!("connection setup failed: {e}")))?;

    let result = play_round(ctx, conn);
    cancel.detach();
    match result {
        Err(err) if cancel.is_cancelled() => {
            debug!("[Session] {} cancelled ({err})", ctx.role);
            Err(SessionError::Cancelled)
        }
        other => other,
    }
}

fn play_round(ctx: &SessionContext, mut conn: Connection) -> Result<RoundOutcome, SessionError> {
    let controls = &ctx.controls;
    let presentation = &ctx.presentation;
    let config = &ctx.config;

    ctx.transition(SessionState::Handshaking);
    let local_identity = ctx.player.identity();
    let opponent = exchange_names(&mut conn, &local_identity, config.handshake_timeout)?;
    presentation.set_status(&format!("Connected to {opponent}"));

    // The opponent is known from here on.
    ctx.transition(SessionState::AwaitingLocalChoice);
    presentation.set_choice_display("Make your choice");
    presentation.show_choice_options();
    let local = send_committed_choice(
        &mut conn,
        &controls.choice,
        &controls.cancel,
        config.choice_timeout,
    )?;
    presentation.hide_choice_options();
    presentation.set_choice_display("Waiting for opponent to make their choice...");

    ctx.transition(SessionState::AwaitingRemoteChoice);
    let remote = receive_choice(&mut conn, config.remote_choice_timeout)?;
    let result = evaluate(local, remote);
    let outcome = RoundOutcome {
        role: ctx.role,
        opponent,
        local,
        remote,
        result,
    };
    info!(
        "[Session] {} vs {}: {local} vs {remote} -> {result:?}",
        ctx.role, outcome.opponent
    );

    ctx.transition(SessionState::ResultReady);
    presentation.set_status(result.message());
    presentation.set_choice_display(&outcome.choice_summary());
    ctx.accounts.record_round(&RoundRecord {
        player_id: ctx.player.user_id.clone(),
        opponent: outcome.opponent.clone(),
        result,
    });
    presentation.show_exit();

    ctx.transition(SessionState::AwaitingExitAck);
    match controls.exit.wait(&controls.cancel, config.exit_timeout) {
        Ok(()) => {}
        Err(WaitError::TimedOut) => debug!("[Session] {} exit wait timed out", ctx.role),
        Err(e) => debug!("[Session] {} exit wait ended: {e:?}", ctx.role),
    }
    presentation.hide_exit();
    match conn.close_gracefully(config.remote_exit_timeout) {
        Ok(true) => debug!("[Session] {} opponent acknowledged", ctx.role),
        Ok(false) => warn!(
            "[Session] {} opponent did not acknowledge in time, closing",
            ctx.role
        ),
        Err(e) => debug!("[Session] {} close: {e}", ctx.role),
    }

    ctx.transition(SessionState::Closed);
    Ok(outcome)
}
