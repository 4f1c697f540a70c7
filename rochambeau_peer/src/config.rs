// Peer configuration: addresses, ports, and the timeout policy for every
// blocking wait in a session.
//
// `None` means "wait indefinitely"; every such wait can still be interrupted
// through `SessionController::cancel`.

use std::time::Duration;

use rochambeau_protocol::{DEFAULT_GAMEPLAY_PORT, DEFAULT_MATCHMAKING_PORT};

#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// Address the host listens on.
    pub bind_host: String,
    /// Gameplay port for hosting, and the default port for guest targets
    /// that omit one.
    pub gameplay_port: u16,
    /// Per-attempt bound on a guest's TCP connect.
    pub connect_timeout: Duration,
    /// How long a matchmade guest keeps retrying a refused connect while its
    /// host starts listening.
    pub matched_connect_window: Duration,
    pub accept_timeout: Option<Duration>,
    /// Accept bound for a matchmade host, whose paired guest may already be
    /// gone.
    pub matched_accept_timeout: Option<Duration>,
    pub handshake_timeout: Option<Duration>,
    pub choice_timeout: Option<Duration>,
    pub remote_choice_timeout: Option<Duration>,
    /// Wait for the local user's exit acknowledgment.
    pub exit_timeout: Option<Duration>,
    /// Wait for the opponent's side to close after we acknowledged.
    pub remote_exit_timeout: Option<Duration>,
    /// How long to wait in the matchmaking queue for an opponent.
    pub matchmaking_wait: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            gameplay_port: DEFAULT_GAMEPLAY_PORT,
            connect_timeout: Duration::from_secs(5),
            matched_connect_window: Duration::from_secs(5),
            accept_timeout: None,
            matched_accept_timeout: Some(Duration::from_secs(30)),
            handshake_timeout: Some(Duration::from_secs(10)),
            choice_timeout: None,
            remote_choice_timeout: None,
            exit_timeout: None,
            remote_exit_timeout: Some(Duration::from_secs(30)),
            matchmaking_wait: None,
        }
    }
}

impl PeerConfig {
    /// The identifier a host advertises to the matchmaker: its gameplay
    /// address, which the paired guest connects to verbatim.
    pub fn advertised_identifier(&self) -> String {
        format!("{}:{}", self.bind_host, self.gameplay_port)
    }

    /// The matchmaker to join when none is named: the well-known port on
    /// the host we bind to.
    pub fn matchmaker_addr(&self) -> String {
        format!("{}:{DEFAULT_MATCHMAKING_PORT}", self.bind_host)
    }
}
