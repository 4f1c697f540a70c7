// Matchmaking client: join the queue and learn this player's role.
//
// `join_matchmaking()` connects to the service, sends one `JoinRequest` and
// blocks until the single `MatchReply` arrives (that is, until an opponent
// joins). The matchmaking connection is closed as soon as the reply is read;
// the actual match is played over a fresh gameplay connection.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};
use rochambeau_protocol::message::{JoinRequest, MatchReply, recv_message, send_message};
use rochambeau_protocol::types::Role;
use thiserror::Error;

use crate::queue::validate_identifier;

/// Role handed out by the matchmaker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchAssignment {
    /// Listen for the opponent.
    Host,
    /// Connect to the host named by `host_identifier`.
    Guest { host_identifier: String },
}

impl MatchAssignment {
    pub fn role(&self) -> Role {
        match self {
            MatchAssignment::Host => Role::Host,
            MatchAssignment::Guest { .. } => Role::Guest,
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchmakingError {
    /// Refused locally before contacting the service.
    #[error("invalid matchmaking identifier: {0}")]
    InvalidIdentifier(String),
    #[error("matchmaking server {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The service answered with `MatchReply::Rejected`.
    #[error("matchmaking rejected: {0}")]
    Rejected(String),
    #[error("timed out waiting for an opponent")]
    TimedOut,
    #[error("matchmaking protocol error: {0}")]
    Protocol(#[from] rochambeau_protocol::ProtocolError),
}

/// Join the matchmaking queue at `server` and wait for a pairing.
///
/// `connect_timeout` bounds the TCP connect; `wait` bounds the time spent
/// waiting for an opponent (`None` waits indefinitely).
pub fn join_matchmaking(
    server: &str,
    identifier: &str,
    connect_timeout: Duration,
    wait: Option<Duration>,
) -> Result<MatchAssignment, MatchmakingError> {
    let identifier = validate_identifier(identifier).map_err(MatchmakingError::InvalidIdentifier)?;

    let stream = connect(server, connect_timeout)?;
    stream
        .set_read_timeout(wait)
        .map_err(|source| MatchmakingError::Unreachable {
            addr: server.to_string(),
            source,
        })?;
    let reader_stream = stream
        .try_clone()
        .map_err(|source| MatchmakingError::Unreachable {
            addr: server.to_string(),
            source,
        })?;

    let mut writer = BufWriter::new(stream);
    send_message(
        &mut writer,
        &JoinRequest {
            identifier: identifier.to_string(),
        },
    )?;
    info!("[Matchmaking] Joined queue at {server} as {identifier}");

    let mut reader = BufReader::new(reader_stream);
    let reply: MatchReply = recv_message(&mut reader).map_err(|e| {
        if e.is_timeout() {
            MatchmakingError::TimedOut
        } else {
            MatchmakingError::Protocol(e)
        }
    })?;
    debug!("[Matchmaking] Reply for {identifier}: {reply:?}");

    match reply {
        MatchReply::Host => Ok(MatchAssignment::Host),
        MatchReply::Guest { host_identifier } => Ok(MatchAssignment::Guest { host_identifier }),
        MatchReply::Rejected { reason } => Err(MatchmakingError::Rejected(reason)),
    }
}

/// Connect to the first resolved address of `server` that accepts.
fn connect(server: &str, timeout: Duration) -> Result<TcpStream, MatchmakingError> {
    let unreachable = |source| MatchmakingError::Unreachable {
        addr: server.to_string(),
        source,
    };
    let addrs: Vec<SocketAddr> = server.to_socket_addrs().map_err(unreachable)?.collect();

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "address resolved to nothing",
    );
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = e,
        }
    }
    Err(unreachable(last_err))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn empty_identifier_rejected_locally() {
        let err = join_matchmaking("127.0.0.1:1", "  ", Duration::from_millis(100), None)
            .unwrap_err();
        assert!(matches!(err, MatchmakingError::InvalidIdentifier(_)));
    }

    #[test]
    fn unreachable_server_reported() {
        // Bind then drop to get a port with (almost certainly) no listener.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = join_matchmaking(
            &format!("127.0.0.1:{port}"),
            "alice",
            Duration::from_millis(200),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MatchmakingError::Unreachable { .. }));
    }

    #[test]
    fn rejected_reply_surfaces_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let _req: JoinRequest = recv_message(&mut reader).unwrap();
            let mut writer = BufWriter::new(stream);
            send_message(
                &mut writer,
                &MatchReply::Rejected {
                    reason: "closed for maintenance".into(),
                },
            )
            .unwrap();
        });

        let err = join_matchmaking(&addr.to_string(), "alice", Duration::from_secs(1), None)
            .unwrap_err();
        assert!(matches!(err, MatchmakingError::Rejected(ref r) if r == "closed for maintenance"));
        server.join().unwrap();
    }

    #[test]
    fn wait_timeout_when_nobody_pairs() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(400));
            drop(stream);
        });

        let err = join_matchmaking(
            &addr.to_string(),
            "alice",
            Duration::from_secs(1),
            Some(Duration::from_millis(100)),
        )
        .unwrap_err();
        assert!(matches!(err, MatchmakingError::TimedOut));
        server.join().unwrap();
    }

    #[test]
    fn assignment_roles() {
        assert_eq!(MatchAssignment::Host.role(), Role::Host);
        let guest = MatchAssignment::Guest {
            host_identifier: "h".into(),
        };
        assert_eq!(guest.role(), Role::Guest);
    }
}
