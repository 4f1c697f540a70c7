// Connection establishment: the one gameplay socket of a session.
//
// Host side: `HostListener::bind()` claims the configured address, then
// `accept()` takes the first inbound connection and drops the listener, so
// any later connection attempt for this session is refused by the OS. The
// accept loop is non-blocking and polls the session's `CancelToken`.
//
// Guest side: `connect()` resolves a `host[:port]` target (defaulting the
// port) and tries each resolved address with a bounded connect timeout.
// `connect_with_retry()` keeps retrying refusals for matchmade guests whose
// host may not be listening yet.
//
// Failure classification follows what the user can do about it: a target
// that will never work is `InvalidAddress`, a target that might work later
// (refused, unreachable, timed out) is `PeerUnavailable`.
//
// `Connection` owns both buffered halves of the single `TcpStream`; dropping
// it closes the socket on every exit path.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rochambeau_protocol::message::{PeerMessage, recv_message, send_message};
use rochambeau_protocol::ProtocolError;

use crate::error::{SessionError, Stage};
use crate::signal::CancelToken;

/// How long the host's accept loop sleeps between polls.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Pause between connect attempts while a matchmade host starts up.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// The established gameplay stream, exclusively owned by one session.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: BufWriter::new(stream),
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The underlying socket (for cancellation registration).
    pub fn stream(&self) -> &TcpStream {
        self.writer.get_ref()
    }

    pub fn send(&mut self, msg: &PeerMessage) -> Result<(), ProtocolError> {
        send_message(&mut self.writer, msg)
    }

    /// Read one message, waiting at most `timeout` (`None` blocks).
    pub fn recv(&mut self, timeout: Option<Duration>) -> Result<PeerMessage, ProtocolError> {
        self.reader
            .get_ref()
            .set_read_timeout(timeout.filter(|t| !t.is_zero()))?;
        recv_message(&mut self.reader)
    }

    /// Half-close our side, then wait for the opponent to close theirs.
    ///
    /// Returns `Ok(true)` when the opponent's EOF arrived, `Ok(false)` when
    /// `timeout` expired first. Stray bytes from the opponent are discarded.
    pub fn close_gracefully(mut self, timeout: Option<Duration>) -> io::Result<bool> {
        self.writer.flush()?;
        self.writer.get_ref().shutdown(Shutdown::Write)?;
        self.reader
            .get_ref()
            .set_read_timeout(timeout.filter(|t| !t.is_zero()))?;

        let mut sink = [0u8; 256];
        loop {
            match self.reader.read(&mut sink) {
                Ok(0) => return Ok(true),
                Ok(n) => debug!("[Session] Discarding {n} trailing bytes from {}", self.peer),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A bound-but-not-yet-accepted host socket.
pub struct HostListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl HostListener {
    pub fn bind(host: &str, port: u16) -> Result<Self, SessionError> {
        let display = format!("{host}:{port}");
        let addrs = resolve(host, port).map_err(|reason| SessionError::InvalidAddress {
            addr: display.clone(),
            reason,
        })?;
        let listener = TcpListener::bind(&addrs[..]).map_err(|source| SessionError::Bind {
            addr: display.clone(),
            source,
        })?;
        let addr = listener.local_addr().map_err(|source| SessionError::Bind {
            addr: display,
            source,
        })?;
        info!("[Session] Host listening on {addr}");
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept the first inbound connection. The listener is consumed, so no
    /// second opponent can connect to this session.
    pub fn accept(
        self,
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<Connection, SessionError> {
        let bind_err = |source| SessionError::Bind {
            addr: self.addr.to_string(),
            source,
        };
        self.listener.set_nonblocking(true).map_err(bind_err)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!("[Session] Accepted opponent from {peer}");
                    stream.set_nonblocking(false).map_err(bind_err)?;
                    return Connection::from_stream(stream).map_err(|e| {
                        SessionError::HandshakeFailed(format!("connection setup failed: {e}"))
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(SessionError::TimedOut(Stage::Accepting));
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("[Session] Accept failed on {}: {e}", self.addr);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }
}

/// Connect to `target` (`host`, `host:port`, `ip`, `[ipv6]:port`). A target
/// without a port uses `default_port`.
pub fn connect(
    target: &str,
    default_port: u16,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Connection, SessionError> {
    let addrs = resolve_target(target, default_port)?;

    let mut last_err = io::Error::from(io::ErrorKind::AddrNotAvailable);
    for addr in addrs {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        debug!("[Session] Connecting to {addr}");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                info!("[Session] Connected to host at {addr}");
                return Connection::from_stream(stream).map_err(|e| {
                    SessionError::HandshakeFailed(format!("connection setup failed: {e}"))
                });
            }
            Err(e) => last_err = e,
        }
    }
    Err(classify_connect_error(target, last_err))
}

/// `connect`, retrying `PeerUnavailable` until `window` has elapsed.
pub fn connect_with_retry(
    target: &str,
    default_port: u16,
    timeout: Duration,
    window: Duration,
    cancel: &CancelToken,
) -> Result<Connection, SessionError> {
    let deadline = Instant::now() + window;
    loop {
        match connect(target, default_port, timeout, cancel) {
            Err(SessionError::PeerUnavailable { addr, source }) => {
                if Instant::now() >= deadline {
                    return Err(SessionError::PeerUnavailable { addr, source });
                }
                debug!("[Session] {addr} not ready ({source}), retrying");
                thread::sleep(RETRY_INTERVAL);
            }
            other => return other,
        }
    }
}

/// Parse and resolve a guest target into socket addresses.
pub fn resolve_target(target: &str, default_port: u16) -> Result<Vec<SocketAddr>, SessionError> {
    let invalid = |reason: String| SessionError::InvalidAddress {
        addr: target.to_string(),
        reason,
    };
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty address".into()));
    }
    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    let bare = trimmed.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }
    let (host, port) = match trimmed.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| invalid(format!("bad port {port:?}")))?;
            (host, port)
        }
        None => (trimmed, default_port),
    };
    resolve(host, port).map_err(invalid)
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, String> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| e.to_string())?
        .collect();
    if addrs.is_empty() {
        return Err("address resolved to nothing".into());
    }
    Ok(addrs)
}

fn classify_connect_error(target: &str, err: io::Error) -> SessionError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => SessionError::PeerUnavailable {
            addr: target.to_string(),
            source: err,
        },
        _ => SessionError::InvalidAddress {
            addr: target.to_string(),
            reason: err.to_string(),
        },
    }
}
