// TCP server for the matchmaking service.
//
// Architecture: one accept thread plus one short-lived thread per arriving
// connection, all sharing a single `Mutex<MatchmakingQueue>`.
//
// - **Accept thread** (`TcpListener::accept()` loop, non-blocking so it can
//   observe `keep_running`): hands each new stream to a connection thread.
// - **Connection threads**: read exactly one `JoinRequest` (bounded by
//   `identifier_timeout`), validate the identifier, then take the queue lock
//   and run enqueue → prune → pair → notify as one critical section. Invalid
//   requests get a `Rejected` reply and are never enqueued.
//
// A failure on one connection (timeout, garbage, early hang-up) only ends
// that connection's thread; the accept loop keeps running.
//
// The listening port doubles as the process-wide singleton guard: a second
// `start_matchmaker` on the same address fails with `AddrInUse`.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rochambeau_protocol::DEFAULT_MATCHMAKING_PORT;
use rochambeau_protocol::message::{JoinRequest, MatchReply, recv_message, send_message};

use crate::queue::{MatchmakingQueue, PairingOutcome, validate_identifier};

/// How long the accept loop sleeps when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Configuration for starting a matchmaking server.
#[derive(Clone, Debug)]
pub struct MatchmakerConfig {
    pub bind_host: String,
    pub port: u16,
    /// How long a new connection may take to send its identifier.
    pub identifier_timeout: Duration,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            port: DEFAULT_MATCHMAKING_PORT,
            identifier_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle returned by `start_matchmaker` to inspect and control the service.
pub struct MatchmakerHandle {
    keep_running: Arc<AtomicBool>,
    queue: Arc<Mutex<MatchmakingQueue>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MatchmakerHandle {
    /// Number of players currently waiting for an opponent.
    pub fn waiting(&self) -> usize {
        self.lock_queue().len()
    }

    /// Identifiers of waiting players, oldest first.
    pub fn waiting_identifiers(&self) -> Vec<String> {
        self.lock_queue().identifiers()
    }

    /// Signal the service to stop accepting and wait for the accept thread.
    /// Players still queued are disconnected when the queue is dropped.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the accept thread exits (it only does so after `stop`
    /// from another handle holder or a fatal listener error).
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, MatchmakingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start the matchmaking service on a background thread. Returns a handle and
/// the bound address (useful when port 0 lets the OS pick).
pub fn start_matchmaker(config: MatchmakerConfig) -> std::io::Result<(MatchmakerHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_host.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;
    info!("[Matchmaking] Listening on {addr}");

    let keep_running = Arc::new(AtomicBool::new(true));
    let queue = Arc::new(Mutex::new(MatchmakingQueue::new()));

    let thread = {
        let keep_running = keep_running.clone();
        let queue = queue.clone();
        thread::spawn(move || accept_loop(listener, config, queue, keep_running))
    };

    Ok((
        MatchmakerHandle {
            keep_running,
            queue,
            thread: Some(thread),
        },
        addr,
    ))
}

fn accept_loop(
    listener: TcpListener,
    config: MatchmakerConfig,
    queue: Arc<Mutex<MatchmakingQueue>>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("[Matchmaking] Connection from {peer}");
                let queue = queue.clone();
                let timeout = config.identifier_timeout;
                thread::spawn(move || handle_connection(stream, peer, timeout, &queue));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                // Per-connection accept failures (e.g. aborted handshakes)
                // must not end the service.
                warn!("[Matchmaking] Accept failed: {e}");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    info!("[Matchmaking] Stopped");
}

/// Read one `JoinRequest`, then enqueue and pair under the queue lock.
fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Duration,
    queue: &Mutex<MatchmakingQueue>,
) {
    if stream.set_nonblocking(false).is_err()
        || stream.set_read_timeout(Some(timeout)).is_err()
        || stream.set_write_timeout(Some(timeout)).is_err()
    {
        return;
    }

    let request: JoinRequest = {
        let mut reader = BufReader::new(&stream);
        match recv_message(&mut reader) {
            Ok(request) => request,
            Err(e) => {
                debug!("[Matchmaking] Dropping {peer}: {e}");
                return;
            }
        }
    };

    let identifier = match validate_identifier(&request.identifier) {
        Ok(identifier) => identifier.to_string(),
        Err(reason) => {
            info!("[Matchmaking] Rejected {peer}: {reason}");
            let mut writer = BufWriter::new(&stream);
            let _ = send_message(&mut writer, &MatchReply::Rejected { reason });
            return;
        }
    };

    // Waiting for an opponent may take arbitrarily long.
    if stream.set_read_timeout(None).is_err() {
        return;
    }

    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
    let arrival = queue.enqueue(identifier.clone(), stream);
    debug!("[Matchmaking] {identifier} queued (#{arrival}, {} waiting)", queue.len());

    for outcome in queue.pair_all() {
        if let PairingOutcome::Notified { host, guest } = outcome {
            info!("[Matchmaking] Match: host {host}, guest {guest}");
        }
    }
}
