// Rendezvous primitives between the UI-facing side and a session worker.
//
// `Signal<T>` is a single-producer/single-consumer, single-shot hand-off:
//
//   Open ──fire(v)──▶ Fired(v) ──wait()──▶ Consumed
//     └───────────── close() ─────────────▶ Closed
//
// Each session creates fresh signals, so a signal is armed once per round,
// consumed once, and never reused; there is no reset back to `Open`. The UI
// side only ever calls `fire`; the worker only ever calls `wait`. Waiting
// blocks on a `Condvar`, never spins.
//
// `CancelToken` interrupts the worker's blocking waits. Cancelling sets a
// flag, and shuts down the attached socket so that a worker blocked in a
// socket read returns immediately. Signal waits observe the flag after
// `Signal::interrupt` wakes them (see `SessionControls::cancel`).

use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

enum Slot<T> {
    Open,
    Fired(T),
    Consumed,
    Closed,
}

/// Why `Signal::fire` refused a value.
#[derive(Debug, PartialEq, Eq)]
pub enum FireError {
    /// A value was already fired this round.
    AlreadyFired,
    /// The session that owned the signal has ended.
    Closed,
}

/// Why `Signal::wait` returned without a value.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitError {
    Cancelled,
    TimedOut,
    /// Closed, or the value was already consumed.
    Closed,
}

/// Single-shot hand-off of one value from the UI side to a worker.
pub struct Signal<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    /// A new, open signal.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Open),
            ready: Condvar::new(),
        }
    }

    /// Deliver `value`. The value is frozen at this point; later calls are
    /// refused rather than overwriting it.
    pub fn fire(&self, value: T) -> Result<(), FireError> {
        let mut slot = self.lock();
        match *slot {
            Slot::Open => {}
            Slot::Fired(_) | Slot::Consumed => return Err(FireError::AlreadyFired),
            Slot::Closed => return Err(FireError::Closed),
        }
        *slot = Slot::Fired(value);
        self.ready.notify_all();
        Ok(())
    }

    /// Whether a value has been fired (consumed or not).
    pub fn is_fired(&self) -> bool {
        matches!(*self.lock(), Slot::Fired(_) | Slot::Consumed)
    }

    /// Block until a value is fired, the token is cancelled, or `timeout`
    /// elapses. Consumes the value.
    pub fn wait(&self, cancel: &CancelToken, timeout: Option<Duration>) -> Result<T, WaitError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut slot = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(WaitError::Cancelled);
            }
            match std::mem::replace(&mut *slot, Slot::Consumed) {
                Slot::Fired(value) => return Ok(value),
                Slot::Open => *slot = Slot::Open,
                Slot::Consumed => return Err(WaitError::Closed),
                Slot::Closed => {
                    *slot = Slot::Closed;
                    return Err(WaitError::Closed);
                }
            }
            slot = match deadline {
                None => self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::TimedOut);
                    }
                    self.ready
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Refuse further `fire`s and wake any waiter. An unconsumed value is
    /// discarded.
    pub fn close(&self) {
        let mut slot = self.lock();
        *slot = Slot::Closed;
        self.ready.notify_all();
    }

    /// Wake any waiter so it re-checks its cancel token. Takes the lock so a
    /// waiter between its flag check and `Condvar::wait` cannot miss it.
    pub fn interrupt(&self) {
        let _slot = self.lock();
        self.ready.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
}

/// Cancellation shared between the UI side and a session worker.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Set the flag and shut down the attached socket, if any.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(stream) = self.lock_stream().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Register the session's socket so `cancel` can unblock reads on it.
    /// If the token is already cancelled the socket is shut down at once.
    pub fn attach(&self, stream: &TcpStream) -> std::io::Result<()> {
        let clone = stream.try_clone()?;
        let mut slot = self.lock_stream();
        if self.is_cancelled() {
            let _ = clone.shutdown(Shutdown::Both);
        } else {
            *slot = Some(clone);
        }
        Ok(())
    }

    /// Forget the attached socket (the session is releasing it).
    pub fn detach(&self) {
        self.lock_stream().take();
    }

    fn lock_stream(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.inner
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
