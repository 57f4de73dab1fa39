//! Non-blocking mutual exclusion for session operations.
//!
//! Callers that find the lock held skip their work instead of waiting. Every
//! acquisition carries a deadline; once it passes, the next observer clears the
//! lock so a stuck operation cannot wedge the controller. No timer runs for
//! the deadline: the forced release, its `warn!` and the `forced_releases`
//! count all happen on the first acquire or inspection after it.
//!
//! Each acquisition also gets a generation number, which lets a slow holder
//! notice it has been superseded and drop its result instead of overwriting
//! newer state.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Default time a holder may keep the lock before it is force-released.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Proof of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTicket {
    generation: u64,
}

impl LockTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Holder {
    generation: u64,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<Holder>,
    generation: u64,
    forced_releases: u64,
}

impl LockState {
    fn expire(&mut self, now: Instant) {
        if let Some(holder) = &self.holder {
            if now >= holder.deadline {
                warn!(
                    generation = holder.generation,
                    "Lock timeout triggered - forcing release"
                );
                self.holder = None;
                self.forced_releases += 1;
            }
        }
    }
}

/// Exclusive flag with an automatic release deadline.
#[derive(Debug)]
pub struct StateLock {
    timeout: Duration,
    state: Mutex<LockState>,
}

impl Default for StateLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl StateLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: Mutex::new(LockState::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take the lock if it is free. Never waits.
    pub fn try_acquire(&self) -> Option<LockTicket> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Option<LockTicket> {
        let mut state = self.state.lock();
        state.expire(now);
        if state.holder.is_some() {
            return None;
        }

        state.generation += 1;
        let generation = state.generation;
        state.holder = Some(Holder {
            generation,
            deadline: now + self.timeout,
        });
        trace!(generation, "lock acquired");
        Some(LockTicket { generation })
    }

    /// Release the acquisition named by `ticket`.
    ///
    /// Releasing twice, or releasing after a forced release, does nothing and
    /// returns false.
    pub fn release(&self, ticket: &LockTicket) -> bool {
        let mut state = self.state.lock();
        match &state.holder {
            Some(holder) if holder.generation == ticket.generation => {
                state.holder = None;
                trace!(generation = ticket.generation, "lock released");
                true
            }
            _ => false,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Instant::now())
    }

    pub fn is_locked_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.expire(now);
        state.holder.is_some()
    }

    /// Returns true while `ticket` still owns the lock.
    pub fn is_current(&self, ticket: &LockTicket) -> bool {
        self.is_current_at(ticket, Instant::now())
    }

    pub fn is_current_at(&self, ticket: &LockTicket, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.expire(now);
        matches!(&state.holder, Some(h) if h.generation == ticket.generation)
    }

    /// Number of acquisitions cleared by the deadline so far.
    pub fn forced_releases(&self) -> u64 {
        self.state.lock().forced_releases
    }

    /// Scoped variant of [`StateLock::try_acquire`].
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        self.try_acquire().map(|ticket| LockGuard { lock: self, ticket })
    }
}

/// Releases its acquisition when dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a StateLock,
    ticket: LockTicket,
}

impl LockGuard<'_> {
    pub fn ticket(&self) -> LockTicket {
        self.ticket
    }

    pub fn is_current(&self) -> bool {
        self.lock.is_current(&self.ticket)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.ticket);
    }
}
