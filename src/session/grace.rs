//! Disconnect Grace Timers
//!
//! Tracks one pending reconnection window per wallet. Timer firing and
//! cancellation race by nature; every armed entry carries a generation
//! ticket, and the expiry path must present a matching ticket to claim
//! the entry. Whichever of {cancel, claim} runs first under the core
//! lock wins, the loser is a no-op.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::session::types::{ConnectionId, SessionId};

/// A pending grace window for one wallet.
#[derive(Debug, Clone)]
pub struct GraceEntry {
    /// Session the disconnected wallet belongs to.
    pub session_id: SessionId,
    /// Connection id that went away, to be replaced on rejoin.
    pub stale_connection: ConnectionId,
    /// Ticket the expiry task must present to claim this entry.
    pub generation: u64,
    /// When the window elapses.
    pub deadline: Instant,
}

/// Table of pending grace windows, keyed by wallet. At most one entry
/// per wallet at any time.
#[derive(Debug, Default)]
pub struct GraceTable {
    timers: HashMap<String, GraceEntry>,
    next_generation: u64,
}

impl GraceTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a window for the wallet, replacing any previous entry.
    /// Returns the generation ticket for the expiry task.
    pub fn arm(
        &mut self,
        wallet: &str,
        session_id: SessionId,
        stale_connection: ConnectionId,
        window: Duration,
    ) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.timers.insert(
            wallet.to_string(),
            GraceEntry {
                session_id,
                stale_connection,
                generation,
                deadline: Instant::now() + window,
            },
        );
        generation
    }

    /// Cancel the wallet's pending window, if any. Safe to call when no
    /// entry exists or the timer already fired.
    pub fn cancel(&mut self, wallet: &str) -> Option<GraceEntry> {
        self.timers.remove(wallet)
    }

    /// Claim the wallet's entry for expiry. Succeeds only if the entry
    /// still exists and carries the presented generation; a stale ticket
    /// (cancelled or re-armed since) claims nothing.
    pub fn claim(&mut self, wallet: &str, generation: u64) -> Option<GraceEntry> {
        match self.timers.get(wallet) {
            Some(entry) if entry.generation == generation => self.timers.remove(wallet),
            _ => None,
        }
    }

    /// Whether the wallet has a pending window.
    pub fn is_pending(&self, wallet: &str) -> bool {
        self.timers.contains_key(wallet)
    }

    /// Drop every entry bound to the given session. Used when a session
    /// terminates while its other member is also mid-grace.
    pub fn cancel_session(&mut self, session_id: &SessionId) {
        self.timers.retain(|_, entry| entry.session_id != *session_id);
    }
}
