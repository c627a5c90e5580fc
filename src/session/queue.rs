//! Matchmaking Queue
//!
//! Strict FIFO of depth 1: at most one player waits process-wide, and
//! the very next requester is paired against them. The slot is cleared
//! the moment it is consumed or the waiting connection disconnects, so
//! a stale slot is never matched.

use crate::session::types::{ConnectionId, PlayerIdentity};

/// The single player waiting for an opponent.
#[derive(Debug, Clone)]
pub struct WaitingSlot {
    /// Connection that parked in the queue.
    pub connection_id: ConnectionId,
    /// Identity supplied with the `find_match` request.
    pub identity: PlayerIdentity,
}

/// Outcome of a matchmaking request against the queue.
#[derive(Debug)]
pub enum QueueOutcome {
    /// No one was waiting; the caller is now the slot.
    Queued,
    /// The caller was already the slot; nothing changed.
    AlreadyQueued,
    /// Someone was waiting; the slot was consumed.
    Paired(WaitingSlot),
}

/// Depth-1 matchmaking queue.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: Option<WaitingSlot>,
}

impl MatchQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self { waiting: None }
    }

    /// Pair the caller against the waiting slot, or park them in it.
    ///
    /// A repeat request from the connection already holding the slot is
    /// idempotent - a connection never matches against itself.
    pub fn pair_or_park(
        &mut self,
        connection_id: ConnectionId,
        identity: PlayerIdentity,
    ) -> QueueOutcome {
        match self.waiting.take() {
            Some(slot) if slot.connection_id == connection_id => {
                self.waiting = Some(slot);
                QueueOutcome::AlreadyQueued
            }
            Some(slot) => QueueOutcome::Paired(slot),
            None => {
                self.waiting = Some(WaitingSlot {
                    connection_id,
                    identity,
                });
                QueueOutcome::Queued
            }
        }
    }

    /// Clear the slot if it belongs to the given connection.
    /// Returns true if a slot was cleared.
    pub fn clear_if(&mut self, connection_id: ConnectionId) -> bool {
        match &self.waiting {
            Some(slot) if slot.connection_id == connection_id => {
                self.waiting = None;
                true
            }
            _ => false,
        }
    }

    /// Whether any player is currently waiting.
    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ident(name: &str) -> PlayerIdentity {
        PlayerIdentity::guest(name)
    }

    #[test]
    fn test_first_caller_is_queued() {
        let mut q = MatchQueue::new();
        let outcome = q.pair_or_park(ConnectionId::new(), ident("A"));
        assert!(matches!(outcome, QueueOutcome::Queued));
        assert!(q.is_waiting());
    }

    #[test]
    fn test_second_caller_consumes_slot() {
        let mut q = MatchQueue::new();
        let a = ConnectionId::new();
        q.pair_or_park(a, ident("A"));

        let outcome = q.pair_or_park(ConnectionId::new(), ident("B"));

        match outcome {
            QueueOutcome::Paired(slot) => assert_eq!(slot.connection_id, a),
            other => panic!("expected pairing, got {other:?}"),
        }
        assert!(!q.is_waiting(), "slot must be consumed by the pairing");
    }

    #[test]
    fn test_repeat_request_does_not_self_match() {
        let mut q = MatchQueue::new();
        let a = ConnectionId::new();
        q.pair_or_park(a, ident("A"));

        let outcome = q.pair_or_park(a, ident("A"));

        assert!(matches!(outcome, QueueOutcome::AlreadyQueued));
        assert!(q.is_waiting(), "slot must survive the repeat request");
    }

    #[test]
    fn test_clear_if_only_clears_owner() {
        let mut q = MatchQueue::new();
        let a = ConnectionId::new();
        q.pair_or_park(a, ident("A"));

        assert!(!q.clear_if(ConnectionId::new()));
        assert!(q.is_waiting());

        assert!(q.clear_if(a));
        assert!(!q.is_waiting());
        assert!(!q.clear_if(a), "second clear is a no-op");
    }

    #[test]
    fn test_cleared_slot_never_matched() {
        let mut q = MatchQueue::new();
        let a = ConnectionId::new();
        q.pair_or_park(a, ident("A"));
        q.clear_if(a);

        // The next arrival must be queued fresh, not paired with the
        // disconnected player.
        let outcome = q.pair_or_park(ConnectionId::new(), ident("B"));
        assert!(matches!(outcome, QueueOutcome::Queued));
    }

    proptest! {
        /// For any sequence of requests and disconnects, the queue never
        /// holds more than one waiting player, and every pairing consumes
        /// the slot.
        #[test]
        fn prop_at_most_one_waiting(ops in prop::collection::vec(0u8..3, 1..64)) {
            let mut q = MatchQueue::new();
            let mut live: Vec<ConnectionId> = Vec::new();

            for (i, op) in ops.iter().enumerate() {
                match *op {
                    0 => {
                        let conn = ConnectionId::new();
                        live.push(conn);
                        let was_waiting = q.is_waiting();
                        match q.pair_or_park(conn, ident(&format!("p{i}"))) {
                            QueueOutcome::Queued => prop_assert!(!was_waiting),
                            QueueOutcome::Paired(_) => {
                                prop_assert!(was_waiting);
                                prop_assert!(!q.is_waiting());
                            }
                            QueueOutcome::AlreadyQueued => prop_assert!(was_waiting),
                        }
                    }
                    1 => {
                        if let Some(conn) = live.pop() {
                            q.clear_if(conn);
                        }
                    }
                    _ => {
                        // Repeat request from the most recent connection.
                        if let Some(conn) = live.last().copied() {
                            q.pair_or_park(conn, ident("repeat"));
                        }
                    }
                }
            }
        }
    }
}
