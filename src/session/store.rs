//! Session Store
//!
//! The authoritative map of live sessions. Owns session records, the
//! wallet index enforcing at-most-one-session-per-wallet, and each
//! session's delivery group. All mutation goes through the coordinator's
//! lock - nothing here is shared directly with callers.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::network::protocol::ServerMessage;
use crate::session::types::{Color, ConnectionId, Session, SessionId};

/// Per-connection outbound channel. Unbounded so delivery never awaits
/// inside the core lock; a closed receiver drops the message silently.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Session store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A wallet already owns a live session.
    #[error("wallet {0} already owns a live session")]
    WalletInSession(String),

    /// Session id collision (two sessions founded by the same pair).
    #[error("session {0} already exists")]
    DuplicateSession(SessionId),
}

/// Delivery group for one session: the subscribed connections and their
/// outbound channels. Subscription changes happen on session creation,
/// rejoin, and termination only.
#[derive(Debug, Default)]
pub struct DeliveryGroup {
    members: HashMap<ConnectionId, OutboundSender>,
}

impl DeliveryGroup {
    /// Add a connection to the group.
    pub fn subscribe(&mut self, conn: ConnectionId, sender: OutboundSender) {
        self.members.insert(conn, sender);
    }

    /// Remove a connection from the group.
    pub fn unsubscribe(&mut self, conn: ConnectionId) {
        self.members.remove(&conn);
    }

    /// Send to a single subscribed connection. A member with no live
    /// channel (mid-grace) is silently skipped - no buffering.
    pub fn send_to(&self, conn: ConnectionId, msg: ServerMessage) {
        if let Some(sender) = self.members.get(&conn) {
            let _ = sender.send(msg);
        }
    }

    /// Send to every subscribed connection except `sender_conn`.
    pub fn send_except(&self, sender_conn: ConnectionId, msg: ServerMessage) {
        for (conn, sender) in &self.members {
            if *conn != sender_conn {
                let _ = sender.send(msg.clone());
            }
        }
    }
}

/// Authoritative store of live sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    groups: HashMap<SessionId, DeliveryGroup>,
    /// Wallet -> owning session. Guests never appear here.
    wallet_index: HashMap<String, SessionId>,
}

impl SessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly created session and subscribe both founders to its
    /// delivery group.
    pub fn insert(
        &mut self,
        session: Session,
        white_sender: OutboundSender,
        red_sender: OutboundSender,
    ) -> Result<(), StoreError> {
        for wallet in session.wallets() {
            if self.wallet_index.contains_key(wallet) {
                return Err(StoreError::WalletInSession(wallet.to_string()));
            }
        }
        if self.sessions.contains_key(&session.id) {
            return Err(StoreError::DuplicateSession(session.id.clone()));
        }

        let mut group = DeliveryGroup::default();
        group.subscribe(session.connections[0], white_sender);
        group.subscribe(session.connections[1], red_sender);

        for wallet in session.wallets() {
            self.wallet_index
                .insert(wallet.to_string(), session.id.clone());
        }
        self.groups.insert(session.id.clone(), group);
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Session owned by the given wallet, if alive.
    pub fn session_for_wallet(&self, wallet: &str) -> Option<&Session> {
        self.wallet_index
            .get(wallet)
            .and_then(|id| self.sessions.get(id))
    }

    /// The session's delivery group.
    pub fn group(&self, id: &SessionId) -> Option<&DeliveryGroup> {
        self.groups.get(id)
    }

    /// Session containing the given connection as a live member.
    pub fn session_for_connection(&self, conn: ConnectionId) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.members.contains_key(&conn))
    }

    /// Rebind a session member from a stale connection to a fresh one:
    /// membership, seat order, and delivery-group subscription all move;
    /// color and board are untouched. Returns the preserved color.
    pub fn rebind(
        &mut self,
        id: &SessionId,
        stale: ConnectionId,
        fresh: ConnectionId,
        sender: OutboundSender,
    ) -> Option<Color> {
        let session = self.sessions.get_mut(id)?;
        let color = session.rebind(stale, fresh)?;
        if let Some(group) = self.groups.get_mut(id) {
            group.unsubscribe(stale);
            group.subscribe(fresh, sender);
        }
        Some(color)
    }

    /// Remove a session, its delivery group, and its wallet-index
    /// entries. Idempotent: removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.groups.remove(id);
        self.wallet_index.retain(|_, owner| owner != id);
        debug!(session_id = %id, "session removed");
        Some(session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are alive.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
