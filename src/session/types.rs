//! Session Types
//!
//! Identifiers and records for matched 1v1 sessions.
//! Board contents are opaque to the server - it stores and relays
//! them without inspection.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single transport connection.
///
/// A new id is minted on every WebSocket accept, so the same logical
/// player gets a fresh `ConnectionId` each time they reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mint a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Compact hex form without hyphens (used in session ids).
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Unique identifier for a session.
///
/// Derived deterministically from the two founding connection ids and
/// stable for the session's lifetime, even after members rejoin on new
/// connections. Clients treat it as an opaque handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Derive the id from the two founding connections (white first).
    pub fn derive(white: ConnectionId, red: ConnectionId) -> Self {
        Self(format!("game_{}_{}", white.simple(), red.simple()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checker color, fixed at session creation.
///
/// First-arrived (the waiting player) is white, second is red.
/// Survives reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// First-arrived player.
    White,
    /// Second-arrived player.
    Red,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Red => f.write_str("red"),
        }
    }
}

/// Identity supplied by a player when requesting a match.
///
/// The wallet, when present, is the durable key across reconnections.
/// Players without a wallet are guests and cannot rejoin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Display name, relayed to the opponent.
    pub name: String,
    /// Durable wallet identifier, absent for guests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

impl PlayerIdentity {
    /// Identity with a wallet.
    pub fn with_wallet(name: impl Into<String>, wallet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wallet: Some(wallet.into()),
        }
    }

    /// Guest identity (no wallet, not reconnectable).
    pub fn guest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wallet: None,
        }
    }
}

/// One member of a session: identity plus the color fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Display name and optional wallet.
    #[serde(flatten)]
    pub identity: PlayerIdentity,
    /// Assigned checker color.
    pub color: Color,
}

/// A matched pair of players exchanging relayed events.
#[derive(Debug)]
pub struct Session {
    /// Stable session identifier.
    pub id: SessionId,
    /// Membership keyed by live connection id. Always exactly two entries.
    pub members: HashMap<ConnectionId, Member>,
    /// Live connection ids in seat order: `[white, red]`.
    pub connections: [ConnectionId; 2],
    /// Latest opaque board snapshot from `sync_state`, if any.
    pub board: Option<serde_json::Value>,
}

impl Session {
    /// Create a session pairing the waiting player (white) with the
    /// second arrival (red).
    pub fn new(
        white_conn: ConnectionId,
        white: PlayerIdentity,
        red_conn: ConnectionId,
        red: PlayerIdentity,
    ) -> Self {
        let id = SessionId::derive(white_conn, red_conn);
        let mut members = HashMap::with_capacity(2);
        members.insert(
            white_conn,
            Member {
                identity: white,
                color: Color::White,
            },
        );
        members.insert(
            red_conn,
            Member {
                identity: red,
                color: Color::Red,
            },
        );
        Self {
            id,
            members,
            connections: [white_conn, red_conn],
            board: None,
        }
    }

    /// The other member's connection id, if `conn` is a member.
    pub fn peer_of(&self, conn: ConnectionId) -> Option<ConnectionId> {
        if !self.members.contains_key(&conn) {
            return None;
        }
        self.connections.iter().copied().find(|c| *c != conn)
    }

    /// Connection currently bound to the given wallet, if any member
    /// carries it.
    pub fn connection_for_wallet(&self, wallet: &str) -> Option<ConnectionId> {
        self.members
            .iter()
            .find(|(_, m)| m.identity.wallet.as_deref() == Some(wallet))
            .map(|(conn, _)| *conn)
    }

    /// Replace a stale connection id with a new one, preserving the
    /// member's color and the board snapshot. Returns the member's color.
    pub fn rebind(&mut self, stale: ConnectionId, fresh: ConnectionId) -> Option<Color> {
        let member = self.members.remove(&stale)?;
        let color = member.color;
        self.members.insert(fresh, member);
        for slot in self.connections.iter_mut() {
            if *slot == stale {
                *slot = fresh;
            }
        }
        Some(color)
    }

    /// Wallets carried by members of this session.
    pub fn wallets(&self) -> impl Iterator<Item = &str> {
        self.members
            .values()
            .filter_map(|m| m.identity.wallet.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, ConnectionId, ConnectionId) {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let s = Session::new(
            a,
            PlayerIdentity::guest("A"),
            b,
            PlayerIdentity::with_wallet("B", "W2"),
        );
        (s, a, b)
    }

    #[test]
    fn test_session_id_deterministic() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_eq!(SessionId::derive(a, b), SessionId::derive(a, b));
        assert_ne!(SessionId::derive(a, b), SessionId::derive(b, a));
        assert!(SessionId::derive(a, b).as_str().starts_with("game_"));
    }

    #[test]
    fn test_colors_fixed_at_creation() {
        let (s, a, b) = session();
        assert_eq!(s.members[&a].color, Color::White);
        assert_eq!(s.members[&b].color, Color::Red);
        assert_eq!(s.connections, [a, b]);
    }

    #[test]
    fn test_peer_of() {
        let (s, a, b) = session();
        assert_eq!(s.peer_of(a), Some(b));
        assert_eq!(s.peer_of(b), Some(a));
        assert_eq!(s.peer_of(ConnectionId::new()), None);
    }

    #[test]
    fn test_connection_for_wallet() {
        let (s, _, b) = session();
        assert_eq!(s.connection_for_wallet("W2"), Some(b));
        assert_eq!(s.connection_for_wallet("W9"), None);
    }

    #[test]
    fn test_rebind_preserves_color_and_board() {
        let (mut s, _, b) = session();
        s.board = Some(serde_json::json!({"points": [1, 2]}));
        let fresh = ConnectionId::new();

        let color = s.rebind(b, fresh).expect("member should rebind");

        assert_eq!(color, Color::Red);
        assert!(s.members.contains_key(&fresh));
        assert!(!s.members.contains_key(&b));
        assert_eq!(s.connections[1], fresh);
        assert!(s.board.is_some());
    }

    #[test]
    fn test_rebind_unknown_connection_is_noop() {
        let (mut s, a, b) = session();
        assert!(s.rebind(ConnectionId::new(), ConnectionId::new()).is_none());
        assert_eq!(s.connections, [a, b]);
    }

    #[test]
    fn test_wallets_skips_guests() {
        let (s, _, _) = session();
        let wallets: Vec<&str> = s.wallets().collect();
        assert_eq!(wallets, vec!["W2"]);
    }
}
