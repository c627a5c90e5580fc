//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON with an `event` tag; relayed payloads are
//! opaque `serde_json::Value`s that the server never inspects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::types::{Color, ConnectionId, Member, PlayerIdentity, SessionId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Queue for a match, or rejoin a live session owned by the wallet.
    FindMatch(PlayerIdentity),

    /// Ask whether the wallet currently owns a live session.
    CheckActiveGame {
        /// Wallet to look up.
        wallet: String,
    },

    /// Opaque game event to relay to the opponent.
    #[serde(rename_all = "camelCase")]
    GameEvent {
        /// Target session.
        room_id: SessionId,
        /// Application-defined event type, relayed verbatim.
        #[serde(rename = "type")]
        kind: String,
        /// Opaque payload, relayed verbatim.
        #[serde(default)]
        payload: Value,
    },

    /// Full board snapshot to store and relay to the opponent.
    #[serde(rename_all = "camelCase")]
    SyncState {
        /// Target session.
        room_id: SessionId,
        /// Opaque board state.
        state: Value,
    },

    /// Chat line to relay to the opponent.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        /// Target session.
        room_id: SessionId,
        /// Chat text.
        message: String,
        /// Sender label shown to the opponent.
        sender: String,
    },

    /// Ask the external payout collaborator for a withdrawal.
    RequestWithdraw {
        /// Wallet to pay out to.
        wallet: String,
        /// Requested amount.
        amount: f64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// No opponent available yet; the caller is parked in the queue.
    WaitingForMatch,

    /// A match was created.
    MatchFound(MatchFoundInfo),

    /// Color assignment follow-up, sent right after `match_found`.
    AssignColor {
        /// The recipient's color.
        color: Color,
    },

    /// A rejoin was accepted.
    RejoinSuccess(RejoinInfo),

    /// The wallet owns a live session.
    #[serde(rename_all = "camelCase")]
    ActiveGameFound {
        /// The owning session.
        room_id: SessionId,
    },

    /// Relayed or server-originated game update.
    GameUpdate(GameUpdate),

    /// Relayed chat line.
    ChatMessage {
        /// Sender label as supplied by the opponent.
        sender: String,
        /// Chat text.
        text: String,
    },

    /// Payout collaborator acknowledged the withdrawal.
    WithdrawSuccess(WithdrawReceipt),
}

/// Payload of `match_found`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFoundInfo {
    /// New session id.
    pub room_id: SessionId,
    /// Both members keyed by connection id.
    pub players: HashMap<ConnectionId, Member>,
    /// The recipient's color.
    pub your_color: Color,
}

/// Payload of `rejoin_success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinInfo {
    /// The session rejoined.
    pub room_id: SessionId,
    /// The recipient's preserved color.
    pub color: Color,
    /// Current membership, with the rejoined connection in place.
    pub players: HashMap<ConnectionId, Member>,
}

/// A `game_update` envelope: an application-defined type plus an opaque
/// payload. Server-originated lifecycle notices use the `KIND_*` types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    /// Update type, relayed or server-originated.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl GameUpdate {
    /// Full board snapshot pushed by the opponent.
    pub const KIND_STATE_UPDATE: &'static str = "state_update";
    /// The opponent's connection came back.
    pub const KIND_OPPONENT_RECONNECTED: &'static str = "opponent_reconnected";
    /// Ask the recipient to push a full snapshot to the session.
    pub const KIND_REQUEST_STATE_SYNC: &'static str = "request_state_sync";
    /// The opponent disconnected; the grace window is running.
    pub const KIND_OPPONENT_DISCONNECTING: &'static str = "opponent_disconnecting";
    /// The opponent is gone for good; the session is terminated.
    pub const KIND_OPPONENT_DISCONNECTED: &'static str = "opponent_disconnected";

    /// Relay of a client-supplied event, verbatim.
    pub fn relay(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Board snapshot relayed from `sync_state`.
    pub fn state_update(state: Value) -> Self {
        Self::relay(Self::KIND_STATE_UPDATE, state)
    }

    /// Peer rejoined on a new connection.
    pub fn opponent_reconnected() -> Self {
        Self::relay(Self::KIND_OPPONENT_RECONNECTED, Value::Null)
    }

    /// Ask the remaining member to push a snapshot for the rejoiner.
    pub fn request_state_sync() -> Self {
        Self::relay(Self::KIND_REQUEST_STATE_SYNC, Value::Null)
    }

    /// Peer lost its connection; advertise the grace window in seconds.
    pub fn opponent_disconnecting(time_left_secs: u64) -> Self {
        Self::relay(
            Self::KIND_OPPONENT_DISCONNECTING,
            serde_json::json!({ "timeLeft": time_left_secs }),
        )
    }

    /// Peer never came back; the session is over.
    pub fn opponent_disconnected() -> Self {
        Self::relay(Self::KIND_OPPONENT_DISCONNECTED, Value::Null)
    }
}

/// Payload of `withdraw_success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Amount echoed from the request.
    pub amount: f64,
    /// Mock transaction signature.
    pub signature: String,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_match_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"find_match","name":"A","wallet":"W1"}"#).unwrap();
        match msg {
            ClientMessage::FindMatch(identity) => {
                assert_eq!(identity.name, "A");
                assert_eq!(identity.wallet.as_deref(), Some("W1"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_find_match_without_wallet_is_guest() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"find_match","name":"A"}"#).unwrap();
        match msg {
            ClientMessage::FindMatch(identity) => assert!(identity.wallet.is_none()),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_game_event_keeps_inner_type_field() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"game_event","roomId":"game_a_b","type":"roll","payload":{"dice":[3,5]}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::GameEvent { kind, payload, .. } => {
                assert_eq!(kind, "roll");
                assert_eq!(payload["dice"][1], 5);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_game_event_payload_defaults_to_null() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"game_event","roomId":"game_a_b","type":"pass"}"#)
                .unwrap();
        match msg {
            ClientMessage::GameEvent { payload, .. } => assert!(payload.is_null()),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_match_found_uses_camel_case() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut players = HashMap::new();
        players.insert(
            a,
            Member {
                identity: PlayerIdentity::guest("A"),
                color: Color::White,
            },
        );
        players.insert(
            b,
            Member {
                identity: PlayerIdentity::with_wallet("B", "W2"),
                color: Color::Red,
            },
        );
        let msg = ServerMessage::MatchFound(MatchFoundInfo {
            room_id: SessionId::derive(a, b),
            players,
            your_color: Color::Red,
        });

        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""event":"match_found""#));
        assert!(json.contains(r#""roomId":"game_"#));
        assert!(json.contains(r#""yourColor":"red""#));
        assert!(json.contains(r#""wallet":"W2""#));
        let _ = ServerMessage::from_json(&json).unwrap();
    }

    #[test]
    fn test_game_update_envelope_tag_does_not_collide() {
        let msg = ServerMessage::GameUpdate(GameUpdate::relay(
            "roll",
            serde_json::json!({"dice": [6, 6]}),
        ));
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""event":"game_update""#));
        assert!(json.contains(r#""type":"roll""#));

        match ServerMessage::from_json(&json).unwrap() {
            ServerMessage::GameUpdate(update) => assert_eq!(update.kind, "roll"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_opponent_disconnecting_advertises_window() {
        let update = GameUpdate::opponent_disconnecting(30);
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains(r#""timeLeft":30"#));
    }

    #[test]
    fn test_lifecycle_updates_omit_null_payload() {
        let json = serde_json::to_string(&GameUpdate::opponent_reconnected()).unwrap();
        assert!(!json.contains("payload"));
    }

    #[test]
    fn test_chat_relay_shape() {
        let inbound: ClientMessage = serde_json::from_str(
            r#"{"event":"chat_message","roomId":"game_a_b","message":"gg","sender":"A"}"#,
        )
        .unwrap();
        assert!(matches!(inbound, ClientMessage::ChatMessage { .. }));

        let outbound = ServerMessage::ChatMessage {
            sender: "A".into(),
            text: "gg".into(),
        };
        let json = outbound.to_json().unwrap();
        assert!(json.contains(r#""event":"chat_message""#));
        assert!(json.contains(r#""text":"gg""#));
    }

    #[test]
    fn test_waiting_for_match_is_bare_event() {
        let json = ServerMessage::WaitingForMatch.to_json().unwrap();
        assert_eq!(json, r#"{"event":"waiting_for_match"}"#);
    }

    #[test]
    fn test_withdraw_roundtrip() {
        let inbound: ClientMessage =
            serde_json::from_str(r#"{"event":"request_withdraw","wallet":"W1","amount":2.5}"#)
                .unwrap();
        match inbound {
            ClientMessage::RequestWithdraw { wallet, amount } => {
                assert_eq!(wallet, "W1");
                assert_eq!(amount, 2.5);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let ack = ServerMessage::WithdrawSuccess(WithdrawReceipt {
            amount: 2.5,
            signature: "ab".repeat(32),
        });
        let json = ack.to_json().unwrap();
        assert!(json.contains(r#""event":"withdraw_success""#));
    }
}
