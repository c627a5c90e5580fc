//! # Gammon Relay Server
//!
//! Matchmaking and relay server for 1v1 backgammon sessions. Pairs
//! clients into private sessions, relays opaque game events and chat
//! between the two peers, and holds a session open across transient
//! disconnects so the same wallet can resume it on a new connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GAMMON RELAY SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  session/            - Matchmaking and session lifecycle     │
//! │  ├── types.rs        - Connection/session ids, membership    │
//! │  ├── queue.rs        - Depth-1 matchmaking queue             │
//! │  ├── store.rs        - Session store + delivery groups       │
//! │  ├── grace.rs        - Disconnect grace timers               │
//! │  └── coordinator.rs  - Single-lock owner of all state        │
//! │                                                              │
//! │  network/            - Transport and wire format             │
//! │  ├── protocol.rs     - Event-tagged JSON messages            │
//! │  └── server.rs       - WebSocket accept loop                 │
//! │                                                              │
//! │  payout.rs           - Mock withdrawal collaborator          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Relay Guarantee
//!
//! Game payloads are never inspected or validated: board state lives in
//! the clients, and the server's contract is transport and session
//! lifecycle only. Per-sender delivery order is preserved; delivery to a
//! member with no live connection (mid-grace) is silently dropped and
//! recovered by the peer-driven state sync on rejoin.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod network;
pub mod payout;
pub mod session;

// Re-export commonly used types
pub use network::protocol::{ClientMessage, GameUpdate, ServerMessage};
pub use network::server::{RelayServer, RelayServerError, ServerConfig};
pub use session::coordinator::{Coordinator, MatchConfig};
pub use session::types::{Color, ConnectionId, PlayerIdentity, SessionId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
