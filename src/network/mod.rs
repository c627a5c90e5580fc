//! Network Layer
//!
//! WebSocket transport and wire protocol. Session lifecycle and routing
//! decisions all happen in `session/` - this layer parses frames and
//! forwards them.

pub mod protocol;
pub mod server;

pub use protocol::{
    ClientMessage, GameUpdate, MatchFoundInfo, RejoinInfo, ServerMessage, WithdrawReceipt,
};
pub use server::{RelayServer, RelayServerError, ServerConfig};
