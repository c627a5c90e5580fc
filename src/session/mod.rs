//! Session Layer
//!
//! Matchmaking, session membership, reconnection, and disconnect grace
//! handling. All mutable state is owned by the [`Coordinator`] behind a
//! single lock; the submodules are its building blocks.

pub mod coordinator;
pub mod grace;
pub mod queue;
pub mod store;
pub mod types;

pub use coordinator::{Coordinator, MatchConfig};
pub use grace::{GraceEntry, GraceTable};
pub use queue::{MatchQueue, QueueOutcome, WaitingSlot};
pub use store::{DeliveryGroup, OutboundSender, SessionStore, StoreError};
pub use types::{Color, ConnectionId, Member, PlayerIdentity, Session, SessionId};
