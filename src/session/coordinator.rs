//! Match Coordinator
//!
//! Single owner of all mutable matchmaking state: the connection
//! registry, the waiting slot, the session store, and the grace table
//! live behind one lock, so every check-then-act sequence (match,
//! rejoin, disconnect, expiry) is atomic with respect to the others.
//! Callers never see the raw maps - only the operations below.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::network::protocol::{GameUpdate, MatchFoundInfo, RejoinInfo, ServerMessage};
use crate::session::grace::GraceTable;
use crate::session::queue::{MatchQueue, QueueOutcome, WaitingSlot};
use crate::session::store::{OutboundSender, SessionStore};
use crate::session::types::{Color, ConnectionId, PlayerIdentity, Session, SessionId};

/// Coordinator tunables.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How long a wallet-identified member may stay disconnected before
    /// the session terminates.
    pub grace_window: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(30),
        }
    }
}

/// All mutable matchmaking state, guarded as one unit.
#[derive(Default)]
struct CoreState {
    /// Live connections and their outbound channels.
    registry: HashMap<ConnectionId, OutboundSender>,
    queue: MatchQueue,
    store: SessionStore,
    grace: GraceTable,
}

/// The matchmaking, reconnection, and relay core.
///
/// Cheap to clone - clones share the same underlying state. Each
/// connection task holds a clone; expiry tasks hold one too.
#[derive(Clone)]
pub struct Coordinator {
    config: MatchConfig,
    state: Arc<Mutex<CoreState>>,
}

impl Coordinator {
    /// Create a coordinator with the given tunables.
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(CoreState::default())),
        }
    }

    /// Register a freshly accepted connection and its outbound channel.
    pub async fn connect(&self, conn: ConnectionId, sender: OutboundSender) {
        let mut s = self.state.lock().await;
        s.registry.insert(conn, sender);
        debug!(%conn, "connection registered");
    }

    /// Handle `find_match`: rejoin if the wallet owns a live session,
    /// otherwise pair against the waiting slot or become it.
    pub async fn find_match(&self, conn: ConnectionId, identity: PlayerIdentity) {
        let mut s = self.state.lock().await;

        // Identity lookup comes first: a wallet that owns a live session
        // always resolves to rejoin, regardless of queue state.
        if let Some(wallet) = identity.wallet.as_deref() {
            let owned = s.store.session_for_wallet(wallet).map(|sess| sess.id.clone());
            if let Some(session_id) = owned {
                Self::rejoin(&mut s, conn, wallet, session_id);
                return;
            }
        }

        match s.queue.pair_or_park(conn, identity.clone()) {
            QueueOutcome::Queued | QueueOutcome::AlreadyQueued => {
                Self::send_direct(&s, conn, ServerMessage::WaitingForMatch);
                debug!(%conn, "waiting for match");
            }
            QueueOutcome::Paired(slot) => {
                Self::create_session(&mut s, slot, conn, identity);
            }
        }
    }

    /// Handle `check_active_game`: lookup only, replies `active_game_found`
    /// iff the wallet owns a live session.
    pub async fn check_active_game(&self, conn: ConnectionId, wallet: &str) {
        let s = self.state.lock().await;
        if let Some(session) = s.store.session_for_wallet(wallet) {
            let room_id = session.id.clone();
            Self::send_direct(&s, conn, ServerMessage::ActiveGameFound { room_id });
        }
    }

    /// Relay an opaque game event to the sender's peer.
    pub async fn relay_event(
        &self,
        conn: ConnectionId,
        room_id: &SessionId,
        kind: String,
        payload: Value,
    ) {
        let s = self.state.lock().await;
        Self::relay_update(&s, conn, room_id, GameUpdate::relay(kind, payload));
    }

    /// Store the latest board snapshot and relay it to the peer as a
    /// `state_update`.
    pub async fn sync_state(&self, conn: ConnectionId, room_id: &SessionId, state: Value) {
        let mut s = self.state.lock().await;
        match s.store.get_mut(room_id) {
            Some(session) if session.members.contains_key(&conn) => {
                session.board = Some(state.clone());
            }
            _ => {
                debug!(%conn, session_id = %room_id, "sync_state from non-member ignored");
                return;
            }
        }
        if let Some(group) = s.store.group(room_id) {
            group.send_except(conn, ServerMessage::GameUpdate(GameUpdate::state_update(state)));
        }
    }

    /// Relay a chat line to the sender's peer.
    pub async fn chat(
        &self,
        conn: ConnectionId,
        room_id: &SessionId,
        message: String,
        sender_label: String,
    ) {
        let s = self.state.lock().await;
        match s.store.get(room_id) {
            Some(session) if session.members.contains_key(&conn) => {}
            _ => {
                debug!(%conn, session_id = %room_id, "chat from non-member ignored");
                return;
            }
        }
        if let Some(group) = s.store.group(room_id) {
            group.send_except(
                conn,
                ServerMessage::ChatMessage {
                    sender: sender_label,
                    text: message,
                },
            );
        }
    }

    /// Handle a transport-level disconnect. Membership takes precedence
    /// over the queue: a connection that joined a session is never
    /// simultaneously the waiting slot.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut s = self.state.lock().await;
        s.registry.remove(&conn);

        let membership = s.store.session_for_connection(conn).and_then(|sess| {
            let member = sess.members.get(&conn)?;
            Some((
                sess.id.clone(),
                member.identity.wallet.clone(),
                sess.peer_of(conn),
            ))
        });

        let Some((session_id, wallet, peer)) = membership else {
            if s.queue.clear_if(conn) {
                debug!(%conn, "waiting slot cleared");
            }
            return;
        };

        match wallet {
            Some(wallet) => {
                let window = self.config.grace_window;
                if let (Some(peer), Some(group)) = (peer, s.store.group(&session_id)) {
                    group.send_to(
                        peer,
                        ServerMessage::GameUpdate(GameUpdate::opponent_disconnecting(
                            window.as_secs(),
                        )),
                    );
                }
                let generation = s.grace.arm(&wallet, session_id.clone(), conn, window);
                info!(%conn, %wallet, session_id = %session_id, "grace window armed");
                drop(s);

                let this = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    this.expire_grace(&wallet, generation).await;
                });
            }
            None => {
                // Guests carry no reconnection identity: terminate now.
                if let (Some(peer), Some(group)) = (peer, s.store.group(&session_id)) {
                    group.send_to(
                        peer,
                        ServerMessage::GameUpdate(GameUpdate::opponent_disconnected()),
                    );
                }
                Self::terminate(&mut s, &session_id);
                info!(%conn, session_id = %session_id, "guest left, session terminated");
            }
        }
    }

    /// Expiry path for an armed grace window. The generation ticket
    /// decides the race against cancellation: a rejoin that already
    /// removed the entry (or re-armed it) makes this a no-op, as does a
    /// session deleted by another path.
    async fn expire_grace(&self, wallet: &str, generation: u64) {
        let mut s = self.state.lock().await;
        let Some(entry) = s.grace.claim(wallet, generation) else {
            return;
        };
        let Some(session) = s.store.get(&entry.session_id) else {
            return;
        };
        let peer = session.peer_of(entry.stale_connection);
        if let (Some(peer), Some(group)) = (peer, s.store.group(&entry.session_id)) {
            group.send_to(
                peer,
                ServerMessage::GameUpdate(GameUpdate::opponent_disconnected()),
            );
        }
        Self::terminate(&mut s, &entry.session_id);
        info!(%wallet, session_id = %entry.session_id, "grace window elapsed, session terminated");
    }

    /// Rejoin: rebind the wallet's seat to the new connection, cancel
    /// any pending grace window, and bring both sides up to date.
    /// Cancellation and rebinding happen under the one lock, so a
    /// concurrently firing expiry for the same wallet loses cleanly.
    fn rejoin(s: &mut CoreState, conn: ConnectionId, wallet: &str, session_id: SessionId) {
        s.grace.cancel(wallet);

        let Some(sender) = s.registry.get(&conn).cloned() else {
            warn!(%conn, "rejoin from unregistered connection ignored");
            return;
        };
        let stale = s
            .store
            .get(&session_id)
            .and_then(|sess| sess.connection_for_wallet(wallet));
        let Some(stale) = stale else {
            return;
        };
        let Some(color) = s.store.rebind(&session_id, stale, conn, sender) else {
            return;
        };

        let (players, peer) = match s.store.get(&session_id) {
            Some(session) => (session.members.clone(), session.peer_of(conn)),
            None => return,
        };

        if let Some(group) = s.store.group(&session_id) {
            if let Some(peer) = peer {
                group.send_to(
                    peer,
                    ServerMessage::GameUpdate(GameUpdate::opponent_reconnected()),
                );
                // The rejoiner is state-blind; the remaining member holds
                // the authoritative board and must push a snapshot.
                group.send_to(
                    peer,
                    ServerMessage::GameUpdate(GameUpdate::request_state_sync()),
                );
            }
            group.send_to(
                conn,
                ServerMessage::RejoinSuccess(RejoinInfo {
                    room_id: session_id.clone(),
                    color,
                    players,
                }),
            );
        }
        info!(%conn, %wallet, session_id = %session_id, "player rejoined");
    }

    /// Pair the waiting slot with the second arrival into a new session
    /// and notify both parties: `match_found` with each recipient's own
    /// color, then the `assign_color` follow-up expected by existing
    /// clients (sent synchronously, no delay).
    fn create_session(
        s: &mut CoreState,
        slot: WaitingSlot,
        red_conn: ConnectionId,
        red_identity: PlayerIdentity,
    ) {
        let white_conn = slot.connection_id;
        let Some(white_sender) = s.registry.get(&white_conn).cloned() else {
            // The waiting connection vanished without a disconnect event;
            // the caller parks instead of matching a ghost.
            warn!(%white_conn, "stale waiting slot dropped");
            s.queue.pair_or_park(red_conn, red_identity);
            Self::send_direct(s, red_conn, ServerMessage::WaitingForMatch);
            return;
        };
        let Some(red_sender) = s.registry.get(&red_conn).cloned() else {
            return;
        };

        let session = Session::new(white_conn, slot.identity, red_conn, red_identity);
        let session_id = session.id.clone();
        let players = session.members.clone();

        if let Err(err) = s.store.insert(session, white_sender.clone(), red_sender.clone()) {
            warn!(%err, session_id = %session_id, "session creation rejected");
            return;
        }

        let _ = white_sender.send(ServerMessage::MatchFound(MatchFoundInfo {
            room_id: session_id.clone(),
            players: players.clone(),
            your_color: Color::White,
        }));
        let _ = red_sender.send(ServerMessage::MatchFound(MatchFoundInfo {
            room_id: session_id.clone(),
            players,
            your_color: Color::Red,
        }));
        let _ = white_sender.send(ServerMessage::AssignColor {
            color: Color::White,
        });
        let _ = red_sender.send(ServerMessage::AssignColor { color: Color::Red });

        info!(session_id = %session_id, %white_conn, %red_conn, "match created");
    }

    /// Deliver a `game_update` to every member of the session except the
    /// sender. Events referencing a session the sender is not a member
    /// of are ignored, never forwarded.
    fn relay_update(s: &CoreState, conn: ConnectionId, room_id: &SessionId, update: GameUpdate) {
        match s.store.get(room_id) {
            Some(session) if session.members.contains_key(&conn) => {}
            _ => {
                debug!(%conn, session_id = %room_id, "relay from non-member ignored");
                return;
            }
        }
        if let Some(group) = s.store.group(room_id) {
            group.send_except(conn, ServerMessage::GameUpdate(update));
        }
    }

    /// Remove a session and every grace timer bound to it.
    fn terminate(s: &mut CoreState, session_id: &SessionId) {
        s.store.remove(session_id);
        s.grace.cancel_session(session_id);
    }

    /// Direct send to a registered connection; silently dropped if the
    /// connection is gone.
    fn send_direct(s: &CoreState, conn: ConnectionId, msg: ServerMessage) {
        if let Some(sender) = s.registry.get(&conn) {
            let _ = sender.send(msg);
        }
    }
}
