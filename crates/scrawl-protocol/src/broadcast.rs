//! The broadcast seam between the engine and the transport layer.
//!
//! The engine never touches sockets. It emits [`ServerEvent`]s through a
//! [`Broadcaster`]: room-wide fan-out plus per-user unicast queues. The
//! contract is best effort, in send order — no delivery guarantee beyond
//! that, so implementations are fire-and-forget.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::{PlayerId, RoomCode, ServerEvent};

/// The per-user unicast queues (the original served these as separate
/// user destinations, e.g. `/queue/word`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserChannel {
    /// The secret word, drawer only.
    Word,
    /// Private guess rejections.
    Errors,
    /// Reconnection round snapshot.
    RoundState,
    /// Reconnection canvas replay.
    CanvasState,
}

impl std::fmt::Display for UserChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Word => "word",
            Self::Errors => "errors",
            Self::RoundState => "round-state",
            Self::CanvasState => "canvas-state",
        };
        f.write_str(s)
    }
}

/// Outbound message delivery, implemented by the transport layer.
pub trait Broadcaster: Send + Sync + 'static {
    /// Fan a message out to every subscriber of a room.
    fn publish_to_room(&self, room: &RoomCode, event: &ServerEvent);

    /// Deliver a message to a single user's channel queue.
    fn publish_to_user(
        &self,
        player: PlayerId,
        channel: UserChannel,
        event: &ServerEvent,
    );
}

#[derive(Default)]
struct Subscriptions {
    rooms: HashMap<RoomCode, Vec<mpsc::UnboundedSender<ServerEvent>>>,
    users: HashMap<PlayerId, Vec<mpsc::UnboundedSender<(UserChannel, ServerEvent)>>>,
}

/// In-process [`Broadcaster`] backed by unbounded channels.
///
/// Embedders (and the test suites) subscribe a receiver per room or per
/// user; dead receivers are pruned lazily on the next publish.
#[derive(Default)]
pub struct ChannelBroadcaster {
    subs: Mutex<Subscriptions>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a room's fan-out feed.
    pub fn subscribe_room(
        &self,
        room: &RoomCode,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subs.lock().expect("broadcaster lock poisoned");
        subs.rooms.entry(room.clone()).or_default().push(tx);
        rx
    }

    /// Subscribes to a user's unicast queues (all channels multiplexed).
    pub fn subscribe_user(
        &self,
        player: PlayerId,
    ) -> mpsc::UnboundedReceiver<(UserChannel, ServerEvent)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subs.lock().expect("broadcaster lock poisoned");
        subs.users.entry(player).or_default().push(tx);
        rx
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish_to_room(&self, room: &RoomCode, event: &ServerEvent) {
        let mut subs = self.subs.lock().expect("broadcaster lock poisoned");
        if let Some(senders) = subs.rooms.get_mut(room) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn publish_to_user(
        &self,
        player: PlayerId,
        channel: UserChannel,
        event: &ServerEvent,
    ) {
        let mut subs = self.subs.lock().expect("broadcaster lock poisoned");
        if let Some(senders) = subs.users.get_mut(&player) {
            senders.retain(|tx| tx.send((channel, event.clone())).is_ok());
        }
    }
}
