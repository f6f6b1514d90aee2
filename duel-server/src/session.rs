use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use duel_types::{PlayerId, PlayerProfile, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `close` observed about the departing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub player_id: PlayerId,
    /// True when this was the player's last handle; the disconnect grace
    /// window starts now.
    pub went_offline: bool,
}

/// Process-local map between player identities and live connection handles.
/// A player may transiently hold several handles while reconnecting;
/// delivery broadcasts to every handle. Cross-process coordination never
/// goes through here, only through the game state store.
pub struct SessionRegistry {
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    connection_player: DashMap<ConnectionId, PlayerId>,
    player_handles: DashMap<PlayerId, HashSet<ConnectionId>>,
    profiles: DashMap<PlayerId, PlayerProfile>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
            connection_player: DashMap::new(),
            player_handles: DashMap::new(),
            profiles: DashMap::new(),
        }
    }

    /// Track a fresh connection and hand back the outbound message stream.
    pub fn open(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.insert(id, sender);
        receiver
    }

    /// Bind a connection to a registered identity. Explicit: clients send a
    /// register message after the handshake.
    pub fn bind(&self, id: ConnectionId, profile: PlayerProfile) {
        let player_id = profile.id;
        self.connection_player.insert(id, player_id);
        self.player_handles
            .entry(player_id)
            .or_default()
            .insert(id);
        self.profiles.insert(player_id, profile);
    }

    /// Drop a connection. Returns the bound player and whether their handle
    /// set just became empty.
    pub fn close(&self, id: ConnectionId) -> Option<Departure> {
        self.senders.remove(&id);
        let (_, player_id) = self.connection_player.remove(&id)?;

        let mut went_offline = false;
        if let Some(mut handles) = self.player_handles.get_mut(&player_id) {
            handles.remove(&id);
            went_offline = handles.is_empty();
        }
        if went_offline {
            self.player_handles.remove(&player_id);
            self.profiles.remove(&player_id);
        }

        Some(Departure {
            player_id,
            went_offline,
        })
    }

    pub fn player_of(&self, id: ConnectionId) -> Option<PlayerId> {
        self.connection_player.get(&id).map(|entry| *entry)
    }

    pub fn profile_of(&self, player_id: &PlayerId) -> Option<PlayerProfile> {
        self.profiles.get(player_id).map(|entry| entry.clone())
    }

    pub fn is_online(&self, player_id: &PlayerId) -> bool {
        self.player_handles
            .get(player_id)
            .map(|handles| !handles.is_empty())
            .unwrap_or(false)
    }

    pub fn send_to_connection(&self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.senders.get(&id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Deliver to every handle the player currently holds.
    pub fn send_to_player(&self, player_id: &PlayerId, message: ServerMessage) {
        let handles: Vec<ConnectionId> = match self.player_handles.get(player_id) {
            Some(set) => set.iter().copied().collect(),
            None => return,
        };
        for handle in handles {
            if !self.send_to_connection(handle, message.clone()) {
                tracing::warn!("dropping stale handle {} for player {}", handle, player_id);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    pub fn registered_player_count(&self) -> usize {
        self.player_handles.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
