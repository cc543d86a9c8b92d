//! Player registry for the room server
//!
//! This module tracks every connected player on the server side:
//! - Stable ID assignment and capacity limits
//! - Address lookup so incoming datagrams can be routed to a player
//! - Room grouping for state broadcasts
//! - Connection health monitoring and automatic cleanup
//!
//! Players are handed out as `Arc<PlayerState>` so the dispatcher and the
//! broadcaster can work on them without holding the registry lock.

use crate::network::Connection;
use crate::player::PlayerState;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Players with no traffic for this long are dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Members of one room, as `(player_id, player)` pairs sorted by ID
pub type RoomMembers = Vec<(u32, Arc<PlayerState<Connection>>)>;

/// Registry entry for a connected player
///
/// Holds the bookkeeping the registry needs next to the shared player
/// state: the address packets arrive from and when we last heard from it.
#[derive(Debug)]
pub struct Client {
    /// Unique player identifier assigned by the server
    pub id: u32,
    /// Network address the player sends from
    pub addr: SocketAddr,
    /// Last time we received any packet from this player
    pub last_seen: Instant,
    /// Position, room and outbound connection
    pub player: Arc<PlayerState<Connection>>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, player: PlayerState<Connection>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            player: Arc::new(player),
        }
    }

    /// Checks if the player has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Keeps all connected players, keyed by their ID
///
/// The registry is wrapped in `Arc<RwLock<_>>` by the server. Entries are
/// only ever inserted or removed, never re-pointed, so a joined player who
/// switches rooms gets a fresh `PlayerState` under a new ID.
pub struct PlayerRegistry {
    clients: HashMap<u32, Client>,
    next_player_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl PlayerRegistry {
    /// Creates an empty registry with the default timeout
    ///
    /// Player IDs start from 1 and increment for each new join.
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, CLIENT_TIMEOUT)
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_player_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new player at the origin of `room_id`
    ///
    /// Returns None if the server is at capacity or has run out of IDs.
    pub fn add_player(
        &mut self,
        addr: SocketAddr,
        room_id: &str,
        connection: Connection,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        // IDs are never reused, so an exhausted counter refuses new players
        let player_id = self.next_player_id;
        self.next_player_id = player_id.checked_add(1)?;

        let player = PlayerState::new(connection, room_id);
        info!(
            "Player {} joined room {:?} from {}",
            player_id, room_id, addr
        );
        self.clients
            .insert(player_id, Client::new(player_id, addr, player));

        Some(player_id)
    }

    /// Removes a player from the server
    ///
    /// Returns true if the player was found and removed, false if they
    /// were already gone. Callers still holding the `Arc` may finish an
    /// in-flight operation on it; it simply stops being broadcast.
    pub fn remove_player(&mut self, player_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(player_id) {
            info!(
                "Player {} left room {:?}",
                client.id,
                client.player.room_id()
            );
            true
        } else {
            false
        }
    }

    /// Finds a player ID by the address they send from
    pub fn find_player_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, player_id: u32) -> Option<Arc<PlayerState<Connection>>> {
        self.clients
            .get(&player_id)
            .map(|client| Arc::clone(&client.player))
    }

    /// Refreshes the last-seen time of a player
    ///
    /// Returns false if the player ID is unknown.
    pub fn touch(&mut self, player_id: u32) -> bool {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    /// Groups all players by room
    ///
    /// Rooms and members come out in a stable order so snapshots are
    /// deterministic.
    pub fn rooms(&self) -> BTreeMap<String, RoomMembers> {
        let mut rooms: BTreeMap<String, RoomMembers> = BTreeMap::new();

        for (id, client) in &self.clients {
            rooms
                .entry(client.player.room_id().to_string())
                .or_default()
                .push((*id, Arc::clone(&client.player)));
        }

        for members in rooms.values_mut() {
            members.sort_by_key(|(id, _)| *id);
        }

        rooms
    }

    /// Checks for and removes timed-out players
    ///
    /// Returns the removed entries, sorted by ID, so the caller can still
    /// reach each player through its connection.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.timeout;
        let mut timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();
        timed_out.sort_unstable();

        timed_out
            .iter()
            .filter_map(|player_id| self.clients.remove(player_id))
            .inspect(|client| info!("Player {} timed out from {}", client.id, client.addr))
            .collect()
    }

    /// Returns the number of connected players
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
