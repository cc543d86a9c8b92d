//! Server network layer handling UDP communications, command dispatch and room broadcasts

use crate::player::PlayerState;
use crate::registry::PlayerRegistry;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Direction, Packet, PlayerPosition, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout {
        player_id: u32,
        player: Arc<PlayerState<Connection>>,
    },
    Shutdown,
}

/// Messages sent to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Outbound channel to a single player
///
/// Packets are queued for the sender task, which owns the socket. Cloning
/// a connection is cheap; all clones feed the same queue.
#[derive(Debug, Clone)]
pub struct Connection {
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<GameMessage>,
}

impl Connection {
    pub fn new(addr: SocketAddr, outbound: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { addr, outbound }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues a packet for this player
    ///
    /// Fails only once the sender task has stopped.
    pub fn send(&self, packet: Packet) -> Result<(), SendError<GameMessage>> {
        self.outbound.send(GameMessage::SendPacket {
            packet,
            addr: self.addr,
        })
    }
}

/// Applies one movement command to a player
pub fn apply_move<C>(player: &PlayerState<C>, direction: Direction) {
    match direction {
        Direction::Up => player.move_up(),
        Direction::Down => player.move_down(),
        Direction::Left => player.move_left(),
        Direction::Right => player.move_right(),
    }
}

/// Tells a player removed for inactivity why their packets are now ignored
pub fn notify_timeout(player_id: u32, player: &PlayerState<Connection>) {
    let packet = Packet::Disconnected {
        reason: "Client timeout".to_string(),
    };

    if let Err(e) = player.connection().send(packet) {
        warn!("Failed to notify player {} of timeout: {}", player_id, e);
    }
}

/// Sends every room its current snapshot
///
/// Each member of a room receives one `RoomState` listing the positions of
/// all members. Returns the number of packets queued.
pub async fn broadcast_room_states(players: &RwLock<PlayerRegistry>, tick: u32) -> usize {
    let rooms = players.read().await.rooms();
    let mut queued = 0;

    for (room_id, members) in rooms {
        let snapshot: Vec<PlayerPosition> = members
            .iter()
            .map(|(id, player)| PlayerPosition {
                id: *id,
                position: player.position(),
            })
            .collect();

        let packet = Packet::RoomState {
            tick,
            room_id,
            players: snapshot,
        };

        for (player_id, player) in &members {
            match player.connection().send(packet.clone()) {
                Ok(()) => queued += 1,
                Err(e) => error!("Failed to queue room state for player {}: {}", player_id, e),
            }
        }
    }

    queued
}

/// Main server coordinating networking, dispatch and broadcasts
pub struct Server {
    socket: Arc<UdpSocket>,
    players: Arc<RwLock<PlayerRegistry>>,
    tick_duration: Duration,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    /// Binds the server socket
    ///
    /// Fails if the address cannot be bound or `tick_duration` is zero.
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
    ) -> ServerResult<Self> {
        if tick_duration.is_zero() {
            return Err("tick duration must be non-zero".into());
        }

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            players: Arc::new(RwLock::new(PlayerRegistry::new(max_clients))),
            tick_duration,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle that stops `run` when sent `ServerMessage::Shutdown`
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        }));
    }

    /// Spawns task that monitors player timeouts
    async fn spawn_timeout_checker(&mut self) {
        let players = Arc::clone(&self.players);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut players_guard = players.write().await;
                    players_guard.check_timeouts()
                };

                for client in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        player_id: client.id,
                        player: client.player,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        }));
    }

    /// Spawns task that sends room snapshots once per tick
    async fn spawn_state_broadcaster(&mut self) {
        let players = Arc::clone(&self.players);
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.tasks.push(tokio::spawn(async move {
            let mut tick: u32 = 0;

            loop {
                tick_interval.tick().await;
                tick = tick.wrapping_add(1);

                let queued = broadcast_room_states(&players, tick).await;

                if tick % 60 == 0 && queued > 0 {
                    debug!("Tick {}: queued {} room states", tick, queued);
                }
            }
        }));
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Looks up the player behind `addr` and marks them as alive
    async fn active_player(&self, addr: SocketAddr) -> Option<Arc<PlayerState<Connection>>> {
        let mut players = self.players.write().await;
        let player_id = players.find_player_by_addr(addr)?;
        players.touch(player_id);
        players.get(player_id)
    }

    /// Decodes client intents and routes them to the registry or a player
    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join {
                client_version,
                room_id,
            } => {
                info!(
                    "Client joining room {:?} from {} (version: {})",
                    room_id, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!("Rejecting {}: unsupported version {}", addr, client_version);
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                let player_id = {
                    let mut players = self.players.write().await;

                    // A re-join gets a fresh player rather than a room change
                    if let Some(existing_id) = players.find_player_by_addr(addr) {
                        info!("Replacing player {} from {}", existing_id, addr);
                        players.remove_player(&existing_id);
                    }

                    let connection = Connection::new(addr, self.game_tx.clone());
                    players.add_player(addr, &room_id, connection)
                };

                let response = match player_id {
                    Some(player_id) => Packet::Joined { player_id, room_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(response, addr);
            }

            Packet::Move { direction } => match self.active_player(addr).await {
                Some(player) => apply_move(&player, direction),
                None => warn!("Move from unknown client at {}", addr),
            },

            Packet::Heartbeat => {
                if self.active_player(addr).await.is_none() {
                    warn!("Heartbeat from unknown client at {}", addr);
                }
            }

            Packet::Leave => {
                let mut players = self.players.write().await;
                if let Some(player_id) = players.find_player_by_addr(addr) {
                    players.remove_player(&player_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop
    ///
    /// Runs until a `ServerMessage::Shutdown` arrives through [`Server::control`].
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;
        self.spawn_state_broadcaster().await;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { player_id, player } => {
                    notify_timeout(player_id, &player);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }
}
