//! Scripted client that joins a room and wanders around with random moves

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use rand::seq::SliceRandom;
use shared::{Direction, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room to join
    #[arg(short = 'r', long, default_value = "lobby")]
    room: String,

    /// Number of moves to send before leaving
    #[arg(short = 'n', long, default_value = "20")]
    moves: u32,

    /// Delay between moves in milliseconds
    #[arg(short = 'd', long, default_value = "250")]
    delay: u64,
}

type BotResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

async fn send(socket: &UdpSocket, packet: &Packet, server_addr: SocketAddr) -> BotResult<()> {
    let data = serialize(packet)?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> BotResult<()> {
    env_logger::init();

    let args = Args::parse();
    let server_addr = args.server.parse::<SocketAddr>()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bot socket bound to {}", socket.local_addr()?);

    let join = Packet::Join {
        client_version: PROTOCOL_VERSION,
        room_id: args.room.clone(),
    };
    info!("Joining room {:?} on {}", args.room, server_addr);
    send(&socket, &join, server_addr).await?;

    let mut buf = [0u8; 2048];

    let player_id = loop {
        let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf)).await??;
        match deserialize::<Packet>(&buf[0..len]) {
            Ok(Packet::Joined { player_id, room_id }) => {
                info!("Joined room {:?} as player {}", room_id, player_id);
                break player_id;
            }
            Ok(Packet::Disconnected { reason }) => {
                warn!("Server refused join: {}", reason);
                return Ok(());
            }
            Ok(other) => info!("Ignoring packet while joining: {:?}", other),
            Err(e) => warn!("Failed to deserialize response: {}", e),
        }
    };

    let mut move_timer = interval(Duration::from_millis(args.delay.max(1)));
    let mut sent = 0;

    while sent < args.moves {
        tokio::select! {
            _ = move_timer.tick() => {
                let direction = *Direction::ALL
                    .choose(&mut rand::thread_rng())
                    .unwrap_or(&Direction::Up);
                send(&socket, &Packet::Move { direction }, server_addr).await?;
                sent += 1;
            }

            result = socket.recv_from(&mut buf) => {
                let (len, _) = result?;
                match deserialize::<Packet>(&buf[0..len]) {
                    Ok(Packet::RoomState { tick, room_id, players }) => {
                        if let Some(me) = players.iter().find(|p| p.id == player_id) {
                            info!(
                                "Tick {} in {:?}: at ({}, {}), {} players in room",
                                tick, room_id, me.position.x, me.position.y, players.len()
                            );
                        }
                    }
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected by server: {}", reason);
                        return Ok(());
                    }
                    Ok(other) => info!("Unexpected packet: {:?}", other),
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Leave, server_addr).await?;
    info!("Bot finished after {} moves", sent);

    Ok(())
}
