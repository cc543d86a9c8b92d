//! Integration tests for the room server components
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use server::network::{Server, ServerMessage};
use server::player::PlayerState;
use shared::{Direction, Packet, Position, PROTOCOL_VERSION};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// CONCURRENCY TESTS
mod concurrency_tests {
    use super::*;

    /// Many threads moving the same player never lose an update
    #[test]
    fn concurrent_moves_accumulate() {
        for threads in [1usize, 2, 7, 16] {
            let player = Arc::new(PlayerState::new((), "room-1"));
            let barrier = Arc::new(Barrier::new(threads));

            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let player = Arc::clone(&player);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        player.move_up();
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(player.position(), Position::new(0, 3 * threads as i32));
        }
    }

    /// Readers racing movers only ever see fully applied states
    #[test]
    fn readers_never_observe_torn_positions() {
        let player = PlayerState::new((), "room-1");
        let done = AtomicBool::new(false);
        let rounds = 2_000;

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..rounds {
                    player.move_up();
                    player.move_left();
                }
                done.store(true, Ordering::Release);
            });

            scope.spawn(|| {
                let mut last = Position::ORIGIN;
                while !done.load(Ordering::Acquire) {
                    let seen = player.position();

                    // A single writer alternates up and left, so x trails y by
                    // at most one step and neither axis ever goes back.
                    assert_eq!(seen.x % 3, 0);
                    assert_eq!(seen.y % 3, 0);
                    assert!(seen.y - seen.x == 0 || seen.y - seen.x == 3, "torn read: {:?}", seen);
                    assert!(seen.x >= last.x && seen.y >= last.y);
                    last = seen;
                }
            });
        });

        assert_eq!(player.position(), Position::new(3 * rounds, 3 * rounds));
    }

    /// Opposite moves issued concurrently cancel out exactly
    #[test]
    fn concurrent_opposite_moves_cancel() {
        let player = PlayerState::new((), "room-1");

        thread::scope(|scope| {
            for direction in Direction::ALL {
                let player = &player;
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        server::network::apply_move(player, direction);
                    }
                });
            }
        });

        assert_eq!(player.position(), Position::ORIGIN);
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;

    fn send(socket: &UdpSocket, packet: &Packet, addr: std::net::SocketAddr) {
        let data = serialize(packet).unwrap();
        socket.send_to(&data, addr).unwrap();
    }

    fn recv(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; 2048];
        let (size, _) = socket.recv_from(&mut buf).unwrap();
        deserialize(&buf[..size]).unwrap()
    }

    /// Join a room over UDP, move, and see the move in a room snapshot
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn join_move_and_receive_room_state() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(10), 4)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let server_task = tokio::spawn(async move { server.run().await.is_ok() });

        let client = tokio::task::spawn_blocking(move || {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();

            let join = Packet::Join {
                client_version: PROTOCOL_VERSION,
                room_id: "room-1".to_string(),
            };
            send(&socket, &join, server_addr);

            let player_id = loop {
                match recv(&socket) {
                    Packet::Joined { player_id, room_id } => {
                        assert_eq!(room_id, "room-1");
                        break player_id;
                    }
                    Packet::RoomState { .. } => continue,
                    other => panic!("Unexpected packet: {:?}", other),
                }
            };

            for direction in [Direction::Up, Direction::Up, Direction::Right] {
                send(&socket, &Packet::Move { direction }, server_addr);
            }

            // Snapshots keep coming every tick; wait for one with all moves applied
            for _ in 0..200 {
                if let Packet::RoomState { room_id, players, .. } = recv(&socket) {
                    assert_eq!(room_id, "room-1");
                    let me = players.iter().find(|p| p.id == player_id).unwrap();
                    if me.position == Position::new(-3, 6) {
                        send(&socket, &Packet::Leave, server_addr);
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap();

        assert!(client, "never observed the moved position");

        control.send(ServerMessage::Shutdown).unwrap();
        assert!(server_task.await.unwrap());
    }

    /// Two rooms receive separate snapshots
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rooms_are_broadcast_separately() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(10), 4)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let server_task = tokio::spawn(async move { server.run().await.is_ok() });

        let rooms = tokio::task::spawn_blocking(move || {
            let mut seen = Vec::new();

            for room in ["red", "blue"] {
                let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
                socket
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .unwrap();

                let join = Packet::Join {
                    client_version: PROTOCOL_VERSION,
                    room_id: room.to_string(),
                };
                send(&socket, &join, server_addr);

                loop {
                    if let Packet::RoomState { room_id, players, .. } = recv(&socket) {
                        assert_eq!(players.len(), 1);
                        seen.push(room_id);
                        break;
                    }
                }
            }

            seen
        })
        .await
        .unwrap();

        assert_eq!(rooms, vec!["red".to_string(), "blue".to_string()]);

        control.send(ServerMessage::Shutdown).unwrap();
        assert!(server_task.await.unwrap());
    }
}
