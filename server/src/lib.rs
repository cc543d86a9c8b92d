//! # Room Server Library
//!
//! This library provides the server side of a room-based multiplayer lobby.
//! Clients join a named room, send discrete movement commands, and receive
//! periodic snapshots of every position in their room.
//!
//! ## Core Responsibilities
//!
//! ### Player State
//! Each connected player is a [`player::PlayerState`]: a position, the
//! room it belongs to, and the outbound connection used to reach it. The
//! position is guarded by a lock owned by that player, so movement
//! commands and snapshot reads on the same player never tear, and players
//! never block each other.
//!
//! ### Player Registry
//! Players are keyed by a stable numeric ID in a
//! [`registry::PlayerRegistry`] shared behind an async read-write lock.
//! Joining, leaving and timeout cleanup only insert or remove entries;
//! a player's room never changes in place.
//!
//! ### Dispatch and Broadcast
//! The main loop decodes incoming packets and maps each `Move` onto one
//! of the four movement operations. A separate broadcaster task reads all
//! positions once per tick and sends each room its snapshot.
//!
//! ## Movement Rules
//!
//! Every command moves the player exactly 3 units along one axis:
//! up is +y, down is -y, left is +x and right is -x. There is no
//! clamping, collision or validation; commands accumulate in the order
//! they are applied.
//!
//! ## Module Organization
//!
//! - `player`: the per-player state and its locking discipline
//! - `registry`: ID assignment, address lookup, room grouping, timeouts
//! - `network`: UDP tasks, packet dispatch, room broadcasts
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // Bind with a 30Hz broadcast rate and room for 32 players
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(33),
//!         32,
//!     ).await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod player;
pub mod registry;
