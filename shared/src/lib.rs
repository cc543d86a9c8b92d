use serde::{Deserialize, Serialize};

/// Distance covered by a single movement command, in world units.
pub const MOVE_STEP: i32 = 3;
pub const PROTOCOL_VERSION: u32 = 1;

/// A player's location. Plain value, always copied out of its owner.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by `(dx, dy)`, wrapping at the `i32` limits.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

/// One of the four movement intents a client can send.
///
/// Left moves towards positive x and right towards negative x. Clients
/// already render with this mirrored axis, so it must not be flipped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Per-axis change produced by one step in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, MOVE_STEP),
            Direction::Down => (0, -MOVE_STEP),
            Direction::Left => (MOVE_STEP, 0),
            Direction::Right => (-MOVE_STEP, 0),
        }
    }
}

/// A player's id and position as sent in room snapshots.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPosition {
    pub id: u32,
    pub position: Position,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Join {
        client_version: u32,
        room_id: String,
    },
    Move {
        direction: Direction,
    },
    Heartbeat,
    Leave,

    Joined {
        player_id: u32,
        room_id: String,
    },
    RoomState {
        tick: u32,
        room_id: String,
        players: Vec<PlayerPosition>,
    },
    Disconnected {
        reason: String,
    },
}
