//! Server-side state of one connected player
//!
//! A [`PlayerState`] owns the player's position, the handle used to send
//! packets back to them, and the room they joined. Movement commands from
//! the dispatcher and snapshot reads from the broadcaster hit the same
//! instance from different tasks, so the position sits behind a lock that
//! belongs to this player alone.

use log::debug;
use shared::{Direction, Position};
use std::sync::{PoisonError, RwLock};

/// One connected participant and their movable state
///
/// The room id and connection are fixed at construction. Moving a player to
/// another room means building a new `PlayerState`, never mutating this one.
#[derive(Debug)]
pub struct PlayerState<C> {
    room_id: String,
    connection: C,
    position: RwLock<Position>,
}

impl<C> PlayerState<C> {
    /// Creates a player at the origin in the given room
    ///
    /// The room id is opaque and may be empty.
    pub fn new(connection: C, room_id: impl Into<String>) -> Self {
        let room_id = room_id.into();
        debug!("Created player state in room {:?}", room_id);

        Self {
            room_id,
            connection,
            position: RwLock::new(Position::ORIGIN),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Returns a copy of the current position
    pub fn position(&self) -> Position {
        *self
            .position
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// y += 3
    pub fn move_up(&self) {
        self.shift(Direction::Up);
    }

    /// y -= 3
    pub fn move_down(&self) {
        self.shift(Direction::Down);
    }

    /// x += 3
    pub fn move_left(&self) {
        self.shift(Direction::Left);
    }

    /// x -= 3
    pub fn move_right(&self) {
        self.shift(Direction::Right);
    }

    // A position is replaced as a whole value, so a guard poisoned by a
    // panicking holder still protects a consistent position.
    fn shift(&self, direction: Direction) {
        let (dx, dy) = direction.delta();
        let mut position = self
            .position
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *position = position.offset(dx, dy);
    }
}
