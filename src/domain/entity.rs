/// Small shared entity types: player slots, per-tick input, projectiles.

use super::geom::Vec2;
use super::tile::Favors;

/// One of the two player seats. Also names the direction that player
/// pushes the level index.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn other(self) -> PlayerSlot {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Player 1 pushes the level index up, player 2 down.
    pub fn direction(self) -> Favors {
        match self {
            PlayerSlot::One => Favors::Forward,
            PlayerSlot::Two => Favors::Backward,
        }
    }

    /// 1-based, for display.
    pub fn number(self) -> usize {
        self.index() + 1
    }
}

/// Frame input for one player, delivered once per tick before its update.
/// `move_axis` is continuous (held key); the three actions are requests
/// that may be refused by the state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PlayerInput {
    pub move_axis: i8, // -1, 0, 1
    pub jump: bool,
    pub dash: bool,
    pub attack: bool,
}

impl PlayerInput {
    pub fn movement(&self) -> Vec2 {
        Vec2::new(self.move_axis.signum() as f32, 0.0)
    }
}

/// A bullet in flight. Lives in the world's shared list, not in a player.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Projectile {
    pub pos: Vec2,
    /// Signed horizontal speed in px/tick.
    pub speed: f32,
    pub age_ticks: u32,
    pub owner: PlayerSlot,
}

impl Projectile {
    pub fn new(pos: Vec2, speed: f32, owner: PlayerSlot) -> Self {
        Projectile { pos, speed, age_ticks: 0, owner }
    }

    /// Move one tick. Returns true once the projectile has outlived `lifetime`.
    pub fn advance(&mut self, lifetime: u32) -> bool {
        self.pos.x += self.speed;
        self.age_ticks += 1;
        self.age_ticks > lifetime
    }
}
