/// Events emitted during a simulation step.
/// The presentation layer consumes these for its HUD and log lines.

use crate::domain::entity::PlayerSlot;
use crate::domain::geom::Vec2;
use crate::domain::player::{DeathCause, HitSource, JumpKind};

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Jumped { slot: PlayerSlot, kind: JumpKind },
    Dashed { slot: PlayerSlot },
    ShotFired { slot: PlayerSlot },
    /// Shot refused: the projectile list is full.
    GunJammed { slot: PlayerSlot },
    WeaponReverted { slot: PlayerSlot },
    WeaponPicked { slot: PlayerSlot },
    Swung { slot: PlayerSlot },
    Hit { target: PlayerSlot, source: HitSource, blocked: bool },
    ProjectileImpact { at: Vec2 },
    PlayerKilled { slot: PlayerSlot, cause: DeathCause },
    PlayerRespawned { slot: PlayerSlot },
    Unlocked { slot: PlayerSlot },
    LevelChanged { from: usize, to: usize },
}
