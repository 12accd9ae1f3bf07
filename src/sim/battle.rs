/// Battle manager: the level-progression state machine.
///
/// A player may only push the level index in their own direction after
/// the opponent has died ("unlock"). Each tick, after both players have
/// moved and fought:
///
///   1. Unlocks: a dead player loses their own unlock; a live player
///      whose opponent is dead gains one. Self-clear wins when both die.
///   2. Transitions: an unlocked, live player touching a transition zone
///      that favours their direction advances the level.
///
/// Advancing reloads the grid, resets both players and clears both
/// unlocks. Advancing past either end of the level set is refused and
/// changes nothing.

use tracing::{info, trace};

use crate::domain::effect::EffectRequest;
use crate::domain::entity::PlayerSlot;
use crate::domain::tile::Favors;
use super::event::GameEvent;
use super::world::World;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BattleState {
    pub current_level: usize,
    /// Indexed by player slot.
    pub unlock: [bool; 2],
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AdvanceOutcome {
    Advanced { from: usize, to: usize },
    /// Already at the first or last level.
    AtBoundary,
}

pub fn update(world: &mut World, events: &mut Vec<GameEvent>) {
    update_unlocks(world, events);
    check_transitions(world, events);
}

fn update_unlocks(world: &mut World, events: &mut Vec<GameEvent>) {
    let dead = [!world.players[0].alive, !world.players[1].alive];

    for slot in PlayerSlot::BOTH {
        let (me, other) = (slot.index(), slot.other().index());
        let was = world.battle.unlock[me];
        let now = if dead[me] {
            false
        } else if dead[other] {
            true
        } else {
            was
        };
        world.battle.unlock[me] = now;

        if now && !was {
            info!(player = slot.number(), "unlocked");
            events.push(GameEvent::Unlocked { slot });
        } else if was && !now {
            info!(player = slot.number(), "unlock lost on death");
        }
    }
}

fn check_transitions(world: &mut World, events: &mut Vec<GameEvent>) {
    let zones = world.grid.transition_zones();
    if zones.is_empty() {
        return;
    }

    for slot in PlayerSlot::BOTH {
        let player = world.player(slot);
        if !world.battle.unlock[slot.index()] || !player.alive {
            continue;
        }
        let rect = player.body.rect();
        let direction = slot.direction();
        let touching = zones.iter().any(|z| z.favors() == direction && z.rect.overlaps(&rect));
        if !touching {
            continue;
        }
        if let AdvanceOutcome::Advanced { from, to } = advance_level(world, direction) {
            events.push(GameEvent::LevelChanged { from, to });
            // Both players were just reset; nothing left to check
            break;
        }
    }
}

/// Move one level in `direction`. At either end of the set this is a
/// full no-op.
pub fn advance_level(world: &mut World, direction: Favors) -> AdvanceOutcome {
    let from = world.battle.current_level;
    let to = match direction {
        Favors::Forward => Some(from + 1),
        Favors::Backward => from.checked_sub(1),
    };
    let to = match to {
        Some(to) if to < world.levels.len() => to,
        _ => {
            trace!(level = from, ?direction, "advance refused at boundary");
            return AdvanceOutcome::AtBoundary;
        }
    };

    world.load_level(to);
    world.effects.push(EffectRequest::LevelTransition);
    info!(from, to, name = world.level_name(), "level advanced");
    AdvanceOutcome::Advanced { from, to }
}
