/// World: the explicit context a tick runs against.
///
/// Owns everything that is shared between the two players: the grid, the
/// projectile list, the effect queue and the battle state. Domain code
/// never reaches it through a global; `step` passes the parts it needs.
///
/// ## Level switching
///
/// `load_level` replaces the grid wholesale with a clone of the level's
/// pristine grid, so weapon pickups despawned in one visit come back the
/// next time the level is entered.

use tracing::info;

use crate::config::Tuning;
use crate::domain::effect::EffectQueue;
use crate::domain::entity::PlayerSlot;
use crate::domain::geom::Rect;
use crate::domain::grid::TileGrid;
use crate::domain::player::Player;
use crate::domain::weapon::ProjectileList;
use super::battle::BattleState;
use super::level::LevelSet;

pub struct World {
    pub tuning: Tuning,
    pub levels: LevelSet,
    pub grid: TileGrid,
    pub players: [Player; 2],
    pub projectiles: ProjectileList,
    pub effects: EffectQueue,
    pub battle: BattleState,
    pub leaf_emitters: Vec<Rect>,
    pub tick: u64,
}

impl World {
    /// Start at `start_level`, clamped into the set. `None` picks the
    /// middle level so both players have somewhere to go.
    pub fn new(levels: LevelSet, tuning: Tuning, start_level: Option<usize>) -> Self {
        let last = levels.len() - 1;
        let start = start_level.unwrap_or(levels.len() / 2).min(last);
        let players = PlayerSlot::BOTH.map(|slot| Player::new(slot, Default::default(), &tuning));
        let mut world = World {
            projectiles: ProjectileList::new(tuning.combat.projectile_cap),
            tuning,
            levels,
            grid: TileGrid::new(16),
            players,
            effects: EffectQueue::new(),
            battle: BattleState::default(),
            leaf_emitters: vec![],
            tick: 0,
        };
        world.load_level(start);
        world
    }

    pub fn player(&self, slot: PlayerSlot) -> &Player {
        &self.players[slot.index()]
    }

    pub fn level_name(&self) -> &str {
        self.levels.get(self.battle.current_level).map_or("", |l| l.name.as_str())
    }

    /// Swap in level `idx`: fresh grid, both players reset at the new
    /// spawns, no projectiles, both unlocks cleared.
    pub fn load_level(&mut self, idx: usize) {
        let Some(level) = self.levels.get(idx) else {
            debug_assert!(false, "level {idx} out of range");
            return;
        };

        self.grid = level.grid.clone();
        self.leaf_emitters = level.leaf_emitters.clone();
        for (player, spawn) in self.players.iter_mut().zip(level.spawns) {
            player.set_spawn(spawn);
            player.reset(&self.tuning);
        }
        self.projectiles.clear();
        self.battle = BattleState { current_level: idx, unlock: [false; 2] };

        info!(level = idx, name = %level.name, "level loaded");
    }
}

/// Both players at once: `slot` first, its opponent second.
pub fn pair_mut(players: &mut [Player; 2], slot: PlayerSlot) -> (&mut Player, &mut Player) {
    let [one, two] = players;
    match slot {
        PlayerSlot::One => (one, two),
        PlayerSlot::Two => (two, one),
    }
}

#[cfg(test)]
pub fn world_from_rows(levels: &[&[&str]], start: usize) -> World {
    use super::level::{Level, LevelData};

    let levels = levels
        .iter()
        .enumerate()
        .map(|(i, rows)| Level::from_data(format!("test {i}"), &LevelData::from_rows(rows)).expect("valid rows"))
        .collect();
    let set = LevelSet::new(levels).expect("non-empty");
    World::new(set, Tuning::default(), Some(start))
}
