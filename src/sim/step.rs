/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Input (jump / dash / attack requests, movement axis)
///   2. Player updates (physics → state machine → dash → friction)
///   3. Weapon pickups
///   4. Weapons (aim, fire, swing) and dash contact
///   5. Projectiles (move, terrain, lifetime, player hits)
///   6. Death effects
///   7. Battle manager (unlocks, level transitions)
///   8. Respawn pass for anyone still dead
///   9. Ambient leaf emitters
///
/// Both players finish each phase before the next begins, so the battle
/// manager always sees the whole tick's outcome. Nothing in here reads a
/// clock: identical inputs give identical worlds.

use tracing::{debug, info, trace};

use crate::domain::effect::EffectKind;
use crate::domain::entity::{PlayerInput, PlayerSlot};
use crate::domain::geom::Vec2;
use crate::domain::player::{AttackRequest, HitResult, HitSource};
use crate::domain::weapon::{self, ProjectileFate, WeaponAction, WeaponMode};
use super::battle;
use super::event::GameEvent;
use super::world::{pair_mut, World};

/// A leaf tree drops one leaf about every this many ticks.
const LEAF_PERIOD: u64 = 167;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut World, inputs: [PlayerInput; 2]) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    resolve_input(world, &inputs, &mut events);
    resolve_movement(world);
    resolve_pickups(world, &mut events);
    resolve_weapons(world, &mut events);
    resolve_projectiles(world, &mut events);
    resolve_deaths(world, &mut events);
    battle::update(world, &mut events);
    resolve_respawns(world, &mut events);
    emit_leaves(world);

    events
}

// ══════════════════════════════════════════════════════════════
// Input and movement
// ══════════════════════════════════════════════════════════════

fn resolve_input(world: &mut World, inputs: &[PlayerInput; 2], events: &mut Vec<GameEvent>) {
    for slot in PlayerSlot::BOTH {
        let outcome = world.players[slot.index()].apply_input(&inputs[slot.index()]);
        if let Some(kind) = outcome.jumped {
            events.push(GameEvent::Jumped { slot, kind });
        }
        if outcome.dashed {
            events.push(GameEvent::Dashed { slot });
        }
        if outcome.attack == Some(AttackRequest::CoolingDown) {
            trace!(player = slot.number(), "attack dropped during cooldown");
        }
    }
}

fn resolve_movement(world: &mut World) {
    for player in world.players.iter_mut() {
        player.update(&world.grid, &world.tuning, &mut world.effects);
    }
}

// ══════════════════════════════════════════════════════════════
// Weapons
// ══════════════════════════════════════════════════════════════

/// First live player touching a gun pickup takes it; every pickup tile
/// in the level then disappears.
fn resolve_pickups(world: &mut World, events: &mut Vec<GameEvent>) {
    let zones = world.grid.weapon_spawn_zones();
    if zones.is_empty() {
        return;
    }

    for player in world.players.iter_mut() {
        if !player.alive {
            continue;
        }
        let rect = player.body.rect();
        if !zones.iter().any(|z| z.overlaps(&rect)) {
            continue;
        }
        let at = player.center();
        player.weapon.equip(WeaponMode::Gun, at, &mut world.effects);
        let removed = world.grid.despawn_weapon_spawns();
        info!(player = player.slot.number(), removed, "gun picked up");
        events.push(GameEvent::WeaponPicked { slot: player.slot });
        break;
    }
}

fn resolve_weapons(world: &mut World, events: &mut Vec<GameEvent>) {
    let combat = &world.tuning.combat;

    for slot in PlayerSlot::BOTH {
        let (me, opponent) = pair_mut(&mut world.players, slot);
        let attack = std::mem::take(&mut me.attack_pending);
        let holder = me.holder();

        match me.weapon.update(&holder, attack, &mut world.projectiles, combat, &mut world.effects) {
            WeaponAction::Idle => {}
            WeaponAction::Fired => events.push(GameEvent::ShotFired { slot }),
            WeaponAction::FiredAndReverted => {
                events.push(GameEvent::ShotFired { slot });
                events.push(GameEvent::WeaponReverted { slot });
                debug!(player = slot.number(), "out of shots, back to sword");
            }
            WeaponAction::Jammed => {
                debug!(player = slot.number(), "projectile cap reached, shot refused");
                events.push(GameEvent::GunJammed { slot });
            }
            WeaponAction::Swing(hitbox) => {
                events.push(GameEvent::Swung { slot });
                if let Some(result) = weapon::resolve_swing(hitbox, opponent, combat) {
                    events.push(hit_event(opponent.slot, HitSource::Sword, result));
                }
            }
        }

        if let Some(result) = weapon::resolve_dash_contact(me, opponent, combat) {
            events.push(hit_event(opponent.slot, HitSource::DashContact, result));
        }
    }
}

fn resolve_projectiles(world: &mut World, events: &mut Vec<GameEvent>) {
    if world.projectiles.is_empty() {
        return;
    }
    let fates = weapon::resolve_projectiles(
        &mut world.projectiles,
        &world.grid,
        &mut world.players,
        &world.tuning.combat,
        &mut world.effects,
    );
    for fate in fates {
        match fate {
            ProjectileFate::HitTerrain { at } => events.push(GameEvent::ProjectileImpact { at }),
            ProjectileFate::Expired => {}
            ProjectileFate::HitPlayer { target, result } => {
                events.push(hit_event(target, HitSource::Bullet, result));
            }
        }
    }
}

fn hit_event(target: PlayerSlot, source: HitSource, result: HitResult) -> GameEvent {
    trace!(player = target.number(), ?source, ?result, "hit");
    GameEvent::Hit { target, source, blocked: result == HitResult::Blocked }
}

// ══════════════════════════════════════════════════════════════
// Death and respawn
// ══════════════════════════════════════════════════════════════

fn resolve_deaths(world: &mut World, events: &mut Vec<GameEvent>) {
    for player in world.players.iter() {
        if player.alive {
            continue;
        }
        let Some(cause) = player.death_cause else {
            debug_assert!(false, "dead player without a cause");
            continue;
        };
        world.effects.explosion(player.center());
        info!(player = player.slot.number(), ?cause, damage = player.damage, "player died");
        events.push(GameEvent::PlayerKilled { slot: player.slot, cause });
    }
}

/// Anyone the battle manager did not already reset goes back to spawn
/// before the tick ends.
fn resolve_respawns(world: &mut World, events: &mut Vec<GameEvent>) {
    for player in world.players.iter_mut() {
        if player.alive {
            continue;
        }
        player.reset(&world.tuning);
        events.push(GameEvent::PlayerRespawned { slot: player.slot });
    }
}

// ══════════════════════════════════════════════════════════════
// Ambient
// ══════════════════════════════════════════════════════════════

/// Each leaf tree drops a leaf on its own phase of a fixed period, at a
/// point that walks across its emitter rect.
fn emit_leaves(world: &mut World) {
    let tick = world.tick;
    for (i, rect) in world.leaf_emitters.iter().enumerate() {
        let phase = (i as u64).wrapping_mul(37);
        if (tick + phase) % LEAF_PERIOD != 0 {
            continue;
        }
        let fx = ((tick / LEAF_PERIOD + i as u64) * 7 % rect.w.max(1.0) as u64) as f32;
        let fy = ((tick / LEAF_PERIOD) * 5 % rect.h.max(1.0) as u64) as f32;
        let at = Vec2::new(rect.x + fx, rect.y + fy);
        world.effects.trail(EffectKind::Leaf, at, Vec2::new(-0.1, 0.3));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::effect::EffectRequest;
    use crate::domain::player::DeathCause;
    use crate::sim::world::world_from_rows;

    /// Flat floor at row 4 (y = 64), walls at both ends.
    const FLAT: &[&str] = &[
        "#..............................#",
        "#..............................#",
        "#..............................#",
        "#.1..........................2.#",
        "################################",
    ];

    const IDLE: [PlayerInput; 2] = [
        PlayerInput { move_axis: 0, jump: false, dash: false, attack: false },
        PlayerInput { move_axis: 0, jump: false, dash: false, attack: false },
    ];

    fn p1(input: PlayerInput) -> [PlayerInput; 2] {
        [input, PlayerInput::default()]
    }

    fn run_idle(world: &mut World, ticks: u32) -> Vec<GameEvent> {
        (0..ticks).flat_map(|_| step(world, IDLE)).collect()
    }

    /// Standing y for a 15px body on the floor at row 4.
    const FLOOR_Y: f32 = 64.0 - 15.0;

    #[test]
    fn players_settle_on_the_floor() {
        let mut world = world_from_rows(&[FLAT], 0);
        run_idle(&mut world, 20);
        for p in &world.players {
            assert!(p.alive);
            assert!((p.body.pos.y - FLOOR_Y).abs() < 0.2);
        }
    }

    #[test]
    fn gun_budget_end_to_end() {
        let mut world = world_from_rows(&[FLAT], 0);
        world.players[0].weapon.equip(WeaponMode::Gun, Vec2::ZERO, &mut world.effects);
        run_idle(&mut world, 5);

        let attack = PlayerInput { attack: true, ..Default::default() };
        let mut shots = 0;
        let mut swings = 0;
        for _ in 0..6 {
            for e in step(&mut world, p1(attack)) {
                match e {
                    GameEvent::ShotFired { slot: PlayerSlot::One } => shots += 1,
                    GameEvent::Swung { slot: PlayerSlot::One } => swings += 1,
                    _ => {}
                }
            }
            // Past the attack cooldown
            run_idle(&mut world, 12);
        }
        assert_eq!(shots, 5);
        assert_eq!(swings, 1);
        assert_eq!(world.players[0].weapon.mode(), WeaponMode::Sword);
    }

    #[test]
    fn held_attack_fires_once_per_cooldown() {
        let mut world = world_from_rows(&[FLAT], 0);
        world.players[0].weapon.equip(WeaponMode::Gun, Vec2::ZERO, &mut world.effects);
        let attack = PlayerInput { attack: true, ..Default::default() };
        let shots = (0..25)
            .flat_map(|_| step(&mut world, p1(attack)))
            .filter(|e| matches!(e, GameEvent::ShotFired { .. }))
            .count();
        // Ticks 1, 11 and 21
        assert_eq!(shots, 3);
    }

    #[test]
    fn projectile_expires_after_lifetime() {
        // Open to the right so the bullet never meets terrain
        let rows: &[&str] = &[
            "..........",
            "2.1.......",
            "###.......",
        ];
        let mut world = world_from_rows(&[rows], 0);
        // Keep P1 standing: floor under it only spans three tiles
        world.players[0].body.pos = Vec2::new(32.0, 17.0);
        world.players[0].set_spawn(Vec2::new(32.0, 17.0));
        world.players[0].weapon.equip(WeaponMode::Gun, Vec2::ZERO, &mut world.effects);

        let attack = PlayerInput { attack: true, ..Default::default() };
        step(&mut world, p1(attack));
        assert_eq!(world.projectiles.len(), 1);

        run_idle(&mut world, 358);
        assert_eq!(world.projectiles.len(), 1);
        assert_eq!(world.projectiles.iter().next().map(|p| p.age_ticks), Some(359));

        run_idle(&mut world, 1);
        assert_eq!(world.projectiles.len(), 1);
        run_idle(&mut world, 1);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn projectile_hitting_wall_sparks_once() {
        let mut world = world_from_rows(&[FLAT], 0);
        // P2 behind the shooter, out of the line of fire
        world.players[1].body.pos = Vec2::new(16.0, FLOOR_Y);
        world.players[0].weapon.equip(WeaponMode::Gun, Vec2::ZERO, &mut world.effects);
        step(&mut world, p1(PlayerInput { attack: true, ..Default::default() }));
        world.effects.clear();

        let events = run_idle(&mut world, 120);
        let impacts = events.iter().filter(|e| matches!(e, GameEvent::ProjectileImpact { .. })).count();
        assert_eq!(impacts, 1);
        assert!(world.projectiles.is_empty());
        let sparks = world
            .effects
            .as_slice()
            .iter()
            .filter(|r| matches!(r, EffectRequest::DirectedSpark { .. }))
            .count();
        assert_eq!(sparks, 4);
    }

    #[test]
    fn dash_through_opponent_hits_once() {
        let mut world = world_from_rows(&[FLAT], 0);
        world.players[0].body.pos = Vec2::new(32.0, FLOOR_Y);
        world.players[1].body.pos = Vec2::new(82.0, FLOOR_Y);

        let dash = PlayerInput { dash: true, ..Default::default() };
        let mut events = step(&mut world, p1(dash));
        events.extend(run_idle(&mut world, 70));

        let melee = world.tuning.combat.melee_damage;
        assert_eq!(world.players[1].damage, melee);
        assert_eq!(world.players[0].damage, 0.0);
        let hits: Vec<_> = events.iter().filter(|e| matches!(e, GameEvent::Hit { .. })).collect();
        assert_eq!(
            hits,
            vec![&GameEvent::Hit { target: PlayerSlot::Two, source: HitSource::DashContact, blocked: false }]
        );
        assert!(world.players[0].body.pos.x > 90.0, "dash carries P1 past P2");
    }

    #[test]
    fn sword_hits_adjacent_opponent() {
        let mut world = world_from_rows(&[FLAT], 0);
        world.players[0].body.pos = Vec2::new(32.0, FLOOR_Y);
        world.players[1].body.pos = Vec2::new(44.0, FLOOR_Y);
        let events = step(&mut world, p1(PlayerInput { attack: true, ..Default::default() }));
        assert!(events.contains(&GameEvent::Hit { target: PlayerSlot::Two, source: HitSource::Sword, blocked: false }));
        assert_eq!(world.players[1].damage, world.tuning.combat.melee_damage);
    }

    #[test]
    fn dead_player_respawns_same_tick_and_unlocks_opponent() {
        let mut world = world_from_rows(&[FLAT], 0);
        let spawn = world.players[1].respawn_pos;
        // P2 about to exceed the fall limit
        world.players[1].body.pos = Vec2::new(200.0, 0.0);
        world.players[1].airborne_ticks = world.tuning.player.fall_death_ticks;

        let events = step(&mut world, IDLE);
        assert!(events.contains(&GameEvent::PlayerKilled { slot: PlayerSlot::Two, cause: DeathCause::Fell }));
        assert!(events.contains(&GameEvent::Unlocked { slot: PlayerSlot::One }));
        assert!(events.contains(&GameEvent::PlayerRespawned { slot: PlayerSlot::Two }));
        assert!(world.players[1].alive);
        assert_eq!(world.players[1].body.pos, spawn);
        assert_eq!(world.battle.unlock, [true, false]);
        assert!(world.effects.as_slice().iter().any(|r| matches!(
            r,
            EffectRequest::Burst { kind: EffectKind::Spark, count: 30, .. }
        )));
    }

    #[test]
    fn gun_pickup_equips_and_despawns() {
        let rows: &[&str] = &[
            "..........",
            ".1G....2..",
            "##########",
        ];
        let mut world = world_from_rows(&[rows], 0);
        let right = PlayerInput { move_axis: 1, ..Default::default() };
        let mut events = vec![];
        for _ in 0..20 {
            events.extend(step(&mut world, p1(right)));
        }
        assert_eq!(world.players[0].weapon.mode(), WeaponMode::Gun);
        assert!(world.grid.weapon_spawn_zones().is_empty());
        let picks = events.iter().filter(|e| matches!(e, GameEvent::WeaponPicked { .. })).count();
        assert_eq!(picks, 1);
    }

    #[test]
    fn kill_then_cross_advances_level() {
        let next: &[&str] = &[
            "#..............................#",
            "#.2..........................1.#",
            "################################",
        ];
        let mut world = world_from_rows(&[FLAT, next], 0);
        world.players[1].kill(DeathCause::Fell);
        step(&mut world, IDLE);
        assert_eq!(world.battle.unlock, [true, false]);

        // No transition zone yet
        let events = run_idle(&mut world, 5);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::LevelChanged { .. })));

        // Zone favouring P1, right where P1 stands
        world.grid.insert(crate::domain::tile::Tile {
            kind: crate::domain::tile::TileKind::Transition,
            variant: 0,
            grid_pos: (2, 3),
        });
        let events = step(&mut world, IDLE);
        assert!(events.contains(&GameEvent::LevelChanged { from: 0, to: 1 }));
        assert_eq!(world.battle.current_level, 1);
        assert_eq!(world.players[0].body.pos, Vec2::new(464.0, 16.0));
    }

    #[test]
    fn leaves_fall_on_schedule() {
        let set = crate::sim::level::builtin_levels().expect("built-ins");
        let mut world = World::new(set, Default::default(), Some(0));
        let emitters = world.leaf_emitters.len() as u64;
        assert!(emitters > 0);
        run_idle(&mut world, LEAF_PERIOD as u32);
        let leaves = world
            .effects
            .as_slice()
            .iter()
            .filter(|r| matches!(r, EffectRequest::Trail { kind: EffectKind::Leaf, .. }))
            .count() as u64;
        assert_eq!(leaves, emitters);
    }

    #[test]
    fn identical_inputs_replay_identically() {
        fn script(tick: u32) -> [PlayerInput; 2] {
            let a = PlayerInput {
                move_axis: if (tick / 40) % 2 == 0 { 1 } else { -1 },
                jump: tick % 23 == 0,
                dash: tick % 97 == 5,
                attack: tick % 7 == 0,
            };
            let b = PlayerInput {
                move_axis: if (tick / 55) % 3 == 0 { -1 } else { 0 },
                jump: tick % 31 == 3,
                dash: tick % 61 == 10,
                attack: tick % 5 == 1,
            };
            [a, b]
        }

        fn run() -> (String, Vec<GameEvent>, Vec<EffectRequest>) {
            let set = crate::sim::level::builtin_levels().expect("built-ins");
            let mut world = World::new(set, Default::default(), None);
            let mut events = vec![];
            for t in 0..600 {
                events.extend(step(&mut world, script(t)));
            }
            let state = format!(
                "{:?} {:?} {:?} {}",
                world.players,
                world.projectiles,
                world.battle,
                world.tick
            );
            (state, events, world.effects.drain().collect())
        }

        let (state_a, events_a, fx_a) = run();
        let (state_b, events_b, fx_b) = run();
        assert_eq!(state_a, state_b);
        assert_eq!(events_a, events_b);
        assert_eq!(fx_a, fx_b);
        assert!(!events_a.is_empty());
    }
}
