/// Weapon: one per player, in exactly one mode at a time.
///
/// ## Per-tick contract (`update`)
///
/// Runs after the holder's body has moved. Recomputes the aim (sword
/// hitbox or gun muzzle) from the holder's rect and facing, then consumes
/// the holder's attack request:
///
///   Gun   → spawn a projectile into the shared list, count the shot,
///           revert to Sword once the budget is spent
///   Sword → hand back a hitbox to test against the opponent this tick
///
/// A swing that overlaps nobody is simply wasted.
///
/// ## Hit resolution
///
/// `resolve_projectiles` runs once per tick over the whole shared list,
/// so a projectile can hit at most one player once. Melee and dash
/// contact resolve once per attacking player.

use serde::Deserialize;

use super::effect::{EffectKind, EffectQueue};
use super::entity::{PlayerSlot, Projectile};
use super::geom::{Rect, Vec2};
use super::grid::TileGrid;
use super::player::{HitResult, HitSource, Player};
use crate::config::CombatTuning;

/// Horizontal distance from the holder's centre to the muzzle.
const MUZZLE_OFFSET: f32 = 7.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponMode {
    Sword,
    Gun,
}

/// Where the weapon reaches this tick.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Aim {
    Hitbox(Rect),
    Muzzle(Vec2),
}

/// What the holder looks like to the weapon this tick.
#[derive(Clone, Copy, Debug)]
pub struct Holder {
    pub slot: PlayerSlot,
    pub rect: Rect,
    pub flip: bool,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum WeaponAction {
    /// No attack this tick.
    Idle,
    Fired,
    /// Last shot of the budget; the weapon is a sword again.
    FiredAndReverted,
    /// Projectile list full; the shot was refused.
    Jammed,
    Swing(Rect),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpawnOutcome {
    Spawned,
    Refused,
}

// ══════════════════════════════════════════════════════════════
// Shared projectile list (bounded)
// ══════════════════════════════════════════════════════════════

/// Bounded list of live projectiles. A full list refuses new spawns;
/// it never evicts old ones.
#[derive(Clone, Debug)]
pub struct ProjectileList {
    items: Vec<Projectile>,
    cap: usize,
}

impl ProjectileList {
    pub fn new(cap: usize) -> Self {
        ProjectileList { items: Vec::with_capacity(cap), cap }
    }

    pub fn try_spawn(&mut self, projectile: Projectile) -> SpawnOutcome {
        if self.items.len() >= self.cap {
            return SpawnOutcome::Refused;
        }
        self.items.push(projectile);
        SpawnOutcome::Spawned
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.items.iter()
    }

    pub fn retain_mut(&mut self, f: impl FnMut(&mut Projectile) -> bool) {
        self.items.retain_mut(f);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ══════════════════════════════════════════════════════════════
// Weapon
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Weapon {
    mode: WeaponMode,
    pub enabled: bool,
    aim: Aim,
    shots_fired: u32,
}

impl Weapon {
    pub fn new(mode: WeaponMode) -> Self {
        let aim = match mode {
            WeaponMode::Sword => Aim::Hitbox(Rect::default()),
            WeaponMode::Gun => Aim::Muzzle(Vec2::ZERO),
        };
        Weapon { mode, enabled: true, aim, shots_fired: 0 }
    }

    pub fn mode(&self) -> WeaponMode {
        self.mode
    }

    pub fn aim(&self) -> Aim {
        self.aim
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    /// Switch mode and restart the shot budget.
    pub fn equip(&mut self, mode: WeaponMode, at: Vec2, effects: &mut EffectQueue) {
        *self = Weapon { enabled: self.enabled, ..Weapon::new(mode) };
        effects.burst(EffectKind::Pickup, at, 12, (0.5, 1.5));
    }

    pub fn update(
        &mut self,
        holder: &Holder,
        attack: bool,
        projectiles: &mut ProjectileList,
        combat: &CombatTuning,
        effects: &mut EffectQueue,
    ) -> WeaponAction {
        if !self.enabled {
            return WeaponAction::Idle;
        }
        self.aim = aim_for(self.mode, holder, combat);
        if !attack {
            return WeaponAction::Idle;
        }

        match (self.mode, self.aim) {
            (WeaponMode::Gun, Aim::Muzzle(muzzle)) => {
                let speed = if holder.flip { -combat.projectile_speed } else { combat.projectile_speed };
                let shot = Projectile::new(muzzle, speed, holder.slot);
                if projectiles.try_spawn(shot) == SpawnOutcome::Refused {
                    return WeaponAction::Jammed;
                }
                effects.horizontal_sparks(muzzle, holder.flip);
                self.shots_fired += 1;
                if self.shots_fired >= combat.shot_budget {
                    self.mode = WeaponMode::Sword;
                    self.shots_fired = 0;
                    self.aim = aim_for(self.mode, holder, combat);
                    return WeaponAction::FiredAndReverted;
                }
                WeaponAction::Fired
            }
            (WeaponMode::Sword, Aim::Hitbox(hitbox)) => WeaponAction::Swing(hitbox),
            (mode, aim) => {
                debug_assert!(false, "weapon aim {aim:?} does not match mode {mode:?}");
                WeaponAction::Idle
            }
        }
    }
}

/// Sword: the front half of the holder plus `sword_reach`.
/// Gun: a point `MUZZLE_OFFSET` ahead of the holder's centre.
fn aim_for(mode: WeaponMode, holder: &Holder, combat: &CombatTuning) -> Aim {
    let c = holder.rect.center();
    match mode {
        WeaponMode::Sword => {
            let w = holder.rect.w / 2.0 + combat.sword_reach;
            let x = if holder.flip { c.x - w } else { c.x };
            Aim::Hitbox(Rect::new(x, holder.rect.y, w, holder.rect.h))
        }
        WeaponMode::Gun => {
            let dx = if holder.flip { -MUZZLE_OFFSET } else { MUZZLE_OFFSET };
            Aim::Muzzle(Vec2::new(c.x + dx, c.y))
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Hit resolution
// ══════════════════════════════════════════════════════════════

/// What happened to one projectile this tick.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ProjectileFate {
    HitTerrain { at: Vec2 },
    Expired,
    HitPlayer { target: PlayerSlot, result: HitResult },
}

/// Advance every projectile once, then test it against terrain, lifetime
/// and the player it was not fired by. Removals happen through
/// `retain_mut`, never while indexing into the list.
pub fn resolve_projectiles(
    projectiles: &mut ProjectileList,
    grid: &TileGrid,
    players: &mut [Player; 2],
    combat: &CombatTuning,
    effects: &mut EffectQueue,
) -> Vec<ProjectileFate> {
    let mut fates = vec![];
    projectiles.retain_mut(|p| {
        let expired = p.advance(combat.projectile_lifetime);

        if grid.solid_tile_at(p.pos).is_some() {
            // Sparks fly back the way the bullet came
            effects.horizontal_sparks(p.pos, p.speed > 0.0);
            fates.push(ProjectileFate::HitTerrain { at: p.pos });
            return false;
        }
        if expired {
            fates.push(ProjectileFate::Expired);
            return false;
        }

        let target = &mut players[p.owner.other().index()];
        if target.alive && !target.is_invulnerable() && target.body.rect().contains(p.pos) {
            let result = target.take_hit(HitSource::Bullet, combat);
            fates.push(ProjectileFate::HitPlayer { target: target.slot, result });
            return false;
        }
        true
    });
    fates
}

/// Test a sword hitbox against the opponent.
pub fn resolve_swing(hitbox: Rect, target: &mut Player, combat: &CombatTuning) -> Option<HitResult> {
    if !target.alive || !hitbox.overlaps(&target.body.rect()) {
        return None;
    }
    Some(target.take_hit(HitSource::Sword, combat))
}

/// A dash in its burst phase that runs into the opponent counts as one
/// melee hit for the whole dash.
pub fn resolve_dash_contact(dasher: &mut Player, target: &mut Player, combat: &CombatTuning) -> Option<HitResult> {
    if !dasher.alive || !target.alive || !dasher.is_invulnerable() || dasher.dash_contact_landed {
        return None;
    }
    if !dasher.body.rect().overlaps(&target.body.rect()) {
        return None;
    }
    dasher.dash_contact_landed = true;
    Some(target.take_hit(HitSource::DashContact, combat))
}
