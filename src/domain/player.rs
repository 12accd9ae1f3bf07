/// Player: an animated body plus the movement state machine, damage and
/// a weapon.
///
/// ## Per-tick order (`update`)
///
///   1. Body advances (physics, collision flags, facing)
///   2. State machine reads the fresh flags:
///        airborne counter, fall death, ground reset, wall slide, action
///   3. Dash timer decays toward 0; burst phase overrides vx
///   4. Ground friction on vx
///   5. Attack cooldown ticks down
///
/// Jump, dash and attack requests arrive before `update` and see the
/// previous tick's wall-slide flag and last movement.
///
/// ## Dash timer
///
/// Signed: the sign is the dash direction, the magnitude counts down
/// from `dash_ticks`. While |timer| > `dash_burst_threshold` the player
/// moves at burst speed and cannot be damaged. Below that the timer is
/// cooldown only; a new dash needs it back at 0.

use super::animation::AnimState;
use super::effect::{EffectKind, EffectQueue};
use super::entity::{PlayerInput, PlayerSlot};
use super::geom::Vec2;
use super::grid::TileGrid;
use super::physics::Body;
use super::weapon::{Holder, Weapon};
use crate::config::{CombatTuning, PlayerTuning, Tuning};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HitSource {
    Bullet,
    Sword,
    DashContact,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HitResult {
    /// Target was mid-burst and took nothing.
    Blocked,
    Damaged,
    /// This hit crossed the death threshold.
    Killed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    Hit(HitSource),
    Fell,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpKind {
    Ground,
    WallKick,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttackRequest {
    Accepted,
    /// Still cooling down; the request is dropped, not queued.
    CoolingDown,
}

/// Requests accepted by `apply_input` this tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct InputOutcome {
    pub jumped: Option<JumpKind>,
    pub dashed: bool,
    pub attack: Option<AttackRequest>,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub slot: PlayerSlot,
    pub body: Body,
    pub weapon: Weapon,
    pub damage: f32,
    pub airborne_ticks: u32,
    pub jump_charges: u8,
    pub wall_sliding: bool,
    pub dash_timer: i32,
    pub attack_cooldown: u32,
    /// Set by an accepted attack request, consumed by the weapon.
    pub attack_pending: bool,
    /// The current dash already hit the opponent.
    pub dash_contact_landed: bool,
    pub alive: bool,
    pub death_cause: Option<DeathCause>,
    /// Where `reset` puts the body. An owned copy, never tied to `body.pos`.
    pub respawn_pos: Vec2,
    /// Horizontal input held this tick.
    movement: Vec2,
    tuning: PlayerTuning,
}

impl Player {
    pub fn new(slot: PlayerSlot, spawn: Vec2, tuning: &Tuning) -> Self {
        let size = Vec2::new(tuning.player.size[0], tuning.player.size[1]);
        Player {
            slot,
            body: Body::new(spawn, size, tuning.animations),
            weapon: Weapon::new(tuning.player.starting_weapon),
            damage: 0.0,
            airborne_ticks: 0,
            jump_charges: 1,
            wall_sliding: false,
            dash_timer: 0,
            attack_cooldown: 0,
            attack_pending: false,
            dash_contact_landed: false,
            alive: true,
            death_cause: None,
            respawn_pos: spawn,
            movement: Vec2::ZERO,
            tuning: tuning.player.clone(),
        }
    }

    pub fn center(&self) -> Vec2 {
        self.body.rect().center()
    }

    pub fn holder(&self) -> Holder {
        Holder { slot: self.slot, rect: self.body.rect(), flip: self.body.flip }
    }

    /// Burst phase of a dash.
    pub fn is_invulnerable(&self) -> bool {
        self.dash_timer.abs() > self.tuning.dash_burst_threshold
    }

    pub fn is_dashing(&self) -> bool {
        self.dash_timer != 0
    }

    // ── Input ──

    /// Record movement and try each requested action. Dead players ignore
    /// input entirely.
    pub fn apply_input(&mut self, input: &PlayerInput) -> InputOutcome {
        let mut outcome = InputOutcome::default();
        if !self.alive {
            self.movement = Vec2::ZERO;
            return outcome;
        }
        self.movement = input.movement();
        if input.jump {
            outcome.jumped = self.jump();
        }
        if input.dash {
            outcome.dashed = self.dash();
        }
        if input.attack {
            outcome.attack = Some(self.request_attack());
        }
        outcome
    }

    /// Wall kick when sliding and pushing into the wall, else a ground
    /// jump if a charge remains.
    pub fn jump(&mut self) -> Option<JumpKind> {
        let pushing = self.body.last_movement.x;
        if self.wall_sliding && ((self.body.flip && pushing < 0.0) || (!self.body.flip && pushing > 0.0)) {
            let [kick_x, kick_y] = self.tuning.wall_kick;
            // Away from the wall the player faces
            self.body.velocity.x = if self.body.flip { kick_x } else { -kick_x };
            self.body.velocity.y = -kick_y;
            self.airborne_ticks = self.tuning.wall_slide_air_ticks + 1;
            self.jump_charges = self.jump_charges.saturating_sub(1);
            return Some(JumpKind::WallKick);
        }
        if self.jump_charges > 0 {
            self.body.velocity.y = -self.tuning.jump_velocity;
            self.jump_charges -= 1;
            self.airborne_ticks = self.tuning.wall_slide_air_ticks + 1;
            return Some(JumpKind::Ground);
        }
        None
    }

    /// Start a dash in the facing direction. Refused while the previous
    /// dash is still counting down.
    pub fn dash(&mut self) -> bool {
        if self.dash_timer != 0 {
            return false;
        }
        let ticks = self.tuning.dash_ticks;
        self.dash_timer = if self.body.flip { -ticks } else { ticks };
        self.dash_contact_landed = false;
        true
    }

    pub fn request_attack(&mut self) -> AttackRequest {
        if self.attack_cooldown > 0 {
            return AttackRequest::CoolingDown;
        }
        self.attack_pending = true;
        self.attack_cooldown = self.tuning.attack_cooldown;
        AttackRequest::Accepted
    }

    // ── Tick ──

    pub fn update(&mut self, grid: &TileGrid, tuning: &Tuning, effects: &mut EffectQueue) {
        if !self.alive {
            return;
        }
        self.body.advance(self.movement, grid, &tuning.physics);
        self.update_state();
        self.update_dash(effects);
        self.apply_friction(tuning.physics.friction);
        self.attack_cooldown = self.attack_cooldown.saturating_sub(1);
    }

    fn update_state(&mut self) {
        let c = self.body.collisions;
        self.airborne_ticks += 1;

        // Wedged between two walls counts as held, not falling
        if self.airborne_ticks > self.tuning.fall_death_ticks && !c.pinned {
            self.kill(DeathCause::Fell);
        }

        if c.down {
            self.airborne_ticks = 0;
            self.jump_charges = 1;
        }

        self.wall_sliding = false;
        if c.any_wall() && self.airborne_ticks > self.tuning.wall_slide_air_ticks {
            self.wall_sliding = true;
            self.body.velocity.y = self.body.velocity.y.min(self.tuning.wall_slide_max_fall);
            self.body.flip = !c.right;
            self.body.set_action(AnimState::WallSlide);
        }

        if !self.wall_sliding {
            let state = if self.airborne_ticks > self.tuning.wall_slide_air_ticks {
                AnimState::Jump
            } else if self.movement.x != 0.0 {
                AnimState::Run
            } else {
                AnimState::Idle
            };
            self.body.set_action(state);
        }
    }

    fn update_dash(&mut self, effects: &mut EffectQueue) {
        let burst = self.tuning.dash_burst_threshold;
        let mag = self.dash_timer.abs();
        if mag == self.tuning.dash_ticks || (mag == burst && burst > 0) {
            effects.burst(EffectKind::Particle, self.center(), 20, (0.5, 1.0));
        }

        self.dash_timer -= self.dash_timer.signum();

        let mag = self.dash_timer.abs();
        if mag > burst {
            let dir = self.dash_timer.signum() as f32;
            self.body.velocity.x = dir * self.tuning.dash_speed;
            if mag == burst + 1 {
                // Last burst tick: bleed off most of the speed
                self.body.velocity.x *= self.tuning.dash_damping;
            }
            effects.trail(EffectKind::Particle, self.center(), Vec2::new(dir * 1.5, 0.0));
        }
    }

    fn apply_friction(&mut self, friction: f32) {
        let vx = &mut self.body.velocity.x;
        *vx = if *vx > 0.0 { (*vx - friction).max(0.0) } else { (*vx + friction).min(0.0) };
    }

    // ── Damage and death ──

    /// Take a hit. Ignored while invulnerable or already dead.
    pub fn take_hit(&mut self, source: HitSource, combat: &CombatTuning) -> HitResult {
        if !self.alive || self.is_invulnerable() {
            return HitResult::Blocked;
        }
        self.damage += match source {
            HitSource::Bullet => combat.bullet_damage,
            HitSource::Sword | HitSource::DashContact => combat.melee_damage,
        };
        if self.damage >= combat.death_threshold {
            self.kill(DeathCause::Hit(source));
            return HitResult::Killed;
        }
        HitResult::Damaged
    }

    /// Latch death. A second call in the same life does nothing.
    pub fn kill(&mut self, cause: DeathCause) {
        if self.alive {
            self.alive = false;
            self.death_cause = Some(cause);
            self.weapon.enabled = false;
        }
    }

    /// Back to spawn with every counter at its initial value.
    pub fn reset(&mut self, tuning: &Tuning) {
        *self = Player::new(self.slot, self.respawn_pos, tuning);
    }

    /// New spawn point; the body moves there too.
    pub fn set_spawn(&mut self, pos: Vec2) {
        self.respawn_pos = pos;
        self.body.pos = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::grid_from_rows;

    fn player_at(x: f32, y: f32) -> Player {
        Player::new(PlayerSlot::One, Vec2::new(x, y), &Tuning::default())
    }

    fn run(p: &mut Player, grid: &TileGrid, input: PlayerInput, ticks: u32) {
        let tuning = Tuning::default();
        let mut fx = EffectQueue::new();
        for _ in 0..ticks {
            p.apply_input(&input);
            p.update(grid, &tuning, &mut fx);
        }
    }

    fn floor() -> TileGrid {
        grid_from_rows(&[
            "..........",
            "..........",
            "..........",
            "##########",
        ])
    }

    #[test]
    fn respawn_is_a_copy_not_an_alias() {
        let tuning = Tuning::default();
        let mut p = player_at(16.0, 33.0);
        p.body.pos.x += 40.0;
        assert_eq!(p.respawn_pos, Vec2::new(16.0, 33.0));
        p.damage = 2.0;
        p.reset(&tuning);
        assert_eq!(p.body.pos, Vec2::new(16.0, 33.0));
        assert_eq!(p.damage, 0.0);
        assert!(p.alive);

        p.body.pos.y -= 24.0;
        assert_eq!(p.respawn_pos, Vec2::new(16.0, 33.0));
        p.reset(&tuning);
        assert_eq!(p.body.pos, Vec2::new(16.0, 33.0));
    }

    #[test]
    fn standing_on_floor_keeps_charge_and_idles() {
        let grid = floor();
        let mut p = player_at(20.0, 33.0);
        run(&mut p, &grid, PlayerInput::default(), 10);
        assert_eq!(p.jump_charges, 1);
        assert!(p.airborne_ticks <= 1);
        assert_eq!(p.body.action(), AnimState::Idle);
        assert_eq!(p.body.rect().bottom(), 48.0);
    }

    #[test]
    fn ground_jump_spends_the_charge() {
        let grid = floor();
        let mut p = player_at(20.0, 33.0);
        run(&mut p, &grid, PlayerInput::default(), 4);

        let jumping = PlayerInput { jump: true, ..Default::default() };
        assert_eq!(p.apply_input(&jumping).jumped, Some(JumpKind::Ground));
        assert_eq!(p.body.velocity.y, -3.0);
        assert_eq!(p.jump(), None);
        p.update(&grid, &Tuning::default(), &mut EffectQueue::new());
        assert_eq!(p.body.action(), AnimState::Jump);
    }

    #[test]
    fn wall_slide_caps_fall_and_faces_wall() {
        // Tall wall on the right, no floor in reach
        let rows: Vec<&str> = std::iter::repeat("..#").take(20).collect();
        let grid = grid_from_rows(&rows);
        let mut p = player_at(24.0, 16.0);
        p.body.velocity.y = 3.0;
        let push = PlayerInput { move_axis: 1, ..Default::default() };
        run(&mut p, &grid, push, 6);

        assert!(p.wall_sliding);
        assert!(p.body.velocity.y <= 0.5 + 0.1);
        assert!(!p.body.flip);
        assert_eq!(p.body.action(), AnimState::WallSlide);

        // Kick away from the wall
        assert_eq!(p.jump(), Some(JumpKind::WallKick));
        assert_eq!(p.body.velocity, Vec2::new(-3.5, -2.5));
    }

    #[test]
    fn sliding_without_pushing_does_not_kick() {
        let mut p = player_at(0.0, 0.0);
        p.wall_sliding = true;
        p.jump_charges = 0;
        p.body.flip = true;
        p.body.last_movement = Vec2::new(1.0, 0.0);
        assert_eq!(p.jump(), None);
        assert_eq!(p.body.velocity, Vec2::ZERO);
    }

    #[test]
    fn long_fall_kills_once() {
        let grid = TileGrid::new(16);
        let mut p = player_at(0.0, 0.0);
        run(&mut p, &grid, PlayerInput::default(), 120);
        assert!(p.alive);
        run(&mut p, &grid, PlayerInput::default(), 1);
        assert!(!p.alive);
        assert_eq!(p.death_cause, Some(DeathCause::Fell));
        p.kill(DeathCause::Hit(HitSource::Bullet));
        assert_eq!(p.death_cause, Some(DeathCause::Fell));
    }

    #[test]
    fn pinned_between_walls_never_falls_to_death() {
        let mut p = player_at(0.0, 0.0);
        p.airborne_ticks = 500;
        p.body.collisions.pinned = true;
        p.update_state();
        assert!(p.alive);

        p.body.collisions.pinned = false;
        p.update_state();
        assert!(!p.alive);
    }

    #[test]
    fn dash_burst_is_invulnerable_then_cooldown() {
        let tuning = Tuning::default();
        let grid = TileGrid::new(16);
        let mut p = player_at(0.0, 0.0);
        assert!(p.dash());
        assert!(!p.dash());
        assert_eq!(p.take_hit(HitSource::Bullet, &tuning.combat), HitResult::Blocked);
        assert_eq!(p.damage, 0.0);

        let mut fx = EffectQueue::new();
        p.update(&grid, &tuning, &mut fx);
        assert_eq!(p.dash_timer, 59);
        assert!((p.body.velocity.x - 7.9).abs() < 1e-5);

        for _ in 0..9 {
            p.update(&grid, &tuning, &mut fx);
        }
        assert_eq!(p.dash_timer, 50);
        assert!(!p.is_invulnerable());
        assert!(p.body.velocity.x < 1.0);
        assert!(p.is_dashing());
        assert_eq!(p.take_hit(HitSource::Bullet, &tuning.combat), HitResult::Damaged);

        for _ in 0..50 {
            p.update(&grid, &tuning, &mut fx);
        }
        assert_eq!(p.dash_timer, 0);
        assert!(p.dash());
    }

    #[test]
    fn dash_follows_facing() {
        let mut p = player_at(0.0, 0.0);
        p.body.flip = true;
        p.dash();
        assert_eq!(p.dash_timer, -60);
        p.update(&TileGrid::new(16), &Tuning::default(), &mut EffectQueue::new());
        assert!(p.body.velocity.x < -7.0);
    }

    #[test]
    fn attack_during_cooldown_is_dropped() {
        let grid = TileGrid::new(16);
        let tuning = Tuning::default();
        let mut fx = EffectQueue::new();
        let mut p = player_at(0.0, 0.0);
        assert_eq!(p.request_attack(), AttackRequest::Accepted);
        p.attack_pending = false;
        p.update(&grid, &tuning, &mut fx);
        assert_eq!(p.request_attack(), AttackRequest::CoolingDown);
        assert!(!p.attack_pending);
        for _ in 0..9 {
            p.update(&grid, &tuning, &mut fx);
        }
        assert_eq!(p.request_attack(), AttackRequest::Accepted);
    }

    #[test]
    fn damage_accumulates_to_death() {
        let combat = CombatTuning::default();
        let mut p = player_at(0.0, 0.0);
        assert_eq!(p.take_hit(HitSource::Bullet, &combat), HitResult::Damaged);
        assert_eq!(p.take_hit(HitSource::Sword, &combat), HitResult::Damaged);
        assert_eq!(p.take_hit(HitSource::Bullet, &combat), HitResult::Damaged);
        assert_eq!(p.take_hit(HitSource::Sword, &combat), HitResult::Killed);
        assert!(!p.alive);
        assert!(!p.weapon.enabled);
        assert_eq!(p.take_hit(HitSource::Bullet, &combat), HitResult::Blocked);
        assert_eq!(p.damage, 3.0);
    }

    #[test]
    fn dead_player_ignores_input() {
        let mut p = player_at(0.0, 0.0);
        p.kill(DeathCause::Fell);
        let all = PlayerInput { move_axis: 1, jump: true, dash: true, attack: true };
        assert_eq!(p.apply_input(&all), InputOutcome::default());
        assert_eq!(p.dash_timer, 0);
    }
}
