/// Animated body: position, velocity and axis-separated tile collision.
///
/// ## Per-tick order (`advance`)
///
///   1. Clear collision flags
///   2. frame movement = requested movement + velocity
///   3. X axis: move, push out of every overlapping solid tile
///   4. Y axis: same, starting from the x-corrected position
///   5. Probe 1 px to each side for walls on both sides at once
///   6. Gravity (after the y test, so it only affects the next tick)
///   7. Facing from horizontal input
///   8. Vertical contact zeroes vertical velocity
///   9. Animation frame advances
///
/// X is resolved before Y. A body pressed into an inner corner therefore
/// slides down the wall instead of along the floor, and a diagonal move
/// onto a ledge lands on top of it rather than clipping the corner.

use super::animation::{AnimState, Animation, AnimationTable};
use super::geom::{Rect, Vec2};
use super::grid::TileGrid;
use crate::config::PhysicsTuning;

/// Which sides touched a solid tile during the last `advance`.
/// Recomputed from scratch every tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Collisions {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Flush against solid tiles on both sides. `left`/`right` only record
    /// the side the body moved into, so this comes from a separate probe.
    pub pinned: bool,
}

impl Collisions {
    pub fn any_wall(&self) -> bool {
        self.left || self.right
    }
}

#[derive(Clone, Debug)]
pub struct Body {
    pub pos: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
    pub collisions: Collisions,
    /// Facing left.
    pub flip: bool,
    /// Requested movement of the previous `advance`.
    pub last_movement: Vec2,
    animation: Animation,
    anims: AnimationTable,
}

impl Body {
    pub fn new(pos: Vec2, size: Vec2, anims: AnimationTable) -> Self {
        Body {
            pos,
            velocity: Vec2::ZERO,
            size,
            collisions: Collisions::default(),
            flip: false,
            last_movement: Vec2::ZERO,
            animation: Animation::new(AnimState::Idle, &anims),
            anims,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::at(self.pos, self.size)
    }

    pub fn action(&self) -> AnimState {
        self.animation.state()
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn set_action(&mut self, state: AnimState) {
        self.animation.set_state(state, &self.anims);
    }

    pub fn advance(&mut self, movement: Vec2, grid: &TileGrid, physics: &PhysicsTuning) {
        self.collisions = Collisions::default();

        let frame_movement = movement + self.velocity;

        self.resolve_x(frame_movement.x, grid);
        self.resolve_y(frame_movement.y, grid);
        self.collisions.pinned = self.wall_within(-1.0, grid) && self.wall_within(1.0, grid);

        self.velocity.y = (self.velocity.y + physics.gravity).min(physics.terminal_velocity);

        if movement.x > 0.0 {
            self.flip = false;
        } else if movement.x < 0.0 {
            self.flip = true;
        }
        self.last_movement = movement;

        if self.collisions.down || self.collisions.up {
            self.velocity.y = 0.0;
        }

        self.animation.advance_frame();
    }

    fn resolve_x(&mut self, dx: f32, grid: &TileGrid) {
        self.pos.x += dx;
        let mut rect = self.rect();
        for tile in grid.solid_rects_near(self.pos) {
            if !rect.overlaps(&tile) {
                continue;
            }
            if dx > 0.0 {
                rect.x = tile.left() - rect.w;
                self.collisions.right = true;
            }
            if dx < 0.0 {
                rect.x = tile.right();
                self.collisions.left = true;
            }
            self.pos.x = rect.x;
        }
    }

    fn wall_within(&self, dx: f32, grid: &TileGrid) -> bool {
        let probe = Rect { x: self.pos.x + dx, ..self.rect() };
        grid.solid_rects_near(self.pos).iter().any(|t| probe.overlaps(t))
    }

    fn resolve_y(&mut self, dy: f32, grid: &TileGrid) {
        self.pos.y += dy;
        let mut rect = self.rect();
        for tile in grid.solid_rects_near(self.pos) {
            if !rect.overlaps(&tile) {
                continue;
            }
            if dy > 0.0 {
                rect.y = tile.top() - rect.h;
                self.collisions.down = true;
            }
            if dy < 0.0 {
                rect.y = tile.bottom();
                self.collisions.up = true;
            }
            self.pos.y = rect.y;
        }
    }
}
