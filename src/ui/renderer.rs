/// Debug view: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// One tile is two terminal columns by one row, so a column covers half a
/// tile horizontally. Players and projectiles are placed by pixel position
/// at that resolution. The camera follows the midpoint of the live
/// players and is clamped to the level's tile bounds.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::animation::AnimState;
use crate::domain::effect::{EffectKind, EffectRequest};
use crate::domain::entity::PlayerSlot;
use crate::domain::geom::Vec2;
use crate::domain::player::Player;
use crate::domain::tile::{Favors, TileKind};
use crate::domain::weapon::{Aim, WeaponMode};
use crate::sim::world::World;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit background for every empty cell, so the gap between rows
    /// matches cell colour on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from any real cell; filling the back buffer with it forces
    /// a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Camera ──

/// Terminal columns per tile.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap above the map, message + help below it.
const RESERVED_ROWS: usize = MAP_ROW + 3;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

/// Top-left visible tile and the view size in tiles.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Camera {
    x: i32,
    y: i32,
    view_w: usize,
    view_h: usize,
}

impl Camera {
    fn follow(world: &World, view_w: usize, view_h: usize) -> Self {
        let ts = world.grid.tile_size() as f32;
        let focus = focus_point(&world.players);
        let fx = (focus.x / ts).floor() as i32;
        let fy = (focus.y / ts).floor() as i32;

        let (x, y) = match world.grid.bounds() {
            Some(((lx, ly), (hx, hy))) => (
                clamp_axis(fx, view_w as i32, lx, hx),
                clamp_axis(fy, view_h as i32, ly, hy),
            ),
            None => (fx - view_w as i32 / 2, fy - view_h as i32 / 2),
        };
        Camera { x, y, view_w, view_h }
    }

    /// Terminal (column, row) inside the map area for a world pixel, if
    /// it is on screen.
    fn project(&self, p: Vec2, tile_size: i32) -> Option<(usize, usize)> {
        let ts = tile_size as f32;
        let col = (p.x * CELL_W as f32 / ts).floor() as i32 - self.x * CELL_W as i32;
        let row = (p.y / ts).floor() as i32 - self.y;
        let on_screen = col >= 0
            && row >= 0
            && (col as usize) < self.view_w * CELL_W
            && (row as usize) < self.view_h;
        on_screen.then(|| (col as usize, MAP_ROW + row as usize))
    }
}

/// Centre the view on `focus`, but keep it inside [lo, hi] when the level
/// is larger than the view. A smaller level is centred.
fn clamp_axis(focus: i32, view: i32, lo: i32, hi: i32) -> i32 {
    let extent = hi - lo + 1;
    if extent <= view {
        lo - (view - extent) / 2
    } else {
        (focus - view / 2).clamp(lo, hi - view + 1)
    }
}

fn focus_point(players: &[Player; 2]) -> Vec2 {
    let live: Vec<Vec2> = players.iter().filter(|p| p.alive).map(|p| p.center()).collect();
    let points = if live.is_empty() {
        players.iter().map(|p| p.center()).collect()
    } else {
        live
    };
    let n = points.len() as f32;
    let sum = points.iter().fold(Vec2::ZERO, |acc, &p| acc + p);
    Vec2::new(sum.x / n, sum.y / n)
}

// ── Renderer ──

/// State the loop owns that the view shows but the world does not.
pub struct Overlay<'a> {
    pub paused: bool,
    pub message: &'a str,
    /// Effect requests from the last tick, drawn as single glyphs.
    pub effects: &'a [EffectRequest],
}

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    key_release: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            key_release: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    /// Ask the terminal for key Release events. Returns whether it
    /// supports them; without them input falls back to hold timeouts.
    pub fn enable_key_release(&mut self) -> io::Result<bool> {
        if !terminal::supports_keyboard_enhancement().unwrap_or(false) {
            return Ok(false);
        }
        execute!(
            self.writer,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
        self.key_release = true;
        Ok(true)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.key_release {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, world: &World, overlay: &Overlay) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        compose(&mut self.front, world, overlay);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Not ResetColor: the terminal default may differ from BASE_BG.
        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}

// ── Compose: build front buffer content ──

fn compose(buf: &mut FrameBuffer, w: &World, overlay: &Overlay) {
    buf.clear();
    let view_w = buf.width / CELL_W;
    let view_h = buf.height.saturating_sub(RESERVED_ROWS).max(1);
    let cam = Camera::follow(w, view_w, view_h);

    compose_hud(buf, w);
    compose_map(buf, w, &cam);
    compose_effects(buf, overlay.effects, &cam, w.grid.tile_size());
    for p in w.projectiles.iter() {
        if let Some((col, row)) = cam.project(p.pos, w.grid.tile_size()) {
            buf.set(col, row, Cell::new('-', Color::Rgb { r: 255, g: 230, b: 120 }, Color::Reset));
        }
    }
    for player in w.players.iter().filter(|p| p.alive) {
        compose_weapon(buf, player, &cam, w.grid.tile_size());
        compose_player(buf, player, &cam, w.grid.tile_size());
    }

    let msg_row = MAP_ROW + cam.view_h;
    if !overlay.message.is_empty() && msg_row < buf.height {
        buf.fill_row(msg_row, MSG_BG);
        buf.put_str(0, msg_row, &format!(" {} ", overlay.message), Color::Black, MSG_BG);
    }
    let help_row = msg_row + 1;
    if help_row < buf.height {
        buf.put_str(0, help_row, " F1:Pause  Esc:Quit", Color::DarkGrey, Color::Reset);
    }

    if overlay.paused {
        compose_pause(buf, &cam);
    }
}

fn compose_hud(buf: &mut FrameBuffer, w: &World) {
    buf.fill_row(HUD_ROW, HUD_BG);
    let threshold = w.tuning.combat.death_threshold;
    let budget = w.tuning.combat.shot_budget;
    let [p1, p2] = &w.players;
    let hud = format!(
        " L{} {:<10}| {} | {} ",
        w.battle.current_level + 1,
        w.level_name(),
        player_status(p1, w.battle.unlock[0], threshold, budget),
        player_status(p2, w.battle.unlock[1], threshold, budget),
    );
    buf.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
}

fn player_status(p: &Player, unlocked: bool, threshold: f32, budget: u32) -> String {
    let weapon = match p.weapon.mode() {
        WeaponMode::Sword => "Sword".to_string(),
        WeaponMode::Gun => format!("Gun {}/{}", budget.saturating_sub(p.weapon.shots_fired()), budget),
    };
    let action = match p.body.action() {
        _ if p.is_dashing() => "dash",
        AnimState::Idle => "idle",
        AnimState::Run => "run",
        AnimState::Jump => "jump",
        AnimState::WallSlide => "slide",
    };
    let arrow = match (unlocked, p.slot.direction()) {
        (false, _) => "",
        (true, Favors::Forward) => " >>",
        (true, Favors::Backward) => " <<",
    };
    format!("P{} {:.1}/{:.0} {weapon} {action}{arrow}", p.slot.number(), p.damage, threshold)
}

fn compose_map(buf: &mut FrameBuffer, w: &World, cam: &Camera) {
    let ts = w.grid.tile_size();

    for deco in w.grid.offgrid() {
        if let Some((col, row)) = cam.project(deco.pos, ts) {
            buf.set(col, row, Cell::new('*', Color::Rgb { r: 60, g: 110, b: 50 }, Color::Reset));
        }
    }

    for vy in 0..cam.view_h {
        for vx in 0..cam.view_w {
            let pos = (cam.x + vx as i32, cam.y + vy as i32);
            let Some(tile) = w.grid.tile_at(pos) else { continue };
            let (c0, c1, fg, bg) = match tile.kind {
                TileKind::Stone => ('█', '█', Color::Rgb { r: 120, g: 120, b: 120 }, Color::Rgb { r: 70, g: 70, b: 70 }),
                TileKind::Grass => ('▓', '▓', Color::Rgb { r: 90, g: 170, b: 70 }, Color::Rgb { r: 50, g: 90, b: 40 }),
                TileKind::Decor | TileKind::LargeDecor => ('"', '"', Color::Rgb { r: 60, g: 110, b: 50 }, Color::Reset),
                TileKind::WeaponSpawn => ('[', ']', Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset),
                TileKind::Transition => match Favors::from_variant(tile.variant) {
                    Favors::Forward => ('>', '>', player_color(PlayerSlot::One), Color::Reset),
                    Favors::Backward => ('<', '<', player_color(PlayerSlot::Two), Color::Reset),
                },
                TileKind::Spawner => ('+', '+', Color::DarkGrey, Color::Reset),
            };
            let (col, row) = (vx * CELL_W, MAP_ROW + vy);
            buf.set(col, row, Cell::new(c0, fg, bg));
            buf.set(col + 1, row, Cell::new(c1, fg, bg));
        }
    }
}

fn compose_effects(buf: &mut FrameBuffer, effects: &[EffectRequest], cam: &Camera, tile_size: i32) {
    for request in effects {
        let (at, ch, fg) = match *request {
            EffectRequest::Burst { kind, at, .. } | EffectRequest::Trail { kind, at, .. } => match kind {
                EffectKind::Particle => (at, '.', Color::Grey),
                EffectKind::Spark => (at, '*', Color::Rgb { r: 255, g: 200, b: 80 }),
                EffectKind::Leaf => (at, ',', Color::Rgb { r: 120, g: 180, b: 60 }),
                EffectKind::Pickup => (at, '+', Color::Rgb { r: 255, g: 220, b: 50 }),
            },
            EffectRequest::DirectedSpark { at, .. } => (at, '\'', Color::Rgb { r: 255, g: 200, b: 80 }),
            EffectRequest::LevelTransition => continue,
        };
        if let Some((col, row)) = cam.project(at, tile_size) {
            buf.set(col, row, Cell::new(ch, fg, Color::Reset));
        }
    }
}

fn player_color(slot: PlayerSlot) -> Color {
    match slot {
        PlayerSlot::One => Color::Rgb { r: 100, g: 200, b: 255 },
        PlayerSlot::Two => Color::Rgb { r: 255, g: 110, b: 110 },
    }
}

/// Sword reach while the swing cools down, the gun muzzle always. Drawn
/// under the player glyphs, so only the part past the body shows.
fn compose_weapon(buf: &mut FrameBuffer, p: &Player, cam: &Camera, tile_size: i32) {
    let fg = player_color(p.slot);
    match p.weapon.aim() {
        Aim::Hitbox(reach) if p.attack_cooldown > 0 => {
            let col_px = tile_size as f32 / CELL_W as f32;
            let first = (reach.left() / col_px).floor() as i32;
            let last = (reach.right() / col_px).ceil() as i32 - 1;
            let y = reach.center().y;
            for c in first..=last {
                let at = Vec2::new((c as f32 + 0.5) * col_px, y);
                if let Some((col, row)) = cam.project(at, tile_size) {
                    buf.set(col, row, Cell::new('~', fg, Color::Reset));
                }
            }
        }
        Aim::Muzzle(muzzle) => {
            if let Some((col, row)) = cam.project(muzzle, tile_size) {
                buf.set(col, row, Cell::new('-', fg, Color::Reset));
            }
        }
        Aim::Hitbox(_) => {}
    }
}

/// Number plus a facing arrow, on the column of the body centre. The
/// arrow alternates with the run animation's frames.
fn compose_player(buf: &mut FrameBuffer, p: &Player, cam: &Camera, tile_size: i32) {
    let Some((col, row)) = cam.project(p.center(), tile_size) else { return };
    let fg = if p.is_invulnerable() { Color::White } else { player_color(p.slot) };
    let digit = char::from_digit(p.slot.number() as u32, 10).unwrap_or('?');
    let stride = p.body.action() == AnimState::Run && p.body.animation().current_frame() % 2 == 1;
    let arrow = match (p.body.action(), p.body.flip) {
        (AnimState::WallSlide, _) => '|',
        (_, true) if stride => '«',
        (_, false) if stride => '»',
        (_, true) => '<',
        (_, false) => '>',
    };
    let (first, second) = if p.body.flip { (arrow, digit) } else { (digit, arrow) };
    buf.set(col, row, Cell::new(first, fg, Color::Reset));
    if col + 1 < cam.view_w * CELL_W {
        buf.set(col + 1, row, Cell::new(second, fg, Color::Reset));
    }
}

fn compose_pause(buf: &mut FrameBuffer, cam: &Camera) {
    let dim = Color::Rgb { r: 40, g: 40, b: 40 };
    let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
    let label = "  PAUSED  [F1] Resume  ";
    let box_w = label.chars().count();
    let x = (cam.view_w * CELL_W).saturating_sub(box_w) / 2;
    let y = MAP_ROW + cam.view_h / 2;
    buf.put_str(x, y, label, hdr, dim);
}
