/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::KeyCode;
use tracing::{debug, info, trace, warn, Level};

use config::GameConfig;
use domain::effect::EffectRequest;
use domain::entity::{PlayerInput, PlayerSlot};
use domain::player::{DeathCause, HitSource};
use sim::event::GameEvent;
use sim::level::LevelSet;
use sim::step;
use sim::world::World;
use ui::input::{resolve_controls, InputState, PendingInput, PlayerKeys};
use ui::renderer::{Overlay, Renderer};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
/// How long a HUD message stays up, in ticks.
const MESSAGE_TICKS: u32 = 120;

fn main() -> anyhow::Result<()> {
    let (config, warnings) = GameConfig::load();
    init_logging(&config)?;
    for w in &warnings {
        warn!("{w}");
    }

    // `--export-levels [DIR]`: write the built-in arenas as JSON and exit
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("--export-levels") {
        let dir = args.next().map_or_else(|| config.levels_dir.clone(), PathBuf::from);
        let written = sim::level::export_builtin(&dir)
            .with_context(|| format!("exporting levels to {}", dir.display()))?;
        for path in written {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let levels = LevelSet::load_dir(&config.levels_dir)
        .with_context(|| format!("loading levels from {}", config.levels_dir.display()))?;
    info!(count = levels.len(), names = ?levels.names().collect::<Vec<_>>(), "level set ready");

    let (keys, clash) = resolve_controls(&config.controls).context("reading [controls]")?;
    if let Some(clash) = clash {
        warn!("{clash}");
    }

    let mut world = World::new(levels, config.tuning.clone(), config.start_level);

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;

    let result = game_loop(&mut world, &mut renderer, &keys, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    result?;

    info!(ticks = world.tick, level = world.battle.current_level, "session ended");
    println!("Tilebrawl ended on level {} ({}).", world.battle.current_level + 1, world.level_name());
    Ok(())
}

/// The terminal is in raw mode on the alternate screen, so logs go to a file.
fn init_logging(config: &GameConfig) -> anyhow::Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("creating log file {}", config.log_file.display()))?;
    let (level, bad_level) = match config.log_level.parse::<Level>() {
        Ok(level) => (level, false),
        Err(_) => (Level::INFO, true),
    };
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    if bad_level {
        warn!(log_level = %config.log_level, "unknown log level, using info");
    }
    Ok(())
}

/// Loop-owned state shown by the view.
#[derive(Default)]
struct Hud {
    paused: bool,
    message: String,
    message_timer: u32,
}

impl Hud {
    fn set_message(&mut self, text: String) {
        self.message = text;
        self.message_timer = MESSAGE_TICKS;
    }

    fn tick(&mut self) {
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 {
                self.message.clear();
            }
        }
    }
}

fn game_loop(
    world: &mut World,
    renderer: &mut Renderer,
    keys: &[PlayerKeys; 2],
    config: &GameConfig,
) -> anyhow::Result<()> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.enable_key_release().context("keyboard enhancement")?;
    debug!(honor_release = kb.honor_release, "input ready");

    let mut hud = Hud::default();
    let mut pending = [PendingInput::default(); 2];
    let mut effects: Vec<EffectRequest> = Vec::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.tick_rate_ms);

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() || kb.was_pressed(KeyCode::Esc) {
            break;
        }
        if kb.was_pressed(KeyCode::F(1)) {
            hud.paused = !hud.paused;
            info!(paused = hud.paused, "pause toggled");
        }

        if !hud.paused {
            for slot in PlayerSlot::BOTH {
                pending[slot.index()].latch(&kb, &keys[slot.index()]);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if !hud.paused {
                let inputs: [PlayerInput; 2] =
                    PlayerSlot::BOTH.map(|slot| pending[slot.index()].take(&kb, &keys[slot.index()]));
                let events = step::step(world, inputs);
                for event in &events {
                    if let Some(text) = describe(event) {
                        hud.set_message(text);
                    }
                }
                effects.clear();
                effects.extend(world.effects.drain());
                if !effects.is_empty() {
                    trace!(tick = world.tick, count = effects.len(), "effect requests");
                }
            }
            hud.tick();
            last_tick = Instant::now();
        }

        let overlay = Overlay { paused: hud.paused, message: &hud.message, effects: &effects };
        renderer.render(world, &overlay)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// One-line HUD text for the events worth telling the players about.
fn describe(event: &GameEvent) -> Option<String> {
    let text = match event {
        GameEvent::Hit { target, source, blocked: false } => {
            let by = match source {
                HitSource::Bullet => "shot",
                HitSource::Sword => "cut",
                HitSource::DashContact => "rammed",
            };
            format!("P{} {by}", target.number())
        }
        GameEvent::PlayerKilled { slot, cause } => match cause {
            DeathCause::Fell => format!("P{} fell", slot.number()),
            DeathCause::Hit(_) => format!("P{} down", slot.number()),
        },
        GameEvent::Unlocked { slot } => format!("P{} may advance", slot.number()),
        GameEvent::WeaponPicked { slot } => format!("P{} picked up the gun", slot.number()),
        GameEvent::WeaponReverted { slot } => format!("P{} is out of ammo", slot.number()),
        GameEvent::GunJammed { slot } => format!("P{} gun jammed", slot.number()),
        GameEvent::LevelChanged { to, .. } => format!("Level {}", to + 1),
        _ => return None,
    };
    Some(text)
}
