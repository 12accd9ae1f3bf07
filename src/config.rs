/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
///
/// Every simulation number lives in `Tuning`, which the world carries and
/// hands to the domain. The domain never sees the file.

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::animation::{AnimSpec, AnimState, AnimationTable};
use crate::domain::weapon::WeaponMode;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tuning: Tuning,
    pub controls: [KeyBindings; 2],
    pub levels_dir: PathBuf,
    pub start_level: Option<usize>,
    pub tick_rate_ms: u64,
    pub log_file: PathBuf,
    pub log_level: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tuning {
    pub physics: PhysicsTuning,
    pub player: PlayerTuning,
    pub combat: CombatTuning,
    pub animations: AnimationTable,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub terminal_velocity: f32,
    pub friction: f32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub size: [f32; 2],
    pub jump_velocity: f32,
    pub wall_kick: [f32; 2],
    pub wall_slide_max_fall: f32,
    pub wall_slide_air_ticks: u32,
    pub fall_death_ticks: u32,
    pub dash_ticks: i32,
    pub dash_burst_threshold: i32,
    pub dash_speed: f32,
    pub dash_damping: f32,
    pub attack_cooldown: u32,
    pub starting_weapon: WeaponMode,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    pub bullet_damage: f32,
    pub melee_damage: f32,
    pub death_threshold: f32,
    pub shot_budget: u32,
    pub projectile_speed: f32,
    pub projectile_lifetime: u32,
    pub projectile_cap: usize,
    pub sword_reach: f32,
}

/// Key names for one player. Parsed by the input layer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct KeyBindings {
    pub left: String,
    pub right: String,
    pub jump: String,
    pub dash: String,
    pub attack: String,
}

// ── Defaults ──

impl Default for PhysicsTuning {
    fn default() -> Self {
        PhysicsTuning { gravity: 0.1, terminal_velocity: 5.0, friction: 0.1 }
    }
}

impl Default for PlayerTuning {
    fn default() -> Self {
        PlayerTuning {
            size: [8.0, 15.0],
            jump_velocity: 3.0,
            wall_kick: [3.5, 2.5],
            wall_slide_max_fall: 0.5,
            wall_slide_air_ticks: 4,
            fall_death_ticks: 120,   // 2s at 60Hz
            dash_ticks: 60,
            dash_burst_threshold: 50, // |timer| above this = burst + invulnerable
            dash_speed: 8.0,
            dash_damping: 0.1,
            attack_cooldown: 10,
            starting_weapon: WeaponMode::Sword,
        }
    }
}

impl Default for CombatTuning {
    fn default() -> Self {
        CombatTuning {
            bullet_damage: 1.0,
            melee_damage: 0.5,
            death_threshold: 3.0,
            shot_budget: 5,
            projectile_speed: 5.0,
            projectile_lifetime: 360, // 6s at 60Hz
            projectile_cap: 120,
            sword_reach: 12.0,
        }
    }
}

fn default_player1_keys() -> KeyBindings {
    KeyBindings {
        left: "a".into(),
        right: "d".into(),
        jump: "w".into(),
        dash: "e".into(),
        attack: "Space".into(),
    }
}

fn default_player2_keys() -> KeyBindings {
    KeyBindings {
        left: "Left".into(),
        right: "Right".into(),
        jump: "Up".into(),
        dash: "m".into(),
        attack: "Enter".into(),
    }
}

pub fn default_controls() -> [KeyBindings; 2] {
    [default_player1_keys(), default_player2_keys()]
}

fn default_levels_dir() -> String { "levels".into() }
fn default_tick_rate() -> u64 { 16 }
fn default_log_file() -> String { "tilebrawl.log".into() }
fn default_log_level() -> String { "info".into() }

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    physics: PhysicsTuning,
    #[serde(default)]
    player: PlayerTuning,
    #[serde(default)]
    combat: CombatTuning,
    #[serde(default)]
    animations: TomlAnimations,
    #[serde(default)]
    controls: TomlControls,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    start_level: Option<usize>,
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

/// Closed set of animation sections; any other key is a parse error.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct TomlAnimations {
    idle: Option<AnimSpec>,
    run: Option<AnimSpec>,
    jump: Option<AnimSpec>,
    wall_slide: Option<AnimSpec>,
}

impl TomlAnimations {
    fn get(&self, state: AnimState) -> Option<AnimSpec> {
        match state {
            AnimState::Idle => self.idle,
            AnimState::Run => self.run,
            AnimState::Jump => self.jump,
            AnimState::WallSlide => self.wall_slide,
        }
    }
}

#[derive(Deserialize, Debug)]
struct TomlControls {
    #[serde(default = "default_player1_keys")]
    player1: KeyBindings,
    #[serde(default = "default_player2_keys")]
    player2: KeyBindings,
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            start_level: None,
            tick_rate_ms: default_tick_rate(),
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TomlControls {
    fn default() -> Self {
        let [player1, player2] = default_controls();
        TomlControls { player1, player2 }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    ///
    /// Runs before logging is set up, so it returns its warnings instead
    /// of emitting them.
    pub fn load() -> (Self, Vec<String>) {
        let search_dirs = candidate_dirs();
        let mut warnings = vec![];
        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        (GameConfig::from_toml(toml_cfg, &search_dirs), warnings)
    }

    fn from_toml(cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let defaults = AnimationTable::default();
        let overrides = cfg.animations;
        let animations = AnimationTable::new(|state| {
            overrides.get(state).unwrap_or_else(|| defaults.spec(state))
        });

        // Relative levels dir: first candidate dir that has it, else CWD
        let levels_dir_str = &cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            tuning: Tuning {
                physics: cfg.physics,
                player: cfg.player,
                combat: cfg.combat,
                animations,
            },
            controls: [cfg.controls.player1, cfg.controls.player2],
            levels_dir,
            start_level: cfg.general.start_level,
            tick_rate_ms: cfg.general.tick_rate_ms.max(1),
            log_file: PathBuf::from(cfg.general.log_file),
            log_level: cfg.general.log_level,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf], warnings: &mut Vec<String>) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warnings.push(format!("{}: parse error, using defaults: {e}", path.display()));
                    return TomlConfig::default();
                }
            },
            Err(e) => warnings.push(format!("could not read {}: {e}", path.display())),
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> GameConfig {
        let cfg: TomlConfig = toml::from_str(text).expect("valid toml");
        GameConfig::from_toml(cfg, &[])
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("");
        assert_eq!(cfg.tuning, Tuning::default());
        assert_eq!(cfg.tick_rate_ms, 16);
        assert_eq!(cfg.controls[0].attack, "Space");
        assert_eq!(cfg.controls[1].left, "Left");
        assert!(cfg.start_level.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse(r#"
            [combat]
            shot_budget = 3

            [player]
            starting_weapon = "gun"

            [animations.run]
            frames = 2
            frame_duration = 3
        "#);
        assert_eq!(cfg.tuning.combat.shot_budget, 3);
        assert_eq!(cfg.tuning.combat.projectile_lifetime, 360);
        assert_eq!(cfg.tuning.player.starting_weapon, WeaponMode::Gun);
        assert_eq!(cfg.tuning.player.dash_ticks, 60);
        let run = cfg.tuning.animations.spec(AnimState::Run);
        assert_eq!((run.frames, run.frame_duration, run.looping), (2, 3, true));
        assert_eq!(cfg.tuning.animations.spec(AnimState::Idle), AnimationTable::default().spec(AnimState::Idle));
    }

    #[test]
    fn unknown_animation_state_is_rejected() {
        let result = toml::from_str::<TomlConfig>("[animations.crouch]\nframes = 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_weapon_mode_is_rejected() {
        let result = toml::from_str::<TomlConfig>("[player]\nstarting_weapon = \"bow\"\n");
        assert!(result.is_err());
    }
}
