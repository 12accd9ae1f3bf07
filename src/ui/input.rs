/// Keyboard input for two players sharing one terminal.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement while a key is held
///   - Edge-triggered jump, dash and attack (only on initial press)
///   - Both players acting in the same tick
///
/// Release events are honoured only when the terminal is known to send
/// them; otherwise a key counts as released after `HOLD_TIMEOUT` without a
/// Press/Repeat.
///
/// The terminal is polled several times per simulation tick, so edge
/// presses are latched in `PendingInput` until the next tick consumes them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use thiserror::Error;

use crate::config::KeyBindings;
use crate::domain::entity::PlayerInput;

const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

#[derive(Debug, Error, PartialEq)]
#[error("unknown key name {name:?} for {action}")]
pub struct KeyNameError {
    pub action: &'static str,
    pub name: String,
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// `drain_events()`.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta keys.
    raw_events: Vec<KeyEvent>,

    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events without blocking.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent, at: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held_at(key.code, at);
                self.last_active.insert(key.code, at);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        let now = Instant::now();
        codes.iter().any(|c| self.is_held_at(*c, now))
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active
            .get(&code)
            .is_some_and(|t| now.duration_since(*t) < HOLD_TIMEOUT)
    }
}

// ── Key bindings ──

/// One player's bindings resolved to key codes. Letter keys match both
/// cases so Shift or Caps Lock does not swallow them.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerKeys {
    left: Vec<KeyCode>,
    right: Vec<KeyCode>,
    jump: Vec<KeyCode>,
    dash: Vec<KeyCode>,
    attack: Vec<KeyCode>,
}

impl PlayerKeys {
    pub fn from_bindings(bindings: &KeyBindings) -> Result<Self, KeyNameError> {
        Ok(PlayerKeys {
            left: parse_key("left", &bindings.left)?,
            right: parse_key("right", &bindings.right)?,
            jump: parse_key("jump", &bindings.jump)?,
            dash: parse_key("dash", &bindings.dash)?,
            attack: parse_key("attack", &bindings.attack)?,
        })
    }

    fn all(&self) -> impl Iterator<Item = &KeyCode> {
        self.left.iter()
            .chain(&self.right)
            .chain(&self.jump)
            .chain(&self.dash)
            .chain(&self.attack)
    }
}

fn parse_key(action: &'static str, name: &str) -> Result<Vec<KeyCode>, KeyNameError> {
    let code = match name.to_ascii_lowercase().as_str() {
        "space" => KeyCode::Char(' '),
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_control() => {
                    let (lower, upper) = (c.to_ascii_lowercase(), c.to_ascii_uppercase());
                    return Ok(if lower == upper {
                        vec![KeyCode::Char(c)]
                    } else {
                        vec![KeyCode::Char(lower), KeyCode::Char(upper)]
                    });
                }
                _ => return Err(KeyNameError { action, name: name.to_string() }),
            }
        }
    };
    Ok(vec![code])
}

/// Both players' key maps. Returns the first overlap as a warning string:
/// a key bound for both players drives both.
pub fn resolve_controls(bindings: &[KeyBindings; 2]) -> Result<([PlayerKeys; 2], Option<String>), KeyNameError> {
    let one = PlayerKeys::from_bindings(&bindings[0])?;
    let two = PlayerKeys::from_bindings(&bindings[1])?;
    let clash = one.all().find(|k| two.all().any(|o| o == *k))
        .map(|k| format!("key {k:?} is bound for both players"));
    Ok(([one, two], clash))
}

// ── Per-tick latch ──

/// Edge presses seen since the last tick, per player.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PendingInput {
    jump: bool,
    dash: bool,
    attack: bool,
}

impl PendingInput {
    pub fn latch(&mut self, kb: &InputState, keys: &PlayerKeys) {
        self.jump |= kb.any_pressed(&keys.jump);
        self.dash |= kb.any_pressed(&keys.dash);
        self.attack |= kb.any_pressed(&keys.attack);
    }

    /// Build this tick's input and clear the latch. Attack also fires
    /// while held; the weapon's cooldown paces it.
    pub fn take(&mut self, kb: &InputState, keys: &PlayerKeys) -> PlayerInput {
        let left = kb.any_held(&keys.left) || kb.any_pressed(&keys.left);
        let right = kb.any_held(&keys.right) || kb.any_pressed(&keys.right);
        let input = PlayerInput {
            move_axis: right as i8 - left as i8,
            jump: self.jump,
            dash: self.dash,
            attack: self.attack || kb.any_held(&keys.attack),
        };
        *self = PendingInput::default();
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn key_names_parse() {
        assert_eq!(parse_key("jump", "Space"), Ok(vec![KeyCode::Char(' ')]));
        assert_eq!(parse_key("left", "LEFT"), Ok(vec![KeyCode::Left]));
        assert_eq!(parse_key("left", "a"), Ok(vec![KeyCode::Char('a'), KeyCode::Char('A')]));
        assert_eq!(parse_key("dash", "/"), Ok(vec![KeyCode::Char('/')]));
        assert_eq!(
            parse_key("dash", "Hyper"),
            Err(KeyNameError { action: "dash", name: "Hyper".into() })
        );
    }

    #[test]
    fn default_controls_do_not_clash() {
        let (_, clash) = resolve_controls(&crate::config::default_controls()).expect("defaults parse");
        assert_eq!(clash, None);
    }

    #[test]
    fn clashing_controls_are_reported() {
        let mut bindings = crate::config::default_controls();
        bindings[1].attack = "Space".into();
        let (_, clash) = resolve_controls(&bindings).expect("parse");
        assert!(clash.is_some());
    }

    #[test]
    fn presses_are_latched_until_the_tick() {
        let (keys, _) = resolve_controls(&crate::config::default_controls()).expect("defaults parse");
        let mut kb = InputState::new();
        let mut pending = [PendingInput::default(); 2];

        kb.record(press(KeyCode::Char('w')), Instant::now());
        kb.record(press(KeyCode::Right), Instant::now());
        pending[0].latch(&kb, &keys[0]);
        pending[1].latch(&kb, &keys[1]);

        // Next poll sees nothing new; the jump press must survive
        kb.fresh_presses.clear();
        pending[0].latch(&kb, &keys[0]);

        let p1 = pending[0].take(&kb, &keys[0]);
        let p2 = pending[1].take(&kb, &keys[1]);
        assert!(p1.jump);
        assert_eq!(p1.move_axis, 0);
        assert_eq!(p2.move_axis, 1);
        assert!(!p2.jump);
        assert_eq!(pending[0], PendingInput::default());
    }

    #[test]
    fn held_key_is_not_a_fresh_press() {
        let mut kb = InputState::new();
        let now = Instant::now();
        kb.record(press(KeyCode::Left), now);
        assert!(kb.was_pressed(KeyCode::Left));
        kb.fresh_presses.clear();
        kb.record(press(KeyCode::Left), now);
        assert!(!kb.was_pressed(KeyCode::Left));
        assert!(kb.any_held(&[KeyCode::Left]));
    }
}
