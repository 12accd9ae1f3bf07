/// Named animation states and the frame counter driven once per tick.
///
/// The simulation owns only the counter. Which image a frame index maps to
/// belongs to whatever draws it.

use serde::Deserialize;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum AnimState {
    Idle,
    Run,
    Jump,
    WallSlide,
}

impl AnimState {
    pub const ALL: [AnimState; 4] = [AnimState::Idle, AnimState::Run, AnimState::Jump, AnimState::WallSlide];

    fn index(self) -> usize {
        match self {
            AnimState::Idle => 0,
            AnimState::Run => 1,
            AnimState::Jump => 2,
            AnimState::WallSlide => 3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(default)]
pub struct AnimSpec {
    pub frames: u32,
    pub frame_duration: u32,
    pub looping: bool,
}

impl Default for AnimSpec {
    fn default() -> Self {
        AnimSpec { frames: 4, frame_duration: 5, looping: true }
    }
}

impl AnimSpec {
    /// Total ticks in one pass. Never zero.
    fn span(&self) -> u32 {
        (self.frames.max(1) * self.frame_duration.max(1)).max(1)
    }
}

/// Lookup table from state to timing, resolved once at load.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AnimationTable {
    specs: [AnimSpec; 4],
}

impl AnimationTable {
    pub fn new(lookup: impl Fn(AnimState) -> AnimSpec) -> Self {
        AnimationTable { specs: AnimState::ALL.map(lookup) }
    }

    pub fn spec(&self, state: AnimState) -> AnimSpec {
        self.specs[state.index()]
    }
}

impl Default for AnimationTable {
    fn default() -> Self {
        AnimationTable::new(|state| match state {
            AnimState::Idle => AnimSpec { frames: 22, frame_duration: 6, looping: true },
            AnimState::Run => AnimSpec { frames: 8, frame_duration: 4, looping: true },
            AnimState::Jump => AnimSpec { frames: 1, frame_duration: 5, looping: true },
            AnimState::WallSlide => AnimSpec { frames: 1, frame_duration: 5, looping: true },
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Animation {
    state: AnimState,
    spec: AnimSpec,
    tick: u32,
}

impl Animation {
    pub fn new(state: AnimState, table: &AnimationTable) -> Self {
        Animation { state, spec: table.spec(state), tick: 0 }
    }

    pub fn state(&self) -> AnimState {
        self.state
    }

    /// Switch state. Only an actual change rewinds to frame 0.
    pub fn set_state(&mut self, state: AnimState, table: &AnimationTable) {
        if state != self.state {
            *self = Animation::new(state, table);
        }
    }

    pub fn advance_frame(&mut self) {
        let span = self.spec.span();
        if self.spec.looping {
            self.tick = (self.tick + 1) % span;
        } else {
            self.tick = (self.tick + 1).min(span - 1);
        }
    }

    /// Index of the image to show.
    pub fn current_frame(&self) -> u32 {
        self.tick / self.spec.frame_duration.max(1)
    }
}
