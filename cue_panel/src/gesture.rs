use cue_protocol::CueIndex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Pointer,
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Other,
}

impl Key {
    pub fn from_code(code: &str) -> Self {
        match code {
            "Space" | " " => Key::Space,
            "Enter" | "NumpadEnter" => Key::Enter,
            _ => Key::Other,
        }
    }

    fn presses_cue(self) -> bool {
        matches!(self, Key::Space | Key::Enter)
    }
}

/// Physical input on a cue's trigger or release control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    PointerDown { cue: CueIndex },
    PointerUp { cue: CueIndex },
    PointerCancel { cue: CueIndex },
    PointerLeave { cue: CueIndex },
    KeyDown { cue: CueIndex, key: Key },
    KeyUp { cue: CueIndex, key: Key },
    ReleaseClick { cue: CueIndex },
    ReleaseTouchEnd { cue: CueIndex },
}

impl RawInput {
    pub fn cue(self) -> CueIndex {
        match self {
            RawInput::PointerDown { cue }
            | RawInput::PointerUp { cue }
            | RawInput::PointerCancel { cue }
            | RawInput::PointerLeave { cue }
            | RawInput::KeyDown { cue, .. }
            | RawInput::KeyUp { cue, .. }
            | RawInput::ReleaseClick { cue }
            | RawInput::ReleaseTouchEnd { cue } => cue,
        }
    }
}

/// Logical press of a cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Start(CueIndex),
    End(CueIndex),
}

/// Folds overlapping physical inputs into one start/end pair per press.
///
/// A press starts with the first source going down and ends when the last held
/// source comes up. Ups from sources that are not held are dropped, so a
/// pointer leave after a pointer up, or a key up for a key pressed elsewhere,
/// never produces a second release. The release control always ends the press.
#[derive(Debug, Default)]
pub struct GestureAdapter {
    held: HashMap<CueIndex, HashSet<InputSource>>,
    release_touch: Option<CueIndex>,
}

impl GestureAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, cue: CueIndex) -> bool {
        self.held.get(&cue).is_some_and(|s| !s.is_empty())
    }

    pub fn translate(&mut self, input: RawInput) -> Option<Gesture> {
        // a click right after a touch end on the same release control is the same tap
        let touched = self.release_touch.take();

        match input {
            RawInput::PointerDown { cue } => self.down(cue, InputSource::Pointer),
            RawInput::PointerUp { cue }
            | RawInput::PointerCancel { cue }
            | RawInput::PointerLeave { cue } => self.up(cue, InputSource::Pointer),
            RawInput::KeyDown { cue, key } if key.presses_cue() => {
                self.down(cue, InputSource::Keyboard)
            }
            RawInput::KeyUp { cue, key } if key.presses_cue() => {
                self.up(cue, InputSource::Keyboard)
            }
            RawInput::KeyDown { .. } | RawInput::KeyUp { .. } => None,
            RawInput::ReleaseTouchEnd { cue } => {
                self.release_touch = Some(cue);
                self.held.remove(&cue);
                Some(Gesture::End(cue))
            }
            RawInput::ReleaseClick { cue } => {
                if touched == Some(cue) {
                    return None;
                }
                self.held.remove(&cue);
                Some(Gesture::End(cue))
            }
        }
    }

    fn down(&mut self, cue: CueIndex, source: InputSource) -> Option<Gesture> {
        let sources = self.held.entry(cue).or_default();
        let starting = sources.is_empty();
        sources.insert(source);
        starting.then_some(Gesture::Start(cue))
    }

    fn up(&mut self, cue: CueIndex, source: InputSource) -> Option<Gesture> {
        let sources = self.held.get_mut(&cue)?;
        if !sources.remove(&source) {
            return None;
        }
        if !sources.is_empty() {
            return None;
        }
        self.held.remove(&cue);
        Some(Gesture::End(cue))
    }
}
