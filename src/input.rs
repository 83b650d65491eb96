//! Keyboard state to per-frame `FrameInput`, with key repeat.

use std::collections::{HashMap, HashSet};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use puyo::{DebugCommand, FrameInput};

/// Frames a key must be held before it starts repeating.
pub const REPEAT_DELAY: u32 = 10;
pub const REPEAT_INTERVAL: u32 = 2;
pub const FAST_DROP_INTERVAL: u32 = 1;

/// Without release events a key counts as held for this many frames after
/// its last press. Long enough to bridge the terminal's autorepeat delay.
const HOLD_GRACE_FRAMES: u32 = 30;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Left,
    Right,
    Down,
    RotateCw,
    RotateCcw,
    Start,
    Restart,
    Quit,
    Debug(DebugCommand),
}

pub fn action_for(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Down => Action::Down,
        KeyCode::Up | KeyCode::Char('x') | KeyCode::Char('X') => Action::RotateCw,
        KeyCode::Char('z') | KeyCode::Char('Z') => Action::RotateCcw,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Start,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        KeyCode::Char('g') | KeyCode::Char('G') => Action::Debug(DebugCommand::TestGravity),
        KeyCode::Char('c') | KeyCode::Char('C') => Action::Debug(DebugCommand::TestConnection),
        KeyCode::Char('e') | KeyCode::Char('E') => Action::Debug(DebugCommand::TestElimination),
        KeyCode::Char('a') | KeyCode::Char('A') => Action::Debug(DebugCommand::TestChainAnimation),
        _ => return None,
    };
    Some(action)
}

#[derive(Default)]
struct Held {
    frames: u32,
    since_event: u32,
}

/// Collects key events between frames.
///
/// With release events (keyboard enhancement) held keys repeat on our own
/// schedule. Without them every press the terminal sends fires once, and
/// its autorepeat stands in for ours.
pub struct InputState {
    release_events: bool,
    held: HashMap<Action, Held>,
    pressed: HashSet<Action>,
}

impl InputState {
    pub fn new(release_events: bool) -> Self {
        Self {
            release_events,
            held: HashMap::new(),
            pressed: HashSet::new(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let Some(action) = action_for(key.code) else {
            return;
        };
        match key.kind {
            KeyEventKind::Press => {
                if !self.release_events || !self.held.contains_key(&action) {
                    self.pressed.insert(action);
                }
                self.held.entry(action).or_default().since_event = 0;
            }
            KeyEventKind::Repeat => {
                self.held.entry(action).or_default().since_event = 0;
            }
            KeyEventKind::Release => {
                self.held.remove(&action);
            }
        }
    }

    fn repeats(&self, action: Action, interval: u32) -> bool {
        if !self.release_events {
            return false;
        }
        self.held.get(&action).is_some_and(|held| {
            held.frames > REPEAT_DELAY && (held.frames - REPEAT_DELAY) % interval == 0
        })
    }

    fn fires(&self, action: Action, interval: u32) -> bool {
        self.pressed.contains(&action) || self.repeats(action, interval)
    }

    /// Builds this frame's intents and advances hold timers.
    pub fn frame(&mut self) -> FrameInput {
        for held in self.held.values_mut() {
            held.frames += 1;
            held.since_event += 1;
        }
        if !self.release_events {
            self.held.retain(|_, held| held.since_event <= HOLD_GRACE_FRAMES);
        }

        let input = FrameInput {
            move_left: self.fires(Action::Left, REPEAT_INTERVAL),
            move_right: self.fires(Action::Right, REPEAT_INTERVAL),
            rotate_cw: self.pressed.contains(&Action::RotateCw),
            rotate_ccw: self.pressed.contains(&Action::RotateCcw),
            fast_drop: self.fires(Action::Down, FAST_DROP_INTERVAL),
            soft_drop_held: self.held.contains_key(&Action::Down),
            start: self.pressed.contains(&Action::Start),
            restart: self.pressed.contains(&Action::Restart),
            quit: self.pressed.contains(&Action::Quit),
            debug: self.pressed.iter().find_map(|action| match action {
                Action::Debug(command) => Some(*command),
                _ => None,
            }),
        };

        self.pressed.clear();
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn held_key_repeats_after_delay() {
        let mut input = InputState::new(true);
        input.handle_key(key(KeyCode::Left, KeyEventKind::Press));

        let fired: Vec<bool> = (0..16).map(|_| input.frame().move_left).collect();
        // frame 1 is the press, then 12, 14, 16
        let expected: Vec<bool> = (1..=16).map(|f| f == 1 || (f > 10 && (f - 10) % 2 == 0)).collect();
        assert_eq!(fired, expected);

        input.handle_key(key(KeyCode::Left, KeyEventKind::Release));
        assert!(!input.frame().move_left);
    }

    #[test]
    fn soft_drop_held_until_grace_runs_out() {
        let mut input = InputState::new(false);
        input.handle_key(key(KeyCode::Down, KeyEventKind::Press));
        let first = input.frame();
        assert!(first.fast_drop && first.soft_drop_held);

        for _ in 0..HOLD_GRACE_FRAMES - 1 {
            let frame = input.frame();
            assert!(frame.soft_drop_held && !frame.fast_drop);
        }
        assert!(!input.frame().soft_drop_held);
    }

    #[test]
    fn debug_keys_map_to_commands() {
        let mut input = InputState::new(false);
        input.handle_key(key(KeyCode::Char('g'), KeyEventKind::Press));
        assert_eq!(input.frame().debug, Some(DebugCommand::TestGravity));
        assert_eq!(input.frame().debug, None);
    }
}
