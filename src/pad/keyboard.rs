// Keyboard-backed local pad
// Terminals only report key presses, so a key counts as held for a short
// window after its last press (auto-repeat keeps it alive).

use super::virtual_pad::{AXIS_LX, AXIS_LY, AXIS_RX, AXIS_RY, BUTTON_A, BUTTON_START};
use crate::network::protocol::InputFrame;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

/// Stand-in for the platform gamepad API: one locally attached pad
pub trait LocalPadSource: Send {
    /// Slot in the local range this source occupies
    fn slot(&self) -> usize;

    /// Current state, or `None` while the device is unplugged
    fn poll(&mut self, now: Instant) -> Option<InputFrame>;
}

/// Drain pending terminal events and return the pressed keys
pub fn read_key_presses() -> io::Result<Vec<KeyCode>> {
    let mut keys = Vec::new();

    while event::poll(Duration::from_millis(0))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                keys.push(key.code);
            }
        }
    }

    Ok(keys)
}

/// WASD -> left stick, arrows -> right stick, Space -> A, Enter -> Start
#[derive(Debug)]
pub struct KeyboardPad {
    slot: usize,
    hold: Duration,
    last_press: HashMap<KeyCode, Instant>,
}

impl KeyboardPad {
    pub fn new(slot: usize, hold: Duration) -> Self {
        Self {
            slot,
            hold,
            last_press: HashMap::new(),
        }
    }

    /// Record a press. Returns false for keys the pad doesn't use.
    pub fn press(&mut self, code: KeyCode, now: Instant) -> bool {
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        if !Self::is_mapped(code) {
            return false;
        }
        self.last_press.insert(code, now);
        true
    }

    fn is_mapped(code: KeyCode) -> bool {
        matches!(
            code,
            KeyCode::Char('w' | 'a' | 's' | 'd' | ' ')
                | KeyCode::Up
                | KeyCode::Down
                | KeyCode::Left
                | KeyCode::Right
                | KeyCode::Enter
        )
    }

    fn held(&self, code: KeyCode, now: Instant) -> bool {
        self.last_press
            .get(&code)
            .is_some_and(|&at| now.saturating_duration_since(at) < self.hold)
    }

    fn axis(&self, negative: KeyCode, positive: KeyCode, now: Instant) -> f64 {
        let mut value = 0.0;
        if self.held(negative, now) {
            value -= 1.0;
        }
        if self.held(positive, now) {
            value += 1.0;
        }
        value
    }

    pub fn frame(&self, now: Instant) -> InputFrame {
        let mut frame = InputFrame::neutral();
        frame.axes[AXIS_LX] = self.axis(KeyCode::Char('a'), KeyCode::Char('d'), now);
        frame.axes[AXIS_LY] = self.axis(KeyCode::Char('w'), KeyCode::Char('s'), now);
        frame.axes[AXIS_RX] = self.axis(KeyCode::Left, KeyCode::Right, now);
        frame.axes[AXIS_RY] = self.axis(KeyCode::Up, KeyCode::Down, now);
        frame.buttons[BUTTON_A] = self.held(KeyCode::Char(' '), now);
        frame.buttons[BUTTON_START] = self.held(KeyCode::Enter, now);
        frame
    }
}

impl LocalPadSource for KeyboardPad {
    fn slot(&self) -> usize {
        self.slot
    }

    fn poll(&mut self, now: Instant) -> Option<InputFrame> {
        // Forget stale presses so the map stays small
        let hold = self.hold;
        self.last_press
            .retain(|_, at| now.saturating_duration_since(*at) < hold);
        Some(self.frame(now))
    }
}
