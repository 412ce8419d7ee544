// Virtual pad: one polling view over any input source

use crate::network::protocol::{InputFrame, AXIS_COUNT, BUTTON_COUNT};

// Standard gamepad button layout
pub const BUTTON_A: usize = 0;
pub const BUTTON_B: usize = 1;
pub const BUTTON_X: usize = 2;
pub const BUTTON_Y: usize = 3;
pub const BUTTON_LB: usize = 4;
pub const BUTTON_RB: usize = 5;
pub const BUTTON_LT: usize = 6;
pub const BUTTON_RT: usize = 7;
pub const BUTTON_SELECT: usize = 8;
pub const BUTTON_START: usize = 9;
pub const BUTTON_DPAD_UP: usize = 12;
pub const BUTTON_DPAD_DOWN: usize = 13;
pub const BUTTON_DPAD_LEFT: usize = 14;
pub const BUTTON_DPAD_RIGHT: usize = 15;

// Axis layout: left stick x/y, right stick x/y
pub const AXIS_LX: usize = 0;
pub const AXIS_LY: usize = 1;
pub const AXIS_RX: usize = 2;
pub const AXIS_RY: usize = 3;

/// Button state with an analog mirror (0.0 or 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PadButton {
    pub pressed: bool,
    pub value: f64,
}

impl PadButton {
    fn from_pressed(pressed: bool) -> Self {
        Self {
            pressed,
            value: if pressed { 1.0 } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualPad {
    /// Local hardware uses small slots; relay sessions sit at offset + id
    pub index: usize,
    pub connected: bool,
    pub axes: [f64; AXIS_COUNT],
    pub buttons: [PadButton; BUTTON_COUNT],
}

impl VirtualPad {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            connected: true,
            axes: [0.0; AXIS_COUNT],
            buttons: [PadButton::default(); BUTTON_COUNT],
        }
    }

    /// Overwrite axes and buttons from a received frame
    pub fn apply(&mut self, frame: &InputFrame) {
        self.axes = frame.axes;
        for (button, &pressed) in self.buttons.iter_mut().zip(frame.buttons.iter()) {
            *button = PadButton::from_pressed(pressed);
        }
    }

    pub fn is_pressed(&self, button: usize) -> bool {
        self.buttons.get(button).is_some_and(|b| b.pressed)
    }

    pub fn axis(&self, axis: usize) -> f64 {
        self.axes.get(axis).copied().unwrap_or(0.0)
    }

    /// Indices of every pressed button
    pub fn pressed_buttons(&self) -> Vec<usize> {
        self.buttons
            .iter()
            .enumerate()
            .filter(|(_, b)| b.pressed)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_mirrors_button_values() {
        let mut frame = InputFrame::neutral();
        frame.axes = [-1.0, 0.5, 0.0, 0.25];
        frame.buttons[BUTTON_A] = true;
        frame.buttons[BUTTON_START] = true;

        let mut pad = VirtualPad::new(100);
        pad.apply(&frame);

        assert_eq!(pad.axes, [-1.0, 0.5, 0.0, 0.25]);
        assert_eq!(pad.buttons[BUTTON_A], PadButton { pressed: true, value: 1.0 });
        assert_eq!(pad.buttons[BUTTON_B], PadButton { pressed: false, value: 0.0 });
        assert_eq!(pad.pressed_buttons(), vec![BUTTON_A, BUTTON_START]);
    }

    #[test]
    fn test_out_of_range_lookups_are_neutral() {
        let pad = VirtualPad::new(0);
        assert!(!pad.is_pressed(99));
        assert_eq!(pad.axis(7), 0.0);
    }
}
