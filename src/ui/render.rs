use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::overlay::{render_overlay, OverlayMessage};
use crate::client::SceneLayout;
use crate::network::protocol::SessionId;
use crate::pad::virtual_pad::{
    VirtualPad, AXIS_LX, AXIS_LY, AXIS_RX, AXIS_RY, BUTTON_A, BUTTON_B, BUTTON_DPAD_DOWN,
    BUTTON_DPAD_LEFT, BUTTON_DPAD_RIGHT, BUTTON_DPAD_UP, BUTTON_LB, BUTTON_LT, BUTTON_RB,
    BUTTON_RT, BUTTON_SELECT, BUTTON_START, BUTTON_X, BUTTON_Y,
};

// Layout: header (scene + link + join URL), pad list, one-line controls hint
const UI_HEADER_ROWS: u16 = 4;
const UI_FOOTER_ROWS: u16 = 1;
const AXIS_BAR_WIDTH: usize = 9;

/// Everything the monitor draws in one frame
pub struct MonitorView<'a> {
    pub scene: Option<&'a str>,
    pub link: &'a str,
    pub linked: bool,
    pub join_url: &'a str,
    pub pads: &'a [VirtualPad],
    /// Slots at or above this belong to relay sessions
    pub relay_slot_offset: usize,
    pub recent: &'a [String],
    pub toast: Option<&'a OverlayMessage>,
}

pub fn render(frame: &mut Frame, view: &MonitorView) {
    let area = frame.area();

    // Draw background (true black RGB, not terminal default)
    let bg = Block::default().style(Style::default().bg(Color::Rgb(0, 0, 0)));
    frame.render_widget(bg, area);

    let [header, body, footer] = Layout::vertical([
        Constraint::Length(UI_HEADER_ROWS),
        Constraint::Min(1),
        Constraint::Length(UI_FOOTER_ROWS),
    ])
    .areas(area);

    draw_header(frame, view, header);
    draw_pads(frame, view, body);
    draw_controls(frame, footer);

    if let Some(toast) = view.toast {
        render_overlay(frame, toast, area);
    }
}

fn draw_header(frame: &mut Frame, view: &MonitorView, area: Rect) {
    let scene_text = match view.scene {
        Some(scene) => {
            let layout = SceneLayout::for_scene(scene);
            format!("{}  ({} layout)", scene, layout.mode)
        }
        None => "no scene announced".to_string(),
    };
    let link_color = if view.linked { Color::Green } else { Color::Yellow };

    let lines = vec![
        Line::from(vec![
            Span::styled("Scene: ", Style::default().fg(Color::DarkGray)),
            Span::styled(scene_text, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Relay: ", Style::default().fg(Color::DarkGray)),
            Span::styled(view.link.to_string(), Style::default().fg(link_color)),
        ]),
        Line::from(vec![
            Span::styled("Join:  ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                view.join_url.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    let header = Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn draw_pads(frame: &mut Frame, view: &MonitorView, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    if view.pads.is_empty() {
        lines.push(Line::from(Span::styled(
            "Waiting for controllers...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for pad in view.pads {
        let (name, color) = pad_identity(pad, view.relay_slot_offset);
        let pressed: Vec<&str> = pad
            .pressed_buttons()
            .into_iter()
            .map(button_label)
            .collect();

        lines.push(Line::from(vec![
            Span::styled(format!("● {:<10}", name), Style::default().fg(color)),
            Span::raw(format!(
                " L [{}|{}]  R [{}|{}]  ",
                axis_bar(pad.axis(AXIS_LX), AXIS_BAR_WIDTH),
                axis_bar(pad.axis(AXIS_LY), AXIS_BAR_WIDTH),
                axis_bar(pad.axis(AXIS_RX), AXIS_BAR_WIDTH),
                axis_bar(pad.axis(AXIS_RY), AXIS_BAR_WIDTH),
            )),
            Span::styled(pressed.join(" "), Style::default().fg(Color::Yellow)),
        ]));
    }

    if !view.recent.is_empty() {
        lines.push(Line::raw(""));
        for entry in view.recent {
            lines.push(Line::from(Span::styled(
                entry.clone(),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let title = format!(" Pads ({}) ", view.pads.len());
    let body = Paragraph::new(lines).block(Block::default().title(title));
    frame.render_widget(body, area);
}

fn draw_controls(frame: &mut Frame, area: Rect) {
    let controls = Paragraph::new("N: Next scene  C: Copy join URL  WASD/↑↓←→/Space/Enter: Keyboard pad  Q: Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);

    frame.render_widget(controls, area);
}

/// Label and colour for a pad: relay sessions use their player colour
pub fn pad_identity(pad: &VirtualPad, relay_slot_offset: usize) -> (String, Color) {
    match pad.index.checked_sub(relay_slot_offset) {
        Some(id) => {
            let id = SessionId(id as u32);
            let (r, g, b) = id.color();
            (format!("Player {}", id), Color::Rgb(r, g, b))
        }
        None => (format!("Local {}", pad.index), Color::White),
    }
}

/// Horizontal bar with a centre mark, filled towards the value's side
pub fn axis_bar(value: f64, width: usize) -> String {
    let width = width.max(3) | 1;
    let centre = width / 2;
    let value = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
    let reach = (value.abs() * centre as f64).round() as usize;

    (0..width)
        .map(|i| {
            let filled = if value < 0.0 {
                i < centre && i >= centre - reach
            } else {
                i > centre && i <= centre + reach
            };
            if i == centre {
                '|'
            } else if filled {
                '='
            } else {
                '·'
            }
        })
        .collect()
}

pub fn button_label(index: usize) -> &'static str {
    match index {
        BUTTON_A => "A",
        BUTTON_B => "B",
        BUTTON_X => "X",
        BUTTON_Y => "Y",
        BUTTON_LB => "LB",
        BUTTON_RB => "RB",
        BUTTON_LT => "LT",
        BUTTON_RT => "RT",
        BUTTON_SELECT => "SELECT",
        BUTTON_START => "START",
        10 => "L3",
        11 => "R3",
        BUTTON_DPAD_UP => "↑",
        BUTTON_DPAD_DOWN => "↓",
        BUTTON_DPAD_LEFT => "←",
        BUTTON_DPAD_RIGHT => "→",
        16 => "HOME",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_bar_directions() {
        assert_eq!(axis_bar(0.0, 5), "··|··");
        assert_eq!(axis_bar(-1.0, 5), "==|··");
        assert_eq!(axis_bar(1.0, 5), "··|==");
        assert_eq!(axis_bar(0.5, 5), "··|=·");
        assert_eq!(axis_bar(f64::NAN, 5), "··|··");
    }

    #[test]
    fn test_axis_bar_width_is_odd() {
        assert_eq!(axis_bar(0.0, 4).chars().count(), 5);
    }

    #[test]
    fn test_pad_identity() {
        let (name, color) = pad_identity(&VirtualPad::new(102), 100);
        assert_eq!(name, "Player 2");
        assert_eq!(color, Color::Rgb(0x00, 0xff, 0x88));

        let (name, color) = pad_identity(&VirtualPad::new(0), 100);
        assert_eq!(name, "Local 0");
        assert_eq!(color, Color::White);
    }

    #[test]
    fn test_button_labels() {
        assert_eq!(button_label(BUTTON_START), "START");
        assert_eq!(button_label(BUTTON_DPAD_LEFT), "←");
        assert_eq!(button_label(99), "?");
    }
}
