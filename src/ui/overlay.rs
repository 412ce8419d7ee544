// Short-lived centred notices ("join URL copied", clipboard errors)

use ratatui::{
    layout::{Alignment, Margin, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Clear, Paragraph},
    Frame,
};
use std::time::{Duration, Instant};

/// Predefined styles for overlay messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayStyle {
    Info,
    Error,
    Success,
}

/// A message shown in the centre of the screen until it expires
#[derive(Debug, Clone)]
pub struct OverlayMessage {
    pub lines: Vec<String>,
    pub title: Option<String>,
    pub style: OverlayStyle,
    expires_at: Instant,
}

impl OverlayMessage {
    pub fn new(lines: Vec<String>, style: OverlayStyle, shown_for: Duration) -> Self {
        Self {
            lines,
            title: None,
            style,
            expires_at: Instant::now() + shown_for,
        }
    }

    pub fn success(lines: Vec<String>, shown_for: Duration) -> Self {
        Self::new(lines, OverlayStyle::Success, shown_for)
    }

    pub fn error(lines: Vec<String>, shown_for: Duration) -> Self {
        Self::new(lines, OverlayStyle::Error, shown_for)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn border_color(&self) -> Color {
        match self.style {
            OverlayStyle::Info => Color::Cyan,
            OverlayStyle::Error => Color::Red,
            OverlayStyle::Success => Color::Green,
        }
    }

    fn text_color(&self) -> Color {
        match self.style {
            OverlayStyle::Info => Color::White,
            OverlayStyle::Error => Color::LightRed,
            OverlayStyle::Success => Color::LightGreen,
        }
    }
}

/// Box of `width` x `height` centred in `area`, kept two cells off each edge
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

pub fn render_overlay(frame: &mut Frame, message: &OverlayMessage, area: Rect) {
    let widest = message
        .lines
        .iter()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let toast_area = centered(area, widest + 6, message.lines.len() as u16 + 4);

    let mut block = Block::bordered()
        .border_style(Style::default().fg(message.border_color()))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));
    if let Some(title) = &message.title {
        block = block.title(format!(" {} ", title));
    }

    let text_style = Style::default().fg(message.text_color());
    let body: Vec<Line> = message
        .lines
        .iter()
        .map(|line| Line::styled(line.as_str(), text_style))
        .collect();

    frame.render_widget(Clear, toast_area);
    frame.render_widget(block, toast_area);
    frame.render_widget(
        Paragraph::new(body).alignment(Alignment::Center),
        toast_area.inner(Margin::new(2, 1)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_fits_inside_area() {
        let area = Rect::new(0, 0, 40, 12);
        assert_eq!(centered(area, 10, 4), Rect::new(15, 4, 10, 4));
        assert_eq!(centered(area, 100, 100), Rect::new(2, 2, 36, 8));
    }

    #[test]
    fn test_overlay_expiry() {
        let toast = OverlayMessage::success(vec!["Copied".into()], Duration::from_millis(50));
        let now = Instant::now();
        assert!(!toast.is_expired(now));
        assert!(toast.is_expired(now + Duration::from_millis(60)));
    }
}
