use std::collections::HashMap;

use ratatui::style::Color;

use crate::model::{Priority, StatusCatalog};
use crate::session::Level;

/// Parsed color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub text: Color,
    pub text_bright: Color,
    pub highlight: Color,
    pub dim: Color,
    pub red: Color,
    pub yellow: Color,
    pub green: Color,
    pub cyan: Color,
    pub purple: Color,
    pub blue: Color,
    pub selection_bg: Color,
    pub selection_border: Color,
    /// Per-status colors, keyed by lowercase status key
    pub status_colors: HashMap<String, Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: Color::Rgb(0x0C, 0x00, 0x1B),
            text: Color::Rgb(0xB0, 0xAA, 0xFF),
            text_bright: Color::Rgb(0xFF, 0xFF, 0xFF),
            highlight: Color::Rgb(0xFB, 0x41, 0x96),
            dim: Color::Rgb(0x7D, 0x78, 0xBF),
            red: Color::Rgb(0xFF, 0x44, 0x44),
            yellow: Color::Rgb(0xFF, 0xD7, 0x00),
            green: Color::Rgb(0x44, 0xFF, 0x88),
            cyan: Color::Rgb(0x44, 0xDD, 0xFF),
            purple: Color::Rgb(0xCC, 0x66, 0xFF),
            blue: Color::Rgb(0x44, 0x88, 0xFF),
            selection_bg: Color::Rgb(0x3D, 0x14, 0x38),
            selection_border: Color::Rgb(0xFB, 0x41, 0x96),
            status_colors: HashMap::new(),
        }
    }
}

/// Parse a hex color string like "#FF4444" into an RGB Color
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

impl Theme {
    /// The default palette plus the colors of the project's statuses.
    /// Unparseable status colors fall back to the text color.
    pub fn from_statuses(statuses: &StatusCatalog) -> Self {
        let mut theme = Theme::default();
        for status in &statuses.statuses {
            match parse_hex_color(&status.color) {
                Some(color) => {
                    theme
                        .status_colors
                        .insert(status.key.to_lowercase(), color);
                }
                None => tracing::debug!(status = %status.key, color = %status.color, "ignoring status color"),
            }
        }
        theme
    }

    pub fn status_color(&self, key: &str) -> Color {
        self.status_colors
            .get(&key.to_lowercase())
            .copied()
            .unwrap_or(self.text)
    }

    pub fn priority_color(&self, priority: Priority) -> Color {
        match priority {
            Priority::Low => self.dim,
            Priority::Medium => self.yellow,
            Priority::High => self.red,
        }
    }

    pub fn notice_color(&self, level: Level) -> Color {
        match level {
            Level::Info => self.cyan,
            Level::Warning => self.yellow,
            Level::Error => self.red,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            parse_hex_color("#FF4444"),
            Some(Color::Rgb(0xFF, 0x44, 0x44))
        );
        assert_eq!(parse_hex_color("FF4444"), None); // missing #
        assert_eq!(parse_hex_color("#FF44"), None); // too short
        assert_eq!(parse_hex_color("#ZZZZZZ"), None); // invalid hex
    }

    #[test]
    fn status_colors_from_catalog() {
        let theme = Theme::from_statuses(&StatusCatalog::default());
        assert_eq!(theme.status_color("completed"), Color::Rgb(0x44, 0xFF, 0x88));
        assert_eq!(theme.status_color("IN_PROGRESS"), Color::Rgb(0x44, 0xDD, 0xFF));
        // Unknown status falls back to text color
        assert_eq!(theme.status_color("archived"), theme.text);
    }

    #[test]
    fn priority_and_notice_colors() {
        let theme = Theme::default();
        assert_eq!(theme.priority_color(Priority::High), theme.red);
        assert_eq!(theme.priority_color(Priority::Low), theme.dim);
        assert_eq!(theme.notice_color(Level::Error), theme.red);
        assert_eq!(theme.notice_color(Level::Warning), theme.yellow);
    }
}
