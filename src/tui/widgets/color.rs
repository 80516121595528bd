use ratatui::style::Color;

use crate::config::Theme;
use crate::models::{Priority, Status};

/// Parse a color string into a ratatui Color.
/// Accepts named colors ("blue", "lightcyan", "grey"), hex (`#RRGGBB`, `#RGB`)
/// and `rgb(r, g, b)`. Unrecognized input falls back to white.
pub fn parse_color(color_str: &str) -> Color {
    let s = color_str.trim().to_lowercase();
    let named = match s.as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        "gray" | "grey" | "lightgray" | "lightgrey" => Some(Color::Gray),
        "darkgray" | "darkgrey" => Some(Color::DarkGray),
        "lightred" => Some(Color::LightRed),
        "lightgreen" => Some(Color::LightGreen),
        "lightyellow" => Some(Color::LightYellow),
        "lightblue" => Some(Color::LightBlue),
        "lightmagenta" => Some(Color::LightMagenta),
        "lightcyan" => Some(Color::LightCyan),
        _ => None,
    };
    named
        .or_else(|| s.strip_prefix('#').and_then(parse_hex))
        .or_else(|| parse_rgb(&s))
        .unwrap_or(Color::White)
}

fn parse_hex(hex: &str) -> Option<Color> {
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => {
            // #abc expands to #aabbcc
            let expand = |v: u8| (v << 4) | v;
            Some(Color::Rgb(
                expand(channel(0..1)?),
                expand(channel(1..2)?),
                expand(channel(2..3)?),
            ))
        }
        _ => None,
    }
}

fn parse_rgb(s: &str) -> Option<Color> {
    let content = s.strip_prefix("rgb(")?.strip_suffix(')')?;
    let parts: Vec<u8> = content
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some(Color::Rgb(*r, *g, *b)),
        _ => None,
    }
}

/// Format a Color back to the config spelling
pub fn format_color_for_display(color: &Color) -> String {
    match color {
        Color::Black => "black".to_string(),
        Color::Red => "red".to_string(),
        Color::Green => "green".to_string(),
        Color::Yellow => "yellow".to_string(),
        Color::Blue => "blue".to_string(),
        Color::Magenta => "magenta".to_string(),
        Color::Cyan => "cyan".to_string(),
        Color::White => "white".to_string(),
        Color::Gray => "gray".to_string(),
        Color::DarkGray => "darkgray".to_string(),
        Color::LightRed => "lightred".to_string(),
        Color::LightGreen => "lightgreen".to_string(),
        Color::LightYellow => "lightyellow".to_string(),
        Color::LightBlue => "lightblue".to_string(),
        Color::LightMagenta => "lightmagenta".to_string(),
        Color::LightCyan => "lightcyan".to_string(),
        Color::Rgb(r, g, b) => format!("#{:02x}{:02x}{:02x}", r, g, b),
        _ => "white".to_string(),
    }
}

/// Relative luminance in 0.0..=1.0 (sRGB weights, no gamma)
fn luminance(color: Color) -> f64 {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::White => (255, 255, 255),
        Color::Gray => (192, 192, 192),
        Color::DarkGray => (128, 128, 128),
        Color::Red => (205, 0, 0),
        Color::Green => (0, 205, 0),
        Color::Yellow => (205, 205, 0),
        Color::Blue => (0, 0, 238),
        Color::Magenta => (205, 0, 205),
        Color::Cyan => (0, 205, 205),
        Color::LightRed => (255, 85, 85),
        Color::LightGreen => (85, 255, 85),
        Color::LightYellow => (255, 255, 85),
        Color::LightBlue => (85, 85, 255),
        Color::LightMagenta => (255, 85, 255),
        Color::LightCyan => (85, 255, 255),
        _ => (255, 255, 255),
    };
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0
}

pub fn is_dark_color(color: Color) -> bool {
    luminance(color) < 0.5
}

/// Black or white, whichever reads better on `background`
pub fn get_contrast_text_color(background: Color) -> Color {
    if is_dark_color(background) {
        Color::White
    } else {
        Color::Black
    }
}

/// Whether the theme is a dark one, judged by its background
pub fn is_dark_theme(theme: &Theme) -> bool {
    is_dark_color(parse_color(&theme.bg))
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Urgent => Color::LightRed,
        Priority::High => Color::Yellow,
        Priority::Medium => Color::LightBlue,
        Priority::Low => Color::Gray,
    }
}

/// Glyph standing in for the priority icon
pub fn priority_symbol(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "⚠",
        Priority::High => "↑",
        Priority::Medium => "−",
        Priority::Low => "↓",
    }
}

pub fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => Color::Yellow,
        Status::InProgress => Color::Cyan,
        Status::Completed => Color::Green,
    }
}
