use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Paragraph, Wrap};

use crate::config::Theme;
use crate::controller::{Notice, NoticeKind};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

const SEPARATOR: &str = " • ";
const ELLIPSIS: &str = "...";

/// Join as many hints as fit in `max_width`, marking the cut with "..."
pub fn fit_key_hints(key_hints: &[String], max_width: usize) -> String {
    let separator_len = SEPARATOR.chars().count();
    let ellipsis_len = ELLIPSIS.chars().count();
    let mut hints_text = String::new();

    for (i, hint) in key_hints.iter().enumerate() {
        let hint_len = hint.chars().count();
        let current_len = hints_text.chars().count();
        let would_be_len = if i == 0 { hint_len } else { current_len + separator_len + hint_len };

        if would_be_len > max_width {
            if i == 0 {
                hints_text = hint.chars().take(max_width.saturating_sub(ellipsis_len)).collect();
            } else if current_len + ellipsis_len > max_width {
                hints_text = hints_text.chars().take(max_width.saturating_sub(ellipsis_len)).collect();
            }
            hints_text.push_str(ELLIPSIS);
            break;
        }

        if i > 0 {
            hints_text.push_str(SEPARATOR);
        }
        hints_text.push_str(hint);
    }
    hints_text
}

pub fn render_status_bar(
    f: &mut Frame,
    area: Rect,
    message: Option<&Notice>,
    key_hints: &[String],
    theme: &Theme,
) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let max_width = area.width as usize;

    let (content, style) = match message {
        Some(notice) => {
            let bg = match notice.kind {
                NoticeKind::Success => Color::Green,
                NoticeKind::Error => Color::Red,
                NoticeKind::Info => parse_color(&theme.highlight_bg),
            };
            let mut content = notice.message.clone();
            if content.chars().count() > max_width {
                content = content.chars().take(max_width.saturating_sub(3)).collect::<String>() + ELLIPSIS;
            }
            let style = Style::default()
                .fg(get_contrast_text_color(bg))
                .bg(bg)
                .add_modifier(Modifier::BOLD);
            (content, style)
        }
        None => (fit_key_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    let paragraph = Paragraph::new(content).style(style).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> Vec<String> {
        vec!["q: Quit".to_string(), "n: New".to_string(), "e: Edit".to_string()]
    }

    #[test]
    fn hints_fit_when_wide() {
        assert_eq!(fit_key_hints(&hints(), 80), "q: Quit • n: New • e: Edit");
    }

    #[test]
    fn hints_truncate_with_ellipsis() {
        assert_eq!(fit_key_hints(&hints(), 19), "q: Quit • n: New...");
        assert_eq!(fit_key_hints(&hints(), 18), "q: Quit • n: Ne...");
        assert_eq!(fit_key_hints(&hints(), 5), "q:...");
    }
}
