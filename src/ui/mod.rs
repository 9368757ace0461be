//! Terminal rendering for the chat session.

mod terminal;

pub use terminal::{Terminal, Typing};

use crossterm::style::Color;
use std::time::Duration;

/// Color for a theme name; unknown names get magenta.
pub fn theme_color(theme: &str) -> Color {
    match theme.trim().to_lowercase().as_str() {
        "cyan" => Color::Cyan,
        "blue" => Color::Blue,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "red" => Color::Red,
        "white" => Color::White,
        _ => Color::Magenta,
    }
}

/// Read a numbered menu answer. `Some(None)` is the 0 (cancel) entry,
/// `Some(Some(i))` the zero-based item, `None` anything out of range.
pub fn parse_menu_choice(input: &str, len: usize) -> Option<Option<usize>> {
    match input.trim().parse::<usize>() {
        Ok(0) => Some(None),
        Ok(n) if n <= len => Some(Some(n - 1)),
        _ => None,
    }
}

pub fn parse_confirmation(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "y" | "yes" | "예" | "네" | "응" | "ㅇ"
    )
}

/// `1h 02m 03s`, `4m 05s` or `7s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themes() {
        assert_eq!(theme_color("cyan"), Color::Cyan);
        assert_eq!(theme_color(" Green "), Color::Green);
        assert_eq!(theme_color("magenta"), Color::Magenta);
        assert_eq!(theme_color("plaid"), Color::Magenta);
    }

    #[test]
    fn menu_choices() {
        assert_eq!(parse_menu_choice("0", 4), Some(None));
        assert_eq!(parse_menu_choice("1", 4), Some(Some(0)));
        assert_eq!(parse_menu_choice(" 4 ", 4), Some(Some(3)));
        assert_eq!(parse_menu_choice("5", 4), None);
        assert_eq!(parse_menu_choice("two", 4), None);
    }

    #[test]
    fn confirmations() {
        assert!(parse_confirmation("y"));
        assert!(parse_confirmation("네"));
        assert!(!parse_confirmation("n"));
        assert!(!parse_confirmation(""));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(7)), "7s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
