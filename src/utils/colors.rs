//! ANSI colour helpers for terminal output.

use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Black,
    Red,
    Green,
    Brown,
    Blue,
    Purple,
    Cyan,
    LightGray,
    DarkGray,
    LightRed,
    LightGreen,
    Yellow,
    LightBlue,
    LightPurple,
    LightCyan,
    White,
    Bold,
    Faint,
    Italic,
    Underline,
    Blink,
    Negative,
    Crossed,
}

/// Wraps `text` in the given tone. Honours `NO_COLOR` and non-tty output via `colored`.
pub fn paint(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Black => text.black(),
        Tone::Red => text.red(),
        Tone::Green => text.green(),
        Tone::Brown => text.yellow(),
        Tone::Blue => text.blue(),
        Tone::Purple => text.purple(),
        Tone::Cyan => text.cyan(),
        Tone::LightGray => text.white(),
        Tone::DarkGray => text.black().bold(),
        Tone::LightRed => text.red().bold(),
        Tone::LightGreen => text.green().bold(),
        Tone::Yellow => text.yellow().bold(),
        Tone::LightBlue => text.blue().bold(),
        Tone::LightPurple => text.purple().bold(),
        Tone::LightCyan => text.cyan().bold(),
        Tone::White => text.white().bold(),
        Tone::Bold => text.bold(),
        Tone::Faint => text.dimmed(),
        Tone::Italic => text.italic(),
        Tone::Underline => text.underline(),
        Tone::Blink => text.blink(),
        Tone::Negative => text.reversed(),
        Tone::Crossed => text.strikethrough(),
    }
}
