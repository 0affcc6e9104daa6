//! Terminal styles, by meaning rather than by color.
//!
//! `console` drops the escape codes when stdout is not a terminal, so piped
//! output and tests see plain text.

use console::Style;

pub fn title() -> Style {
    Style::new().bold()
}

pub fn muted() -> Style {
    Style::new().dim()
}

pub fn code() -> Style {
    Style::new().cyan()
}

pub fn amount() -> Style {
    Style::new().bold()
}

pub fn positive() -> Style {
    Style::new().green()
}

pub fn negative() -> Style {
    Style::new().red()
}

pub fn warning() -> Style {
    Style::new().yellow().bold()
}
