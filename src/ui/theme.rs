//! Visual theme and styling.

use console::Style;

/// Styles for console output.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Completed steps (green).
    pub success: Style,
    /// Warnings and non-fatal problems (orange).
    pub warning: Style,
    /// Failures (red bold).
    pub error: Style,
    /// Secondary text.
    pub dim: Style,
    /// Step names and headings (bold).
    pub highlight: Style,
    /// Step counters such as `[3/9]`.
    pub step_number: Style,
    /// Commands suggested to the user (dim italic).
    pub command: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::new()
    }
}

impl Theme {
    /// Colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            step_number: Style::new().dim(),
            command: Style::new().dim().italic(),
        }
    }

    /// Theme without colors (for non-TTY or `NO_COLOR`).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            step_number: Style::new(),
            command: Style::new(),
        }
    }

    /// Colored when the terminal allows it.
    pub fn detect() -> Self {
        if should_use_colors() {
            Self::new()
        } else {
            Self::plain()
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("○ {}", msg)))
    }

    /// `[index/total] line` with a dim counter.
    pub fn format_counter(&self, index: usize, total: usize, line: &str) -> String {
        format!(
            "{} {}",
            self.step_number.apply_to(format!("[{}/{}]", index, total)),
            line
        )
    }

    pub fn format_command(&self, cmd: &str) -> String {
        format!("{}", self.command.apply_to(cmd))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    console::Term::stdout().is_term()
}
