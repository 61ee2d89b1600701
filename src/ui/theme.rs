//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Green-on-default theme used for every prompt and log line
#[derive(Debug, Clone, Default)]
pub struct BootstrapTheme;

impl cliclack::Theme for BootstrapTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().green(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().green(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green().bold(),
        }
    }
}

/// Install the theme globally
pub fn init_theme() {
    cliclack::set_theme(BootstrapTheme);
}
