//! Terminal output for the provisioning run
//!
//! Uses `cliclack` for interactive terminals with automatic fallback to plain
//! `[OK]`/`[WARN]` lines when output is piped or running under CI.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, remark, section, step_info, step_ok,
    step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, BootstrapTheme};
