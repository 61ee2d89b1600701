//! Spinner for quiet, captured work

use super::context::UiContext;
use console::style;

/// A spinner in interactive terminals, a single `...` line otherwise
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("  {} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("  {} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with warning message
    pub fn stop_warn(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("  {} {}", style("[WARN]").yellow(), message);
        }
    }
}

impl Drop for TaskSpinner {
    fn drop(&mut self) {
        // Leave no half-drawn spinner behind when a stage bails out early
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}
