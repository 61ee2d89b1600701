//! Interactive vs unattended detection

use std::io::IsTerminal;

/// Environment variables set by CI runners and image builders
const CI_MARKERS: &[&str] = &["CI", "GITHUB_ACTIONS", "GITLAB_CI", "JENKINS_URL", "BUILDKITE"];

/// Decides how output is rendered and whether prompts may be shown
#[derive(Debug, Clone)]
pub struct UiContext {
    /// stdin is a terminal, so a human can answer a prompt
    interactive: bool,
    /// stdin and stdout are terminals and no CI marker is set
    fancy: bool,
    /// `--yes` was passed
    auto_yes: bool,
}

impl UiContext {
    /// Inspect the current terminal and environment
    pub fn detect() -> Self {
        let ci = CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some());
        Self::from_terminals(
            std::io::stdin().is_terminal(),
            std::io::stdout().is_terminal(),
            ci,
        )
    }

    /// Context for the given terminal state
    pub fn from_terminals(stdin_tty: bool, stdout_tty: bool, ci: bool) -> Self {
        Self {
            interactive: stdin_tty,
            fancy: stdin_tty && stdout_tty && !ci,
            auto_yes: false,
        }
    }

    /// Plain output, no prompts
    pub fn non_interactive() -> Self {
        Self::from_terminals(false, false, false)
    }

    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Whether a human can answer a prompt
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Spinners and cliclack formatting
    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}
