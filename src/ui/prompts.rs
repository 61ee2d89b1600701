//! Confirmation prompt

use super::context::UiContext;
use crate::error::{ProvisionError, ProvisionResult};
use std::io::{self, BufRead, Write};

/// Ask for a yes/no answer.
///
/// `--yes` answers for the user. Without it the answer must come from a
/// terminal on stdin; an unattended run cannot silently assume consent.
/// When stdout is not a terminal (e.g. piped to `tee`) a plain `[y/N]`
/// line is read instead of the cliclack widget.
pub async fn confirm(ctx: &UiContext, message: &str) -> ProvisionResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Err(ProvisionError::ConfirmationUnavailable);
    }

    let fancy = ctx.use_fancy_output();
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        if fancy {
            cliclack::confirm(&message).initial_value(false).interact()
        } else {
            confirm_inline(&message, io::stdin().lock(), io::stdout())
        }
    })
    .await
    .map_err(|e| ProvisionError::Internal(format!("prompt task failed: {}", e)))?;

    // Ctrl-C at the prompt surfaces as an interrupted read; treat it as "no"
    match result {
        Ok(answer) => Ok(answer),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(ProvisionError::io("reading confirmation", e)),
    }
}

/// Plain `[y/N]` prompt; anything but `y`/`yes` is a no, as is end of input
fn confirm_inline(
    prompt: &str,
    mut input: impl BufRead,
    mut output: impl Write,
) -> io::Result<bool> {
    write!(output, "  {} [y/N] ", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
