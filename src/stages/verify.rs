//! Final gate: the installed binary must run for the target user

use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{shell_quote, with_identity, Invocation};
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;
use tracing::info;

pub struct Verifier;

#[async_trait]
impl Stage for Verifier {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn title(&self) -> &'static str {
        "Verify installation"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let identity = state.identity()?.clone();
        let install_dir = &ctx.config.source.install_dir;

        // The user's login PATH may not include the install dir yet
        let script = format!(
            "PATH={}:\"$PATH\" unison -version",
            shell_quote(&install_dir.display().to_string())
        );
        let out = with_identity(ctx.host, &identity)
            .run(Invocation::shell(script))
            .await?;

        if !out.success() {
            let reason = match out.stderr.trim() {
                "" => format!("exit code {}", out.code),
                stderr => stderr.to_string(),
            };
            return Err(ProvisionError::VerificationFailed {
                path: ctx.config.unison_binary(),
                user: identity.name,
                reason,
            });
        }

        let version = out.stdout.lines().next().unwrap_or_default().trim().to_string();
        info!("Unison runs for {}: {}", identity.name, version);
        ui::step_ok_detail(ctx.ui, "Unison runs", &version);
        state.unison_version = Some(version);

        Ok(Outcome::AlreadySatisfied)
    }
}
