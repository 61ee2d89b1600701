//! Privilege check, identity resolution and the confirmation gate

use crate::error::{ProvisionError, ProvisionResult};
use crate::identity;
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;

pub struct Preflight;

#[async_trait]
impl Stage for Preflight {
    fn name(&self) -> &'static str {
        "preflight"
    }

    fn title(&self) -> &'static str {
        "Preflight"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let euid = ctx.host.effective_uid();
        if euid != 0 {
            return Err(ProvisionError::NotRoot(euid));
        }

        let identity = identity::resolve(ctx.host, ctx.config.user.as_deref()).await?;
        ui::step_ok_detail(ctx.ui, "Target user", &identity.name);

        let config = ctx.config;
        ui::key_value(ctx.ui, "Home", &identity.home.display().to_string());
        ui::key_value(ctx.ui, "Swap file", &config.swap_file.display().to_string());
        ui::key_value(ctx.ui, "Swap size", &config.swap_size.to_string());
        ui::key_value(ctx.ui, "Swap if RAM below", &format!("{} MiB", config.min_ram_mb));
        ui::key_value(ctx.ui, "OCaml switch", &config.toolchain.switch_name);
        ui::key_value(ctx.ui, "Unison source", &config.source.repository);
        ui::key_value(
            ctx.ui,
            "Install to",
            &config.unison_binary().display().to_string(),
        );

        if !ui::confirm(ctx.ui, "Provision this host with the settings above?").await? {
            return Err(ProvisionError::Aborted);
        }

        state.identity = Some(identity);
        Ok(Outcome::AlreadySatisfied)
    }
}
