//! Clone, build and install Unison

use super::toolchain::opam_env;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{with_identity, Invocation};
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

pub struct SourceBuilder;

#[async_trait]
impl Stage for SourceBuilder {
    fn name(&self) -> &'static str {
        "unison"
    }

    fn title(&self) -> &'static str {
        "Build Unison"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let config = ctx.config;
        let binary = config.unison_binary();
        if binary.exists() {
            ui::step_ok_detail(ctx.ui, "Unison already installed", &binary.display().to_string());
            return Ok(Outcome::AlreadySatisfied);
        }

        let identity = state.identity()?.clone();

        // Owned by RunState so the tree is deleted however the run ends
        let build_dir = tempfile::Builder::new()
            .prefix("unison-build.")
            .tempdir_in(&config.paths.temp_root)
            .map_err(|e| ProvisionError::io("creating build directory", e))?;
        let root = build_dir.path().to_path_buf();
        state.build_dir = Some(build_dir);
        debug!("Building in {}", root.display());

        ctx.host
            .run_checked(
                &Invocation::new("chown")
                    .arg(identity.owner_spec())
                    .path_arg(&root),
            )
            .await?;

        let user = with_identity(ctx.host, &identity);
        let checkout = root.join("unison");

        let mut clone = Invocation::new("git").args(["clone", "--depth", "1"]);
        if let Some(branch) = &config.source.branch {
            clone = clone.args(["--branch", branch.as_str()]);
        }
        let clone = clone
            .arg(config.source.repository.as_str())
            .path_arg(&checkout)
            .visible();
        ui::remark(ctx.ui, &format!("Running: {}", clone.display()));
        user.run_checked(clone).await?;

        let build = format!("{} && make", opam_env(&config.toolchain.switch_name));
        ui::remark(ctx.ui, "Running: make");
        user.run_checked(Invocation::shell(build).current_dir(&checkout).visible())
            .await?;

        let built = checkout.join("src").join("unison");
        if !built.is_file() {
            return Err(ProvisionError::BuildOutputMissing(built));
        }

        let install_dir = &config.source.install_dir;
        install_file(&built, &binary, 0o755).await?;
        info!("Installed {}", binary.display());
        ui::step_ok_detail(ctx.ui, "Installed", &binary.display().to_string());

        let monitor = checkout.join("src").join("unison-fsmonitor");
        if monitor.is_file() {
            let target = install_dir.join("unison-fsmonitor");
            install_file(&monitor, &target, 0o755).await?;
            ui::step_ok_detail(ctx.ui, "Installed", &target.display().to_string());
        }

        let manual = checkout.join("man").join("unison.1");
        if manual.is_file() {
            let target = config.source.man_dir.join("unison.1");
            install_file(&manual, &target, 0o644).await?;
            ui::step_ok_detail(ctx.ui, "Installed", &target.display().to_string());
        } else {
            debug!("No man page produced");
        }

        Ok(Outcome::Created)
    }
}

/// Copy `from` to `to` and set its mode, creating the parent directory
async fn install_file(from: &Path, to: &Path, mode: u32) -> ProvisionResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ProvisionError::io(format!("creating {}", parent.display()), e))?;
    }

    fs::copy(from, to).await.map_err(|e| {
        ProvisionError::io(format!("copying {} to {}", from.display(), to.display()), e)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(to, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| ProvisionError::io(format!("setting mode of {}", to.display()), e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
