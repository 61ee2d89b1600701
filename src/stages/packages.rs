//! System packages: look up each tool, install what is missing in one batch

use crate::error::ProvisionResult;
use crate::host::{Host, Invocation};
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;
use tracing::{debug, info};

/// Command looked up on the search path -> Debian package providing it
pub const PACKAGE_MAP: &[(&str, &str)] = &[
    ("git", "git"),
    ("hg", "mercurial"),
    ("darcs", "darcs"),
    ("gcc", "build-essential"),
    ("make", "make"),
    ("m4", "m4"),
    ("patch", "patch"),
    ("rsync", "rsync"),
    ("curl", "curl"),
    ("unzip", "unzip"),
    ("bwrap", "bubblewrap"),
];

pub struct PackageInstaller;

#[async_trait]
impl Stage for PackageInstaller {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn title(&self) -> &'static str {
        "System packages"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        _state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let missing = missing_packages(ctx.host, PACKAGE_MAP).await;
        if missing.is_empty() {
            ui::step_ok_detail(
                ctx.ui,
                "All tools present",
                &format!("{} checked", PACKAGE_MAP.len()),
            );
            return Ok(Outcome::AlreadySatisfied);
        }

        info!("Installing missing packages: {}", missing.join(" "));

        let update = apt_get().arg("update");
        ui::remark(ctx.ui, &format!("Running: {}", update.display()));
        ctx.host.run_checked(&update).await?;

        let install = apt_get().args(["install", "-y"]).args(missing.iter().copied());
        ui::remark(ctx.ui, &format!("Running: {}", install.display()));
        ctx.host.run_checked(&install).await?;

        ui::step_ok_detail(ctx.ui, "Packages installed", &missing.join(", "));
        Ok(Outcome::Created)
    }
}

fn apt_get() -> Invocation {
    Invocation::new("apt-get")
        .env("DEBIAN_FRONTEND", "noninteractive")
        .visible()
}

/// Packages whose command is not on the search path, deduplicated, in map order
pub async fn missing_packages(
    host: &dyn Host,
    map: &[(&str, &'static str)],
) -> Vec<&'static str> {
    let mut missing: Vec<&'static str> = Vec::new();
    for &(tool, package) in map {
        if host.command_exists(tool).await {
            debug!("{} found", tool);
        } else if !missing.contains(&package) {
            debug!("{} missing, needs {}", tool, package);
            missing.push(package);
        }
    }
    missing
}
