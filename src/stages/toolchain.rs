//! OPAM and the OCaml compiler switch
//!
//! Four gates, each skipped when its target already holds: opam on the
//! search path, an initialised per-user opam root, a compiler switch, and a
//! usable compiler inside that switch. The package index is refreshed on
//! every run.

use crate::error::{ProvisionError, ProvisionResult};
use crate::host::{shell_quote, with_identity, AsUser, Invocation};
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;
use std::cmp::Ordering;
use tracing::{debug, info};

const COMPILER_PACKAGE: &str = "ocaml-base-compiler";

pub struct ToolchainInstaller;

#[async_trait]
impl Stage for ToolchainInstaller {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    fn title(&self) -> &'static str {
        "OCaml toolchain"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let identity = state.identity()?.clone();
        let user = with_identity(ctx.host, &identity);

        let mut outcome = ensure_opam(ctx, &user).await?;

        if identity.opam_root().is_dir() {
            ui::step_ok_detail(
                ctx.ui,
                "opam initialised",
                &identity.opam_root().display().to_string(),
            );
        } else {
            ui::remark(ctx.ui, "Running: opam init");
            user.run_checked(
                Invocation::new("opam")
                    .args(["init", "-y", "--bare", "--no-setup", "--disable-sandboxing"])
                    .visible(),
            )
            .await?;
            ui::step_ok(ctx.ui, "opam initialised");
            outcome = Outcome::Created;
        }

        ui::remark(ctx.ui, "Running: opam update");
        user.run_checked(Invocation::new("opam").args(["update", "-y"]).visible())
            .await?;

        outcome = outcome.and(ensure_switch(ctx, &user).await?);

        let switch = &ctx.config.toolchain.switch_name;
        let version = match compiler_version(&user, switch).await? {
            Some(version) => version,
            None => {
                ui::step_warn(ctx.ui, "Compiler not found in switch, installing it");
                user.run_checked(
                    Invocation::new("opam")
                        .args(["install", "-y", "--switch", switch.as_str(), "ocaml", "ocamlfind"])
                        .visible(),
                )
                .await?;
                outcome = Outcome::Created;
                compiler_version(&user, switch)
                    .await?
                    .ok_or_else(|| ProvisionError::CompilerUnusable(switch.clone()))?
            }
        };

        ui::step_ok_detail(ctx.ui, "OCaml compiler ready", &version);
        state.compiler_version = Some(version);
        Ok(outcome)
    }
}

/// Bootstrap opam with the upstream installer if it is not on the search path
async fn ensure_opam(ctx: &StageContext<'_>, user: &AsUser<'_>) -> ProvisionResult<Outcome> {
    if ctx.host.command_exists("opam").await {
        ui::step_ok(ctx.ui, "opam installed");
        return Ok(Outcome::AlreadySatisfied);
    }

    let url = &ctx.config.toolchain.installer_url;
    info!("Bootstrapping opam from {}", url);
    ui::remark(ctx.ui, &format!("Running opam installer from {}", url));

    // The installer asks where to put the binary; `yes ''` takes every default
    let script = format!("yes '' | sh -c \"$(curl -fsSL {})\"", shell_quote(url));
    user.run_checked(Invocation::shell(script).visible()).await?;

    if !ctx.host.command_exists("opam").await {
        return Err(ProvisionError::ToolchainMissing);
    }
    ui::step_ok(ctx.ui, "opam installed");
    Ok(Outcome::Created)
}

/// Select the configured switch, creating it with the best available compiler
async fn ensure_switch(ctx: &StageContext<'_>, user: &AsUser<'_>) -> ProvisionResult<Outcome> {
    let toolchain = &ctx.config.toolchain;
    let switch = toolchain.switch_name.as_str();

    let listing = user
        .run_checked(Invocation::new("opam").args(["switch", "list", "--short"]))
        .await?;
    if listing.stdout.lines().any(|line| line.trim() == switch) {
        user.run_checked(Invocation::new("opam").args(["switch", "set", switch]))
            .await?;
        ui::step_ok_detail(ctx.ui, "Using existing switch", switch);
        return Ok(Outcome::AlreadySatisfied);
    }

    let available = user
        .run_checked(Invocation::new("opam").args([
            "switch",
            "list-available",
            "--short",
            COMPILER_PACKAGE,
        ]))
        .await?;
    let versions = parse_available_versions(&available.stdout);
    debug!("{} compiler versions available", versions.len());

    let version = select_compiler(&versions, &toolchain.preferred_versions)
        .ok_or(ProvisionError::NoCompilerAvailable)?;
    if !toolchain.preferred_versions.contains(&version) {
        ui::step_warn(
            ctx.ui,
            &format!("No preferred compiler available, falling back to {}", version),
        );
    }

    let package = format!("{}.{}", COMPILER_PACKAGE, version);
    ui::remark(ctx.ui, &format!("Running: opam switch create {} {}", switch, package));
    user.run_checked(
        Invocation::new("opam")
            .args(["switch", "create", switch, package.as_str(), "-y"])
            .visible(),
    )
    .await?;

    ui::step_ok_detail(ctx.ui, "Switch created", &format!("{} ({})", switch, version));
    Ok(Outcome::Created)
}

/// `ocamlc -version` inside the switch environment, `None` when it does not run
async fn compiler_version(user: &AsUser<'_>, switch: &str) -> ProvisionResult<Option<String>> {
    let script = format!("{} && ocamlc -version", opam_env(switch));
    let out = user.run(Invocation::shell(script)).await?;
    let version = out.stdout.trim();
    Ok((out.success() && !version.is_empty()).then(|| version.to_string()))
}

/// Shell prefix that loads the environment of `switch`
pub fn opam_env(switch: &str) -> String {
    format!(
        "eval \"$(opam env --switch={} --set-switch)\"",
        shell_quote(switch)
    )
}

/// Versions from `opam switch list-available` output.
///
/// Accepts `ocaml-base-compiler.5.1.1` and `ocaml-base-compiler 5.1.1 ...`
/// rows; comment lines and duplicates are dropped.
pub fn parse_available_versions(output: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let first = fields.next().unwrap_or_default();
        let version = match first.strip_prefix(COMPILER_PACKAGE) {
            Some(rest) if rest.starts_with('.') => &rest[1..],
            Some("") => fields.next().unwrap_or_default(),
            _ if first.starts_with(|c: char| c.is_ascii_digit()) => first,
            _ => continue,
        };

        if !version.is_empty() && !versions.iter().any(|v| v == version) {
            versions.push(version.to_string());
        }
    }
    versions
}

/// First preferred version that is available, else the highest available
pub fn select_compiler(available: &[String], preferred: &[String]) -> Option<String> {
    preferred
        .iter()
        .find(|want| available.contains(want))
        .or_else(|| available.iter().max_by(|a, b| compare_versions(a, b)))
        .cloned()
}

/// Natural version ordering: digit runs compare numerically, other runs
/// lexically, so `4.14.0 > 4.9.1` and `5.0.0 > 4.14.2`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (left, right) = (chunks(a), chunks(b));
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn chunks(version: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = version.as_bytes();
    for i in 1..=bytes.len() {
        if i == bytes.len() || bytes[i].is_ascii_digit() != bytes[start].is_ascii_digit() {
            out.push(&version[start..i]);
            start = i;
        }
    }
    out
}
