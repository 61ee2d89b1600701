//! Swap file provisioning for low-memory boards
//!
//! Building OCaml and Unison on a 512 MiB board runs out of memory without
//! swap. The file is only created when total RAM is below the threshold and
//! the same file is not already active.

use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Invocation;
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub struct SwapProvisioner;

#[async_trait]
impl Stage for SwapProvisioner {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn title(&self) -> &'static str {
        "Memory and swap"
    }

    async fn ensure(
        &self,
        ctx: &StageContext<'_>,
        _state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let config = ctx.config;
        let swap_file = &config.swap_file;

        let total = total_memory_mib(&config.paths.meminfo).await?;
        if total >= config.min_ram_mb {
            ui::step_ok_detail(
                ctx.ui,
                "Enough memory, no swap needed",
                &format!("{} MiB >= {} MiB", total, config.min_ram_mb),
            );
            return Ok(Outcome::AlreadySatisfied);
        }

        if swap_active(&config.paths.proc_swaps, swap_file).await? {
            ui::step_ok_detail(ctx.ui, "Swap already active", &swap_file.display().to_string());
            return Ok(Outcome::AlreadySatisfied);
        }

        info!(
            "{} MiB RAM is below {} MiB, creating {} swap at {}",
            total,
            config.min_ram_mb,
            config.swap_size,
            swap_file.display()
        );
        ui::remark(
            ctx.ui,
            &format!("Creating {} swap file at {}", config.swap_size, swap_file.display()),
        );

        // A file left over from an interrupted run may be the wrong size or unformatted
        match fs::remove_file(swap_file).await {
            Ok(()) => debug!("Removed stale {}", swap_file.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ProvisionError::io(
                    format!("removing stale {}", swap_file.display()),
                    e,
                ))
            }
        }

        let fallocate = Invocation::new("fallocate")
            .args(["-l", config.swap_size.fallocate_arg().as_str()])
            .path_arg(swap_file);
        let fast = ctx.host.run(&fallocate).await?;
        if !fast.success() {
            warn!(
                "fallocate unsupported here ({}), filling with dd",
                fast.stderr.trim()
            );
            let dd = Invocation::new("dd")
                .args([
                    "if=/dev/zero".to_string(),
                    format!("of={}", swap_file.display()),
                    "bs=1M".to_string(),
                    format!("count={}", config.swap_size.mib()),
                ])
                .visible();
            ctx.host.run_checked(&dd).await?;
        }

        for program in ["chmod", "mkswap", "swapon"] {
            let mut step = Invocation::new(program);
            if program == "chmod" {
                step = step.arg("600");
            }
            ctx.host.run_checked(&step.path_arg(swap_file)).await?;
        }
        ui::step_ok_detail(ctx.ui, "Swap enabled", &config.swap_size.to_string());

        if append_fstab_entry(&config.paths.fstab, &config.fstab_entry()).await? {
            ui::step_ok(ctx.ui, "Swap persisted in fstab");
        } else {
            ui::step_ok(ctx.ui, "fstab entry already present");
        }

        Ok(Outcome::Created)
    }
}

/// Total physical memory in MiB, from `/proc/meminfo`
pub async fn total_memory_mib(meminfo: &Path) -> ProvisionResult<u64> {
    let content = fs::read_to_string(meminfo)
        .await
        .map_err(|e| ProvisionError::MemoryInfo {
            path: meminfo.to_path_buf(),
            reason: e.to_string(),
        })?;

    parse_mem_total_kib(&content)
        .map(|kib| kib / 1024)
        .ok_or_else(|| ProvisionError::MemoryInfo {
            path: meminfo.to_path_buf(),
            reason: "no MemTotal line".to_string(),
        })
}

/// `MemTotal:  949448 kB` -> `949448`
pub fn parse_mem_total_kib(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Whether `swap_file` is listed in `/proc/swaps`
pub async fn swap_active(proc_swaps: &Path, swap_file: &Path) -> ProvisionResult<bool> {
    let content = match fs::read_to_string(proc_swaps).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(ProvisionError::io(
                format!("reading {}", proc_swaps.display()),
                e,
            ))
        }
    };

    Ok(content
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| Path::new(name) == swap_file))
}

/// Append `entry` to fstab unless an identical line exists. Returns whether it was added.
pub async fn append_fstab_entry(fstab: &Path, entry: &str) -> ProvisionResult<bool> {
    let existing = match fs::read_to_string(fstab).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProvisionError::io(format!("reading {}", fstab.display()), e)),
    };

    if existing.lines().any(|line| line == entry) {
        return Ok(false);
    }

    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        line.push('\n');
    }
    line.push_str(entry);
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(fstab)
        .await
        .map_err(|e| ProvisionError::io(format!("opening {}", fstab.display()), e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| ProvisionError::io(format!("appending to {}", fstab.display()), e))?;
    file.flush()
        .await
        .map_err(|e| ProvisionError::io(format!("flushing {}", fstab.display()), e))?;

    Ok(true)
}
