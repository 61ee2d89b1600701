//! Effective, validated settings for one provisioning run

use super::schema::{Config, NetworkConfig, SourceConfig, ToolchainConfig};
use super::size::SwapSize;
use crate::error::ProvisionResult;
use std::path::PathBuf;

/// Values taken from flags and environment that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub assume_yes: bool,
    pub swap_size: Option<String>,
    pub min_ram_mb: Option<u64>,
    pub user: Option<String>,
}

/// Kernel and system files the provisioner reads or appends to
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub meminfo: PathBuf,
    pub proc_swaps: PathBuf,
    pub fstab: PathBuf,
    pub temp_root: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            meminfo: PathBuf::from("/proc/meminfo"),
            proc_swaps: PathBuf::from("/proc/swaps"),
            fstab: PathBuf::from("/etc/fstab"),
            temp_root: std::env::temp_dir(),
        }
    }
}

/// Immutable run configuration, passed by reference to every stage
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub assume_yes: bool,
    pub swap_size: SwapSize,
    pub min_ram_mb: u64,
    pub swap_file: PathBuf,
    /// Explicit target user; resolved from the login session when unset
    pub user: Option<String>,
    pub journal: Option<PathBuf>,
    pub network: NetworkConfig,
    pub toolchain: ToolchainConfig,
    pub source: SourceConfig,
    pub paths: SystemPaths,
}

impl RunConfig {
    /// Merge file configuration with overrides and validate the result.
    ///
    /// The swap size is parsed here so a malformed value is rejected before
    /// any stage runs.
    pub fn resolve(config: Config, overrides: Overrides) -> ProvisionResult<Self> {
        let raw_size = overrides.swap_size.unwrap_or(config.swap.size);
        let swap_size: SwapSize = raw_size.parse()?;

        let journal = config
            .general
            .journal
            .then_some(config.general.journal_path);

        Ok(Self {
            assume_yes: overrides.assume_yes,
            swap_size,
            min_ram_mb: overrides.min_ram_mb.unwrap_or(config.swap.min_ram_mb),
            swap_file: config.swap.path,
            user: overrides.user.filter(|u| !u.is_empty()),
            journal,
            network: config.network,
            toolchain: config.toolchain,
            source: config.source,
            paths: SystemPaths::default(),
        })
    }

    /// Where the built `unison` binary ends up
    pub fn unison_binary(&self) -> PathBuf {
        self.source.install_dir.join("unison")
    }

    /// The exact line that persists the swap file across reboots
    pub fn fstab_entry(&self) -> String {
        format!("{} none swap sw 0 0", self.swap_file.display())
    }
}
