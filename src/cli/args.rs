//! CLI argument definitions using clap derive

use crate::config::Overrides;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Provision this host to build and run Unison
///
/// Creates swap when RAM is short, unblocks Wi-Fi, installs build tools,
/// sets up opam with an OCaml switch for the invoking user, then builds and
/// installs Unison. Safe to re-run.
#[derive(Parser, Debug)]
#[command(name = "unison-bootstrap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "UNISON_BOOTSTRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// User to build and verify as (defaults to the sudo caller)
    #[arg(long, env = "SUDO_USER")]
    pub user: Option<String>,

    /// Swap file size, e.g. 512M or 2G
    #[arg(long, env = "SWAP_SIZE", value_name = "SIZE")]
    pub swap_size: Option<String>,

    /// Create swap only when total RAM is below this many MiB
    #[arg(long, env = "MIN_RAM_MB", value_name = "MIB")]
    pub min_ram_mb: Option<u64>,
}

impl Cli {
    /// Values that take precedence over the configuration file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            assume_yes: self.yes,
            swap_size: self.swap_size.clone(),
            min_ram_mb: self.min_ram_mb,
            user: self.user.clone(),
        }
    }
}
