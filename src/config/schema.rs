//! Configuration schema for unison-bootstrap
//!
//! Configuration is read from `/etc/unison-bootstrap/config.toml` when present.
//! Every field is optional; missing sections fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Swap file settings
    pub swap: SwapConfig,

    /// Wi-Fi readiness settings
    pub network: NetworkConfig,

    /// OPAM and compiler switch settings
    pub toolchain: ToolchainConfig,

    /// Unison source and install locations
    pub source: SourceConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Append stage outcomes to the run journal
    pub journal: bool,

    /// Journal location (JSON lines)
    pub journal_path: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            journal: true,
            journal_path: PathBuf::from("/var/log/unison-bootstrap.jsonl"),
        }
    }
}

/// Swap file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Size string, `<int>M` or `<int>G`
    pub size: String,

    /// Create swap only when total RAM is below this many MiB
    pub min_ram_mb: u64,

    /// Swap file location
    pub path: PathBuf,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            size: "2G".to_string(),
            min_ram_mb: 2048,
            path: PathBuf::from("/swapfile"),
        }
    }
}

/// Wi-Fi readiness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Endpoint returning a bare two-letter country code
    pub country_lookup_url: String,

    /// Lookup timeout in seconds
    pub lookup_timeout_secs: u64,

    /// Country code used when the lookup fails
    pub fallback_country: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            country_lookup_url: "https://ipinfo.io/country".to_string(),
            lookup_timeout_secs: 5,
            fallback_country: "GB".to_string(),
        }
    }
}

/// OPAM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// opam bootstrap script
    pub installer_url: String,

    /// Name of the compiler switch to use or create
    pub switch_name: String,

    /// Compiler versions to try, most preferred first
    pub preferred_versions: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            installer_url: "https://raw.githubusercontent.com/ocaml/opam/master/shell/install.sh"
                .to_string(),
            switch_name: "default".to_string(),
            // Unison needs OCaml >= 4.08
            preferred_versions: [
                "4.14.2", "4.14.1", "4.14.0", "5.2.1", "5.1.1", "5.0.0", "4.13.1", "4.12.1",
                "4.08.1",
            ]
            .iter()
            .map(|v| v.to_string())
            .collect(),
        }
    }
}

/// Unison source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Git repository to clone
    pub repository: String,

    /// Branch or tag; the remote default branch when unset
    pub branch: Option<String>,

    /// Where the `unison` binary is installed
    pub install_dir: PathBuf,

    /// Where `unison.1` is installed
    pub man_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: "https://github.com/bcpierce00/unison.git".to_string(),
            branch: None,
            install_dir: PathBuf::from("/usr/local/bin"),
            man_dir: PathBuf::from("/usr/local/share/man/man1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.swap.size, "2G");
        assert_eq!(config.swap.min_ram_mb, 2048);
        assert_eq!(config.toolchain.switch_name, "default");
        assert_eq!(config.toolchain.preferred_versions[0], "4.14.2");
        assert!(config.general.journal);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [swap]
            size = "1G"

            [source]
            branch = "v2.53.7"
            "#,
        )
        .unwrap();

        assert_eq!(config.swap.size, "1G");
        assert_eq!(config.swap.path, PathBuf::from("/swapfile"));
        assert_eq!(config.source.branch.as_deref(), Some("v2.53.7"));
        assert_eq!(config.source.install_dir, PathBuf::from("/usr/local/bin"));
        assert_eq!(config.network.fallback_country, "GB");
    }
}
