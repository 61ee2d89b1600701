//! The provisioning stages, in pipeline order

mod network;
mod packages;
mod preflight;
#[cfg(test)]
mod scenarios;
mod source;
mod swap;
#[cfg(test)]
pub(crate) mod testing;
mod toolchain;
mod verify;

pub use network::WifiReadiness;
pub use packages::{PackageInstaller, PACKAGE_MAP};
pub use preflight::Preflight;
pub use source::SourceBuilder;
pub use swap::SwapProvisioner;
pub use toolchain::{compare_versions, select_compiler, ToolchainInstaller};
pub use verify::Verifier;
