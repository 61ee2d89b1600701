//! unison-bootstrap - provision a Debian or Raspberry Pi OS host for Unison
//!
//! Sets up swap on low-memory boards, readies Wi-Fi, installs build tools,
//! bootstraps opam with an OCaml switch for the invoking user, then builds,
//! installs and verifies Unison from source. Every stage is idempotent.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod journal;
pub mod pipeline;
pub mod stages;
pub mod ui;

pub use error::{ProvisionError, ProvisionResult};
