//! Error types for unison-bootstrap
//!
//! All modules use `ProvisionResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// All errors that can occur while provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    // Configuration errors
    #[error("Invalid swap size '{0}': expected an integer followed by M or G (e.g. 512M, 2G)")]
    InvalidSwapSize(String),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("This tool must run as root (effective uid is {0})")]
    NotRoot(u32),

    #[error("Could not determine the invoking (non-root) user")]
    IdentityUnresolved,

    #[error("User '{user}' not found in the password database: {reason}")]
    IdentityLookup { user: String, reason: String },

    #[error("Confirmation required but no interactive terminal is available")]
    ConfirmationUnavailable,

    #[error("Aborted by user")]
    Aborted,

    #[error("Interrupted by {0}")]
    Interrupted(&'static str),

    // Environment errors
    #[error("Could not read memory information from {path}: {reason}")]
    MemoryInfo { path: PathBuf, reason: String },

    #[error("opam is still not available after running the installer")]
    ToolchainMissing,

    #[error("No OCaml compiler versions are available from opam")]
    NoCompilerAvailable,

    #[error("OCaml compiler not usable in switch '{0}' after installing it")]
    CompilerUnusable(String),

    #[error("Build finished but expected output is missing: {0}")]
    BuildOutputMissing(PathBuf),

    #[error("Installed binary {path} does not run for user '{user}': {reason}")]
    VerificationFailed {
        path: PathBuf,
        user: String,
        reason: String,
    },

    // Process errors
    #[error("Failed to execute: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with code {code}{}", format_stderr(.stderr))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network lookup failed: {0}")]
    Lookup(String),

    // Pipeline errors
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl ProvisionError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a non-zero exit error
    pub fn command_exit(command: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandExit {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Wrap an error with the name of the stage that produced it
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Strip stage wrapping to get at the underlying error
    pub fn root(&self) -> &ProvisionError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::NotRoot(_) => Some("Run: sudo unison-bootstrap"),
            Self::IdentityUnresolved => {
                Some("Invoke through sudo from a regular account, or pass --user <name>")
            }
            Self::ConfirmationUnavailable => Some("Pass --yes to run non-interactively"),
            Self::InvalidSwapSize(_) => Some("Set SWAP_SIZE to a value like 1G or 768M"),
            Self::CommandExit { .. } => {
                Some("Fix the underlying cause and re-run; completed steps are skipped")
            }
            Self::Interrupted(_) => Some("Re-run to continue; completed steps are skipped"),
            Self::NoCompilerAvailable => Some("Run: opam update, then check network access"),
            _ => None,
        }
    }
}
