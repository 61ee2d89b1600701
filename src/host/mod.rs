//! Host abstraction
//!
//! Every external effect the provisioner has (spawning processes, probing the
//! search path, HTTP lookups, privilege checks) goes through the [`Host`]
//! trait. The real implementation drives the system; tests use a recording
//! fake.

#[cfg(test)]
pub(crate) mod fake;
mod system;

pub use system::SystemHost;

use crate::error::{ProvisionError, ProvisionResult};
use crate::identity::Identity;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    /// Account to run as (via sudo); `None` runs with the tool's own privileges
    pub user: Option<String>,
    /// Stream output to the terminal instead of capturing it
    pub visible: bool,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            user: None,
            visible: false,
        }
    }

    /// `bash -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Let the command write straight to the terminal
    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }

    /// Run as `identity` with its home directory as `HOME`
    pub fn for_user(mut self, identity: &Identity) -> Self {
        self.user = Some(identity.name.clone());
        self.env.retain(|(key, _)| key != "HOME" && key != "USER");
        self.env
            .push(("HOME".to_string(), identity.home.display().to_string()));
        self.env.push(("USER".to_string(), identity.name.clone()));
        self
    }

    /// Human-readable command line, used in logs and errors
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Quote `value` for inclusion in a POSIX shell script
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Everything the provisioner needs from the machine it runs on
#[async_trait]
pub trait Host: Send + Sync {
    /// Run a command to completion. A non-zero exit is not an error here.
    async fn run(&self, invocation: &Invocation) -> ProvisionResult<CommandOutput>;

    /// Effective uid of this process
    fn effective_uid(&self) -> u32;

    /// GET `url` and return the body as text
    async fn fetch_text(&self, url: &str, timeout: Duration) -> ProvisionResult<String>;

    /// Whether `name` resolves on the search path
    async fn command_exists(&self, name: &str) -> bool {
        let lookup = Invocation::new("sh").args(["-c", "command -v \"$1\"", "sh", name]);
        self.run(&lookup)
            .await
            .map(|out| out.success())
            .unwrap_or(false)
    }

    /// Run a command and turn a non-zero exit into an error
    async fn run_checked(&self, invocation: &Invocation) -> ProvisionResult<CommandOutput> {
        let output = self.run(invocation).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProvisionError::command_exit(
                invocation.display(),
                output.code,
                output.stderr,
            ))
        }
    }
}

/// Scoped handle that runs commands as a resolved non-root identity.
///
/// Nothing ambient is changed: each invocation carries its own sudo wrapper,
/// so dropping the handle (on any path) leaves the process elevated as before.
pub struct AsUser<'a> {
    host: &'a dyn Host,
    identity: &'a Identity,
}

/// Run commands through `host` as `identity`
pub fn with_identity<'a>(host: &'a dyn Host, identity: &'a Identity) -> AsUser<'a> {
    AsUser { host, identity }
}

impl AsUser<'_> {
    pub async fn run(&self, invocation: Invocation) -> ProvisionResult<CommandOutput> {
        self.host.run(&invocation.for_user(self.identity)).await
    }

    pub async fn run_checked(&self, invocation: Invocation) -> ProvisionResult<CommandOutput> {
        self.host.run_checked(&invocation.for_user(self.identity)).await
    }
}
