//! Host implementation backed by the running system

use super::{CommandOutput, Host, Invocation};
use crate::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs commands with tokio, impersonates users through sudo
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = match &invocation.user {
            Some(user) => {
                // sudo resets the environment, so pass variables through env(1)
                let mut cmd = Command::new("sudo");
                cmd.args(["-u", user.as_str(), "-H", "--", "env"]);
                for (key, value) in &invocation.env {
                    cmd.arg(format!("{}={}", key, value));
                }
                cmd.arg(&invocation.program);
                cmd
            }
            None => {
                let mut cmd = Command::new(&invocation.program);
                cmd.envs(invocation.env.iter().map(|(k, v)| (k, v)));
                cmd
            }
        };

        cmd.args(&invocation.args);
        // Dropping the run future on a signal must not leave the child writing
        cmd.kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        if invocation.visible {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        cmd
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for SystemHost {
    async fn run(&self, invocation: &Invocation) -> ProvisionResult<CommandOutput> {
        match &invocation.user {
            Some(user) => debug!("Executing as {}: {}", user, invocation.display()),
            None => debug!("Executing: {}", invocation.display()),
        }

        let output = Self::command(invocation)
            .output()
            .await
            .map_err(|e| ProvisionError::command_failed(invocation.display(), e))?;

        // A signal-terminated child has no exit code; report it as 128 + signal like a shell
        let code = match output.status.code() {
            Some(code) => code,
            None => {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    output.status.signal().map(|s| 128 + s).unwrap_or(-1)
                }
                #[cfg(not(unix))]
                {
                    -1
                }
            }
        };

        Ok(CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() }
    }

    async fn fetch_text(&self, url: &str, timeout: Duration) -> ProvisionResult<String> {
        debug!("Fetching {}", url);

        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();

            agent
                .get(&url)
                .call()
                .and_then(|mut response| response.body_mut().read_to_string())
                .map_err(|e| ProvisionError::Lookup(format!("{}: {}", url, e)))
        })
        .await
        .map_err(|e| ProvisionError::Internal(format!("lookup task failed: {}", e)))?
    }
}
