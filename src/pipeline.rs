//! Provisioning pipeline
//!
//! Each stage checks whether its target state already holds and only mutates
//! the host when it does not. Stages run strictly in order; the first Fatal
//! failure stops the run.

use crate::config::RunConfig;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::Host;
use crate::identity::Identity;
use crate::journal::Journal;
use crate::stages;
use crate::ui::{self, UiContext};
use async_trait::async_trait;
use std::future::Future;
use tempfile::TempDir;
use tracing::{info, warn};

/// Result of ensuring a stage's target state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Target state already held; nothing was changed
    AlreadySatisfied,
    /// The host was changed to reach the target state
    Created,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadySatisfied => "already_satisfied",
            Self::Created => "created",
        }
    }

    /// Combine sub-step outcomes: any change makes the whole stage a change
    pub fn and(self, other: Outcome) -> Outcome {
        if self == Self::Created || other == Self::Created {
            Self::Created
        } else {
            Self::AlreadySatisfied
        }
    }
}

/// What happens when a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the run
    Fatal,
    /// Log a warning and continue with the next stage
    LoggedAndIgnored,
}

/// Shared, read-only inputs for every stage
pub struct StageContext<'a> {
    pub config: &'a RunConfig,
    pub host: &'a dyn Host,
    pub ui: &'a UiContext,
}

/// Values discovered while the run progresses
#[derive(Debug, Default)]
pub struct RunState {
    pub identity: Option<Identity>,
    pub compiler_version: Option<String>,
    pub unison_version: Option<String>,
    /// Scratch directory for the source build; deleted when the state drops
    pub build_dir: Option<TempDir>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity resolved by preflight
    pub fn identity(&self) -> ProvisionResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| ProvisionError::Internal("identity not resolved yet".to_string()))
    }
}

/// One idempotent provisioning step
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short identifier used in logs and the journal
    fn name(&self) -> &'static str;

    /// Heading shown to the user
    fn title(&self) -> &'static str;

    fn policy(&self) -> ErrorPolicy {
        ErrorPolicy::Fatal
    }

    /// Bring the host into this stage's target state
    async fn ensure(&self, ctx: &StageContext<'_>, state: &mut RunState)
        -> ProvisionResult<Outcome>;
}

/// How a stage ended within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Done(Outcome),
    /// Failed under `LoggedAndIgnored`; holds the error message
    Ignored(String),
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: &'static str,
    pub status: StageStatus,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// Whether any stage changed the host
    pub fn changed(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == StageStatus::Done(Outcome::Created))
    }

    pub fn status_of(&self, name: &str) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.name == name).map(|s| &s.status)
    }
}

/// Ordered list of stages
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Preflight, swap, Wi-Fi, packages, toolchain, source build, verification
    pub fn standard() -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(stages::Preflight),
            Box::new(stages::SwapProvisioner),
            Box::new(stages::WifiReadiness),
            Box::new(stages::PackageInstaller),
            Box::new(stages::ToolchainInstaller),
            Box::new(stages::SourceBuilder),
            Box::new(stages::Verifier),
        ];
        Self::new(stages)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order
    pub async fn run(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
        journal: &Journal,
    ) -> ProvisionResult<RunReport> {
        let total = self.stages.len();
        let mut report = RunReport::default();

        journal
            .record("run.start", &serde_json::json!({ "stages": self.names() }))
            .await;

        for (index, stage) in self.stages.iter().enumerate() {
            ui::section(
                ctx.ui,
                &format!("[{}/{}] {}", index + 1, total, stage.title()),
            );

            let status = match stage.ensure(ctx, state).await {
                Ok(outcome) => {
                    info!("Stage {} finished: {}", stage.name(), outcome.as_str());
                    StageStatus::Done(outcome)
                }
                Err(e) => match stage.policy() {
                    ErrorPolicy::Fatal => {
                        journal
                            .record(
                                "stage",
                                &serde_json::json!({
                                    "stage": stage.name(),
                                    "outcome": "failed",
                                    "error": e.to_string(),
                                }),
                            )
                            .await;
                        return Err(e.in_stage(stage.name()));
                    }
                    ErrorPolicy::LoggedAndIgnored => {
                        warn!("Stage {} failed (ignored): {}", stage.name(), e);
                        ui::step_warn_hint(ctx.ui, &e.to_string(), "continuing");
                        StageStatus::Ignored(e.to_string())
                    }
                },
            };

            let outcome = match &status {
                StageStatus::Done(outcome) => outcome.as_str(),
                StageStatus::Ignored(_) => "ignored",
            };
            journal
                .record(
                    "stage",
                    &serde_json::json!({ "stage": stage.name(), "outcome": outcome }),
                )
                .await;

            report.stages.push(StageReport {
                name: stage.name(),
                status,
            });
        }

        journal
            .record(
                "run.finish",
                &serde_json::json!({
                    "changed": report.changed(),
                    "compiler": state.compiler_version,
                    "unison": state.unison_version,
                }),
            )
            .await;

        Ok(report)
    }

    /// Run every stage, stopping early when `interrupt` resolves.
    ///
    /// The stage in flight is dropped and its child process killed. `state`
    /// stays with the caller, so the build directory goes when it drops.
    pub async fn run_until<F>(
        &self,
        ctx: &StageContext<'_>,
        state: &mut RunState,
        journal: &Journal,
        interrupt: F,
    ) -> ProvisionResult<RunReport>
    where
        F: Future<Output = &'static str>,
    {
        let signal = tokio::select! {
            result = self.run(ctx, state, journal) => return result,
            signal = interrupt => signal,
        };

        warn!("Received {}, stopping", signal);
        journal
            .record("run.interrupted", &serde_json::json!({ "signal": signal }))
            .await;
        Err(ProvisionError::Interrupted(signal))
    }
}

/// Resolves with the name of the first SIGINT or SIGTERM delivered
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                warn!("Cannot listen for SIGINT: {}", e);
                std::future::pending().await
            }
        }
    };

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            name = interrupt => name,
            _ = terminate.recv() => "SIGTERM",
        },
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            interrupt.await
        }
    }
}
