//! unison-bootstrap - provision a host to build and run Unison
//!
//! CLI entry point: parses flags, loads configuration and runs the pipeline.

use clap::error::ErrorKind;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use unison_bootstrap::cli::Cli;
use unison_bootstrap::config::{ConfigManager, RunConfig};
use unison_bootstrap::host::SystemHost;
use unison_bootstrap::journal::Journal;
use unison_bootstrap::pipeline::{self, Pipeline, RunState, StageContext};
use unison_bootstrap::ui::{self, UiContext};
use unison_bootstrap::{ProvisionError, ProvisionResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("unison_bootstrap=warn"),
        1 => EnvFilter::new("unison_bootstrap=info"),
        _ => EnvFilter::new("unison_bootstrap=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    ui::init_theme();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if matches!(e, ProvisionError::Interrupted(_)) {
                // A prompt may still be blocked on stdin; the runtime would wait for it
                std::process::exit(1);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ProvisionResult<()> {
    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let file = config_manager.load().await?;

    // Malformed sizes fail here, before anything touches the host
    let config = RunConfig::resolve(file, cli.overrides())?;

    let ui_ctx = UiContext::detect().with_auto_yes(config.assume_yes);
    ui::intro(
        &ui_ctx,
        &format!(" unison-bootstrap {} ", env!("CARGO_PKG_VERSION")),
    );

    let host = SystemHost::new();
    let journal = Journal::new(config.journal.clone());
    debug!("Run {} using {}", journal.run_id(), config_manager.path().display());

    let ctx = StageContext {
        config: &config,
        host: &host,
        ui: &ui_ctx,
    };
    let mut state = RunState::new();

    let result = Pipeline::standard()
        .run_until(&ctx, &mut state, &journal, pipeline::shutdown_signal())
        .await;

    match result {
        Ok(report) => {
            let summary = match (&state.unison_version, report.changed()) {
                (Some(version), true) => format!("Provisioned: {}", version),
                (Some(version), false) => format!("Already provisioned: {}", version),
                (None, _) => "Provisioning complete".to_string(),
            };
            ui::outro_success(&ui_ctx, &summary);
            Ok(())
        }
        Err(e) => {
            // Removes the build tree before the process exits
            drop(state);
            ui::outro_error(&ui_ctx, "Provisioning failed");
            Err(e)
        }
    }
}
