//! Whole-pipeline runs against a fake host

use super::testing::Fixture;
use crate::error::ProvisionResult;
use crate::host::fake::{script, FakeHost};
use crate::host::{CommandOutput, Invocation};
use crate::journal::Journal;
use crate::pipeline::{Outcome, Pipeline, RunReport, RunState, StageContext, StageStatus};
use crate::stages::PACKAGE_MAP;
use crate::ui::UiContext;

/// A host where every stage's target state already holds
fn provisioned(fixture: &Fixture) -> FakeHost {
    std::fs::create_dir_all(fixture.identity.opam_root()).unwrap();
    fixture.install_unison();
    fixture.set_memory_mib(8192);

    let passwd = format!("pi:x:1000:1000::{}:/bin/bash\n", fixture.identity.home.display());
    let mut tools: Vec<&str> = PACKAGE_MAP.iter().map(|(tool, _)| *tool).collect();
    tools.extend(["opam", "rfkill"]);

    FakeHost::new().with_commands(&tools).on(move |_, inv| {
        if let Some(script) = script(inv) {
            if script.ends_with("ocamlc -version") {
                return Some(CommandOutput::ok("4.14.2\n"));
            }
            if script.ends_with("unison -version") {
                return Some(CommandOutput::ok("unison version 2.53.7\n"));
            }
        }
        match inv.program.as_str() {
            "getent" => Some(CommandOutput::ok(passwd.clone())),
            "rfkill" => Some(CommandOutput::ok("0: phy0: Wireless LAN\n\tSoft blocked: no\n")),
            "opam" if inv.args.get(1).map(String::as_str) == Some("list") => {
                Some(CommandOutput::ok("default\n"))
            }
            _ => None,
        }
    })
}

/// Commands that only inspect or refresh state
fn read_only(inv: &Invocation) -> bool {
    let line = inv.display();
    ["getent passwd", "rfkill list", "opam update", "opam switch list", "opam switch set"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        || script(inv).is_some_and(|s| s.ends_with("-version"))
}

async fn run(fixture: &Fixture, host: &FakeHost) -> (ProvisionResult<RunReport>, RunState) {
    let ui = UiContext::non_interactive().with_auto_yes(true);
    let ctx = StageContext {
        config: &fixture.config,
        host,
        ui: &ui,
    };
    let mut state = RunState::new();
    let result = Pipeline::standard()
        .run(&ctx, &mut state, &Journal::disabled())
        .await;
    (result, state)
}

#[tokio::test]
async fn rerun_on_provisioned_host_changes_nothing() {
    let mut fixture = Fixture::new();
    fixture.config.user = Some("pi".to_string());
    let host = provisioned(&fixture);
    let fstab_before = fixture.fstab();

    for _ in 0..2 {
        let (result, state) = run(&fixture, &host).await;
        let report = result.unwrap();
        assert!(!report.changed());
        assert!(report
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Done(Outcome::AlreadySatisfied)));
        assert_eq!(state.unison_version.as_deref(), Some("unison version 2.53.7"));
    }

    let mutating: Vec<String> = host
        .calls()
        .iter()
        .filter(|inv| !read_only(inv))
        .map(Invocation::display)
        .collect();
    assert!(mutating.is_empty(), "unexpected mutations: {:?}", mutating);
    assert_eq!(fixture.fstab(), fstab_before);
}

#[tokio::test]
async fn installed_binary_skips_build_but_still_verifies() {
    let mut fixture = Fixture::new();
    fixture.config.user = Some("pi".to_string());
    let host = provisioned(&fixture);

    let (result, state) = run(&fixture, &host).await;
    let report = result.unwrap();

    assert_eq!(
        report.status_of("unison"),
        Some(&StageStatus::Done(Outcome::AlreadySatisfied))
    );
    assert_eq!(host.count("git clone"), 0);
    assert!(state.build_dir.is_none());
    assert_eq!(
        host.calls()
            .iter()
            .filter(|inv| script(inv).is_some_and(|s| s.ends_with("unison -version")))
            .count(),
        1
    );
}

#[tokio::test]
async fn low_memory_host_gets_swap_then_continues() {
    let mut fixture = Fixture::new();
    fixture.config.user = Some("pi".to_string());
    let host = provisioned(&fixture);
    fixture.set_memory_mib(512);

    let (result, _) = run(&fixture, &host).await;
    let report = result.unwrap();
    assert_eq!(
        report.status_of("swap"),
        Some(&StageStatus::Done(Outcome::Created))
    );
    assert_eq!(host.count("swapon"), 1);

    // Swap is now active; the second run must not touch it again
    fixture.activate_swap();
    let (result, _) = run(&fixture, &host).await;
    assert!(!result.unwrap().changed());
    assert_eq!(host.count("swapon"), 1);

    let entry = fixture.config.fstab_entry();
    assert_eq!(fixture.fstab().lines().filter(|l| *l == entry).count(), 1);
}

#[tokio::test]
async fn verification_failure_fails_the_run() {
    let mut fixture = Fixture::new();
    fixture.config.user = Some("pi".to_string());
    fixture.install_unison();
    fixture.set_memory_mib(8192);
    std::fs::create_dir_all(fixture.identity.opam_root()).unwrap();
    let passwd = format!("pi:x:1000:1000::{}:/bin/bash\n", fixture.identity.home.display());
    let host = FakeHost::new()
        .with_commands(&PACKAGE_MAP.iter().map(|(tool, _)| *tool).collect::<Vec<_>>())
        .with_commands(&["opam"])
        .on(move |_, inv| {
            if let Some(script) = script(inv) {
                if script.ends_with("ocamlc -version") {
                    return Some(CommandOutput::ok("4.14.2\n"));
                }
                if script.ends_with("unison -version") {
                    return Some(CommandOutput::failed(127, "unison: not found"));
                }
            }
            match inv.program.as_str() {
                "getent" => Some(CommandOutput::ok(passwd.clone())),
                "opam" if inv.args.get(1).map(String::as_str) == Some("list") => {
                    Some(CommandOutput::ok("default\n"))
                }
                _ => None,
            }
        });

    let (result, _) = run(&fixture, &host).await;
    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Stage 'verify' failed"));
}
