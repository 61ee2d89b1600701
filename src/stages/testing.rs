//! Shared fixtures for stage tests

use crate::config::{Config, Overrides, RunConfig, SystemPaths};
use crate::error::ProvisionResult;
use crate::host::fake::FakeHost;
use crate::identity::Identity;
use crate::pipeline::{Outcome, RunState, Stage, StageContext};
use crate::ui::UiContext;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway host filesystem: /proc files, fstab, install dirs and a home
pub struct Fixture {
    pub root: TempDir,
    pub config: RunConfig,
    pub identity: Identity,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_overrides(Overrides {
            assume_yes: true,
            ..Default::default()
        })
    }

    pub fn with_overrides(overrides: Overrides) -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path();

        let mut config = RunConfig::resolve(Config::default(), overrides).unwrap();
        config.swap_file = base.join("swapfile");
        config.journal = None;
        config.source.install_dir = base.join("usr/local/bin");
        config.source.man_dir = base.join("usr/local/share/man/man1");
        config.paths = SystemPaths {
            meminfo: base.join("meminfo"),
            proc_swaps: base.join("swaps"),
            fstab: base.join("fstab"),
            temp_root: base.join("tmp"),
        };

        for dir in ["tmp", "home/pi"] {
            std::fs::create_dir_all(base.join(dir)).unwrap();
        }
        std::fs::write(&config.paths.proc_swaps, SWAPS_HEADER).unwrap();
        std::fs::write(&config.paths.fstab, "proc /proc proc defaults 0 0\n").unwrap();
        let fixture = Self {
            identity: Identity {
                name: "pi".to_string(),
                uid: 1000,
                gid: 1000,
                home: base.join("home/pi"),
            },
            root,
            config,
        };
        fixture.set_memory_mib(512);
        fixture
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn set_memory_mib(&self, mib: u64) {
        std::fs::write(
            &self.config.paths.meminfo,
            format!(
                "MemTotal:       {} kB\nMemFree:          123456 kB\n",
                mib * 1024
            ),
        )
        .unwrap();
    }

    pub fn activate_swap(&self) {
        let line = format!(
            "{}{}                               file\t\t2097148\t\t0\t\t-2\n",
            SWAPS_HEADER,
            self.config.swap_file.display()
        );
        std::fs::write(&self.config.paths.proc_swaps, line).unwrap();
    }

    pub fn fstab(&self) -> String {
        std::fs::read_to_string(&self.config.paths.fstab).unwrap()
    }

    pub fn install_unison(&self) {
        write_file(&self.config.unison_binary(), "#!/bin/sh\n");
    }

    /// State as left behind by a successful preflight
    pub fn state(&self) -> RunState {
        RunState {
            identity: Some(self.identity.clone()),
            ..RunState::default()
        }
    }

    pub async fn ensure(
        &self,
        stage: &dyn Stage,
        host: &FakeHost,
        state: &mut RunState,
    ) -> ProvisionResult<Outcome> {
        let ui = UiContext::non_interactive().with_auto_yes(self.config.assume_yes);
        let ctx = StageContext {
            config: &self.config,
            host,
            ui: &ui,
        };
        stage.ensure(&ctx, state).await
    }
}

pub const SWAPS_HEADER: &str = "Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority\n";

pub fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
