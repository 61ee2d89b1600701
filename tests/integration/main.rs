//! Integration tests for unison-bootstrap
//!
//! Only paths that stop before the host is touched are exercised here.

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Binary with the ambient configuration stripped from its environment
    fn bootstrap() -> Command {
        let mut cmd = cargo_bin_cmd!("unison-bootstrap");
        for var in ["SWAP_SIZE", "MIN_RAM_MB", "UNISON_BOOTSTRAP_CONFIG", "SUDO_USER"] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn missing_config(dir: &TempDir) -> PathBuf {
        dir.path().join("absent.toml")
    }

    fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    #[test]
    fn help_displays() {
        bootstrap()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--swap-size"))
            .stdout(predicate::str::contains("--yes"));
    }

    #[test]
    fn version_displays() {
        bootstrap()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("unison-bootstrap"));
    }

    #[test]
    fn unknown_flag_exits_one() {
        bootstrap()
            .arg("--frobnicate")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("--frobnicate"));
    }

    #[test]
    fn positional_argument_exits_one() {
        bootstrap().arg("install").assert().code(1);
    }

    #[test]
    fn malformed_swap_size_fails_first() {
        let dir = TempDir::new().unwrap();
        bootstrap()
            .args(["--yes", "--config"])
            .arg(missing_config(&dir))
            .env("SWAP_SIZE", "3X")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid swap size '3X'"))
            .stdout(predicate::str::contains("[1/7]").not());
    }

    #[test]
    fn malformed_swap_size_flag() {
        let dir = TempDir::new().unwrap();
        bootstrap()
            .args(["--yes", "--swap-size", "2T", "--config"])
            .arg(missing_config(&dir))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid swap size"));
    }

    #[test]
    fn invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[swap\nsize = ");
        bootstrap()
            .arg("--yes")
            .arg("--config")
            .arg(&path)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn malformed_size_in_config_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[swap]\nsize = \"lots\"\n");
        bootstrap()
            .arg("--yes")
            .env("UNISON_BOOTSTRAP_CONFIG", &path)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid swap size 'lots'"));
    }

    #[test]
    fn refuses_to_run_unprivileged() {
        if is_root() {
            // Would provision the machine running the tests
            return;
        }
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join("journal.jsonl");
        let path = write_config(
            &dir,
            &format!("[general]\njournal_path = {:?}\n", journal.display().to_string()),
        );
        bootstrap()
            .args(["--yes", "--config"])
            .arg(&path)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("must run as root"));

        let entries = std::fs::read_to_string(&journal).unwrap();
        assert!(entries.lines().next().unwrap().contains("\"run.start\""));
        assert!(entries.contains("\"failed\""));
    }
}
