//! Integration tests for fintrack

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    // Nothing listens on the discard port, so connections are refused quickly
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn fintrack() -> Command {
        let mut cmd = cargo_bin_cmd!("fintrack");
        cmd.env_remove("FINTRACK_API_BASE")
            .env_remove("FINTRACK_AUTH_BASE")
            .env_remove("FINTRACK_CONFIG");
        cmd
    }

    /// Config pointing at an unreachable server with an in-memory cache
    fn offline_config(dir: &TempDir) -> String {
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "[api]\nbase_url = \"{0}/api\"\nauth_base_url = \"{0}\"\ntimeout_secs = 2\n\n[cache]\npersist = false\n",
                UNREACHABLE
            ),
        )
        .unwrap();
        path.display().to_string()
    }

    #[test]
    fn help_displays() {
        fintrack()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fintrack personal finance tracker"));
    }

    #[test]
    fn version_displays() {
        fintrack()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("fintrack"));
    }

    #[test]
    fn config_path_honors_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fintrack()
            .args(["config", "path", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_applies_overrides() {
        let dir = TempDir::new().unwrap();
        fintrack()
            .args(["config", "show", "--config"])
            .arg(dir.path().join("missing.toml"))
            .args(["--api-base", "https://money.example.com/api"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[api]"))
            .stdout(predicate::str::contains("https://money.example.com/api"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fintrack").join("config.toml");
        fintrack()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("timeout_secs = 30"));
    }

    #[test]
    fn request_rejects_unknown_method() {
        let dir = TempDir::new().unwrap();
        fintrack()
            .args(["request", "BREW", "/coffee", "--config"])
            .arg(offline_config(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown HTTP method"));
    }

    #[test]
    fn session_me_reports_network_error() {
        let dir = TempDir::new().unwrap();
        fintrack()
            .args(["session", "me", "--config"])
            .arg(offline_config(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn balance_degrades_when_offline() {
        let dir = TempDir::new().unwrap();
        fintrack()
            .args(["balance", "user-42", "--format", "json", "--config"])
            .arg(offline_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("null"));
    }

    #[test]
    fn cache_path_when_not_persisting() {
        let dir = TempDir::new().unwrap();
        fintrack()
            .args(["cache", "path", "--config"])
            .arg(offline_config(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("in memory only"));
    }
}
