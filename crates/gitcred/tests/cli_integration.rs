//! CLI integration tests for the gitcred command-line interface.
//!
//! These run the binary against a temporary config directory with the
//! plaintext store and interaction disabled, so nothing touches the user's
//! keychain or terminal.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the gitcred binary, isolated in `dir`.
fn gitcred(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gitcred").unwrap();
    cmd.env("GITCRED_CONFIG_DIR", dir.path())
        .env("GITCRED_CREDENTIAL_STORE", "plaintext")
        .env("GITCRED_INTERACTIVE", "false")
        .env("GITCRED_AUTODETECT_TIMEOUT", "0")
        .env_remove("GITCRED_PROVIDER")
        .env_remove("GITCRED_NAMESPACE")
        .env_remove("GITCRED_PLAINTEXT_STORE_PATH")
        .env_remove("GITCRED_TRACE")
        .env_remove("GITCRED_CONFIG");
    cmd
}

const REQUEST: &str = "protocol=https\nhost=example.com\npath=org/repo.git\n\n";

fn store_alice(dir: &TempDir) {
    gitcred(dir)
        .arg("store")
        .write_stdin(
            "protocol=https\nhost=example.com\npath=org/repo.git\nusername=alice\npassword=s3cret\n\n",
        )
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Git credential helper"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("store"))
        .stdout(predicate::str::contains("erase"))
        .stdout(predicate::str::contains("providers"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gitcred"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir).arg("approve").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential Protocol Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_store_then_get() {
    let dir = TempDir::new().unwrap();
    store_alice(&dir);

    gitcred(&dir)
        .arg("get")
        .write_stdin(REQUEST)
        .assert()
        .success()
        .stdout("username=alice\npassword=s3cret\n");

    assert!(dir.path().join("credentials.json").is_file());
}

#[test]
fn test_store_is_scoped_by_path() {
    let dir = TempDir::new().unwrap();
    store_alice(&dir);

    gitcred(&dir)
        .arg("get")
        .write_stdin("protocol=https\nhost=example.com\npath=other/repo.git\n\n")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_erase_then_get_fails_without_interaction() {
    let dir = TempDir::new().unwrap();
    store_alice(&dir);

    // A stale password does not erase the stored credential.
    gitcred(&dir)
        .arg("erase")
        .write_stdin("protocol=https\nhost=example.com\npath=org/repo.git\nusername=alice\npassword=old\n\n")
        .assert()
        .success();
    gitcred(&dir)
        .arg("get")
        .write_stdin(REQUEST)
        .assert()
        .success();

    gitcred(&dir)
        .arg("erase")
        .write_stdin("protocol=https\nhost=example.com\npath=org/repo.git\nusername=alice\npassword=s3cret\n\n")
        .assert()
        .success();
    gitcred(&dir)
        .arg("get")
        .write_stdin(REQUEST)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("interaction"));
}

#[test]
fn test_get_without_host_fails() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .arg("get")
        .write_stdin("protocol=https\n\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no host provider"));
}

#[test]
fn test_malformed_input_fails() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .arg("get")
        .write_stdin("protocol=https\nnot a credential line\n\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid credential line"));
}

#[test]
fn test_namespace_isolates_credentials() {
    let dir = TempDir::new().unwrap();
    store_alice(&dir);

    gitcred(&dir)
        .env("GITCRED_NAMESPACE", "work")
        .arg("get")
        .write_stdin(REQUEST)
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_providers_lists_generic() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("generic"));
}

#[test]
fn test_providers_shows_forced_provider() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[credential]\nprovider = \"generic\"\n",
    )
    .unwrap();

    gitcred(&dir)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("Forced provider: generic"))
        .stdout(predicate::str::contains("credential.provider"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .args(["--config", "/nonexistent/gitcred.toml", "providers"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_store_kind_fails() {
    let dir = TempDir::new().unwrap();
    gitcred(&dir)
        .env("GITCRED_CREDENTIAL_STORE", "floppy")
        .arg("get")
        .write_stdin(REQUEST)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITCRED_CREDENTIAL_STORE"));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    let dir = TempDir::new().unwrap();
    store_alice(&dir);

    gitcred(&dir)
        .args(["--verbose", "get"])
        .write_stdin(REQUEST)
        .assert()
        .success()
        .stdout("username=alice\npassword=s3cret\n")
        .stderr(predicate::str::contains("Getting credential"));
}
