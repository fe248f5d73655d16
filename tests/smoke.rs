//! Smoke tests -- verify the binary runs and state persists between runs.

use assert_cmd::Command;
use predicates::prelude::*;

fn cli(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("tiktrend-actions").unwrap();
    cmd.arg("--config").arg(config).env_remove("RUST_LOG");
    cmd
}

fn temp_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let db = dir.path().join("actions.db");
    let path = dir.path().join("tiktrend.toml");
    std::fs::write(
        &path,
        format!("[storage]\ndb_path = {:?}\n\n[ledger]\nmax_entries = 3\n", db.display().to_string()),
    )
    .unwrap();
    path
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("tiktrend-actions")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Action history, favorites and message templates"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("tiktrend-actions")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tiktrend-actions"));
}

#[test]
fn test_history_subcommands_exist() {
    for sub in ["record", "product", "recent", "clear", "stats"] {
        Command::cargo_bin("tiktrend-actions")
            .unwrap()
            .args(["history", sub, "--help"])
            .assert()
            .success();
    }
}

#[test]
fn test_unknown_action_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    cli(&config)
        .args(["history", "record", "--product", "p1", "--action", "fax"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action type"));
}

#[test]
fn test_history_persists_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);

    for (pid, action) in [("p1", "whatsapp"), ("p1", "instagram"), ("p2", "email")] {
        cli(&config)
            .args(["history", "record", "--product", pid, "--title", "Lamp", "--action", action])
            .assert()
            .success();
    }
    cli(&config)
        .args([
            "history", "record", "--product", "p1", "--action", "seller_bot", "--failed", "bot offline",
        ])
        .assert()
        .success();

    // Cap of 3 evicted the first whatsapp entry.
    let out = cli(&config).args(["--json", "history", "recent"]).output().unwrap();
    assert!(out.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["actionType"], "seller_bot");
    assert_eq!(entries[0]["errorMessage"], "bot offline");
    assert_eq!(entries[2]["actionType"], "instagram");

    let out = cli(&config)
        .args(["--json", "history", "product", "p1"])
        .output()
        .unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 2);

    cli(&config)
        .args(["history", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("History cleared."));
    cli(&config)
        .args(["history", "recent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history found."));
}

#[test]
fn test_favorites_ranking_via_cli() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);

    cli(&config).args(["favorites", "toggle", "crm"]).assert().success();
    cli(&config).args(["favorites", "toggle", "tiktok"]).assert().success();
    cli(&config).args(["favorites", "use", "tiktok"]).assert().success();
    cli(&config)
        .args(["favorites", "use", "tiktok"])
        .assert()
        .success()
        .stdout(predicate::str::contains("used 2 time(s)"));

    let out = cli(&config).args(["--json", "favorites", "top"]).output().unwrap();
    let top: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(top[0]["id"], "tiktok");
    assert_eq!(top[0]["usageCount"], 2);
    assert_eq!(top[1]["id"], "crm");
}

#[test]
fn test_ephemeral_does_not_persist() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);

    cli(&config)
        .args(["--ephemeral", "history", "record", "--product", "p1", "--action", "export"])
        .assert()
        .success();
    cli(&config)
        .args(["history", "recent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history found."));
}

#[test]
fn test_template_render_via_cli() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);

    let out = cli(&config)
        .args([
            "--json",
            "templates",
            "create",
            "--name",
            "Promo",
            "--caption",
            "Only {{price}} today",
            "--platform",
            "tiktok",
            "--hashtag",
            "deal",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let created: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    cli(&config)
        .args(["templates", "render", &id, "--var", "price=$9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Only $9 today\n\n#deal"));

    cli(&config)
        .args(["templates", "delete", "does-not-exist"])
        .assert()
        .failure();
}
