use assert_cmd::Command;
use predicates::str::contains;

mod support;

use support::TestVault;

#[test]
fn tasklink_help_works() {
    Command::cargo_bin("tasklink")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Markdown"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "list", "show", "status", "tag", "star", "unstar", "link", "unlink", "edges",
        "add", "delete",
    ];

    for cmd in subcommands {
        Command::cargo_bin("tasklink")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn missing_vault_is_user_error() {
    Command::cargo_bin("tasklink")
        .expect("binary")
        .args(["--vault", "/definitely/not/here", "list"])
        .assert()
        .code(2)
        .stderr(contains("Vault not found"));
}

#[test]
fn list_human_output() {
    let vault = TestVault::fixture();
    vault
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("5 task(s)"))
        .stdout(contains("[ ] ab12cd Write report #work"));
}

#[test]
fn quiet_suppresses_output() {
    let vault = TestVault::fixture();
    vault
        .cmd()
        .args(["--quiet", "list"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn init_writes_config_once() {
    let vault = TestVault::new();
    let report = vault.json(&["init"]);
    assert_eq!(report["data"]["created"], true);
    assert!(vault.read(".tasklink.toml").contains("[linking]"));

    let again = vault.json(&["init"]);
    assert_eq!(again["data"]["created"], false);
    assert_eq!(again["warnings"].as_array().map(|w| w.len()), Some(1));
}
