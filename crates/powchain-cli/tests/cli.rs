use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn powchain() -> Command {
    Command::cargo_bin("powchain").expect("binary built")
}

#[test]
fn demo_walks_through_tamper_and_repair() {
    powchain()
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("original chain of 3 blocks: valid"))
        .stdout(predicate::str::contains("block 1 has a stale hash"))
        .stdout(predicate::str::contains(
            "block 2 has a broken previous-hash link",
        ))
        .stdout(predicate::str::contains("rehashed 2 blocks: valid"));
}

#[test]
fn demo_logs_steps_when_enabled() {
    powchain()
        .arg("demo")
        .env("RUST_LOG", "info")
        .assert()
        .success()
        .stderr(predicate::str::contains("built demo chain of 3 blocks"))
        .stderr(predicate::str::contains(
            "cascade repair from block 1 touched 2 blocks",
        ));
}

#[test]
fn mine_prints_block_json() {
    let output = powchain()
        .args(["mine", "--payload", "Alice sends 10 BTC to Bob", "--difficulty", "2"])
        .output()
        .expect("run powchain");
    assert!(output.status.success());
    let block: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(block["payload"], "Alice sends 10 BTC to Bob");
    assert_eq!(block["difficulty"], 2);
    assert!(block["hash"].as_str().unwrap().starts_with("00"));
    assert_eq!(block["attempts"], block["nonce"]);
}

#[test]
fn build_reports_valid_chain() {
    let output = powchain()
        .args(["build", "--blocks", "3", "--difficulty", "1", "--parallel"])
        .output()
        .expect("run powchain");
    assert!(output.status.success());
    let chain: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(chain["valid"], true);
    assert_eq!(chain["blocks"].as_array().unwrap().len(), 4);
    assert_eq!(chain["mined_blocks"], 3);
    assert_eq!(chain["blocks"][0]["payload"], "Genesis Block");
}

#[test]
fn compare_prints_table() {
    powchain()
        .args(["compare", "--max-difficulty", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Difficulty"))
        .stdout(predicate::str::contains("1.0x"));
}

#[test]
fn unreachable_difficulty_fails() {
    powchain()
        .args(["mine", "--payload", "x", "--difficulty", "65"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("difficulty 65 exceeds maximum of 64"));
}
