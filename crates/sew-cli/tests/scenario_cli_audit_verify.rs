//! `sewctl audit verify` reports chain state and fails on tampering.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::process::Command;

use sew_audit::{Journal, Topic};

fn write_journal(path: &std::path::Path) {
    let mut j = Journal::open(path, true).unwrap();
    for i in 1..=3 {
        j.append(
            Topic::Order,
            "order/create",
            &format!("order#{i}"),
            json!({"quantity": 10 * i}),
        )
        .unwrap();
    }
}

#[test]
fn intact_journal_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transitions.jsonl");
    write_journal(&path);

    Command::cargo_bin("sewctl")
        .unwrap()
        .args(["audit", "verify", "--path", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("chain_valid=true lines=3"));
}

#[test]
fn tampered_journal_fails_with_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transitions.jsonl");
    write_journal(&path);

    let content = std::fs::read_to_string(&path).unwrap();
    let edited: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, l)| {
            if i == 1 {
                let mut v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["payload"]["quantity"] = json!(999);
                v.to_string()
            } else {
                l.to_string()
            }
        })
        .collect();
    std::fs::write(&path, edited.join("\n")).unwrap();

    Command::cargo_bin("sewctl")
        .unwrap()
        .args(["audit", "verify", "--path", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("chain_valid=false line=2"));
}
