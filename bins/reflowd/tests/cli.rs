// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;

fn reflowd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reflowd").unwrap();
    cmd.arg("--data-dir").arg(dir).env("RUST_LOG", "warn");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap()
}

fn list_json(dir: &Path) -> Vec<Value> {
    let text = stdout_of(reflowd(dir).args(["list", "--json"]));
    serde_json::from_str::<Value>(&text)
        .unwrap()
        .as_array()
        .unwrap()
        .clone()
}

#[test]
fn fresh_store_lists_seed_set() {
    let dir = tempfile::tempdir().unwrap();
    let all = list_json(dir.path());
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|m| m["status"] == "AVAILABLE"));
    assert_eq!(all[0]["id"], "1");
}

#[test]
fn report_claim_complete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let id = stdout_of(reflowd(dir.path()).args([
        "report",
        "--type",
        "Metal",
        "--lat=-23.56",
        "--lng=-46.64",
        "--as",
        "U1",
    ]))
    .trim()
    .to_string();
    assert!(!id.is_empty());

    reflowd(dir.path())
        .args(["claim", &id, "--collector", "C1"])
        .assert()
        .success()
        .stdout("claimed\n");
    reflowd(dir.path())
        .args(["claim", &id, "--collector", "C2"])
        .assert()
        .success()
        .stdout("unchanged\n");

    let all = list_json(dir.path());
    assert_eq!(all.len(), 4);
    let m = all.iter().find(|m| m["id"] == id.as_str()).unwrap();
    assert_eq!(m["status"], "IN_TRANSIT");
    assert_eq!(m["collectorId"], "C1");
    assert_eq!(m["generatorId"], "U1");
    assert_eq!(m["type"], "Metal");
    assert_eq!(m["position"][0], -23.56);

    reflowd(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("in_transit: 1"))
        .stdout(predicate::str::contains(format!("collector C1: {id}")));

    reflowd(dir.path())
        .args(["complete", &id])
        .assert()
        .success()
        .stdout("collected\n");
    reflowd(dir.path())
        .args(["complete", &id])
        .assert()
        .success()
        .stdout("unchanged\n");
}

#[test]
fn reset_restores_seed_set() {
    let dir = tempfile::tempdir().unwrap();
    reflowd(dir.path())
        .args(["report", "--type", "Papel"])
        .assert()
        .success();
    assert_eq!(list_json(dir.path()).len(), 4);

    reflowd(dir.path())
        .arg("reset")
        .assert()
        .success()
        .stdout("reset\n");
    assert_eq!(list_json(dir.path()).len(), 3);
}

#[test]
fn lat_without_lng_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    reflowd(dir.path())
        .args(["report", "--type", "Vidro", "--lat=-23.5"])
        .assert()
        .failure();
}

#[test]
fn non_finite_coordinates_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for (lat, lng) in [("NaN", "0"), ("-23.5", "inf"), ("-inf", "-46.6")] {
        reflowd(dir.path())
            .args(["report", "--type", "Metal"])
            .arg(format!("--lat={lat}"))
            .arg(format!("--lng={lng}"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a finite coordinate"));
    }
    assert_eq!(list_json(dir.path()).len(), 3);
}

#[test]
fn paused_run_exits_after_deadline() {
    let dir = tempfile::tempdir().unwrap();
    reflowd(dir.path())
        .args(["run", "--paused", "--for-secs", "1"])
        .assert()
        .success();
    assert!(dir.path().join("simulation.json").exists());
    assert_eq!(list_json(dir.path()).len(), 3);
}
