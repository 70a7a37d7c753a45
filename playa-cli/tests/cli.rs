use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const PRE_EVENT: &str = "2026-04-20T12:00:00Z";
const ON_SITE: [&str; 4] = ["--lat", "-32.5513", "--lon", "19.9884"];
const OFF_SITE: [&str; 4] = ["--lat", "-33.9249", "--lon", "18.4241"];

fn cmd(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("playa").unwrap();
    cmd.arg("--data-dir").arg(data.path()).env_remove("RUST_LOG");
    cmd
}

fn write_catalog(root: &Path) {
    std::fs::create_dir_all(root.join("packages")).unwrap();
    std::fs::write(
        root.join("catalog.json"),
        r#"{
            "sync_id": "0b7d4f52-3c4e-4c1b-8f57-2d9a6f3e1c20",
            "total_size_bytes": 9,
            "content_packages": [
                {"id": "safety-core", "name": "Safety", "priority": 0, "size_bytes": 4, "version": 1,
                 "content_type": "SAFETY"},
                {"id": "map-base", "name": "Map", "priority": 1, "size_bytes": 5, "version": 2,
                 "content_type": "MAP"}
            ]
        }"#,
    )
    .unwrap();
    std::fs::write(root.join("packages/safety-core"), b"help").unwrap();
    std::fs::write(root.join("packages/map-base"), b"roads").unwrap();
}

#[test]
fn distance_from_center_is_zero() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["distance", "--lat", "-32.551296", "--lon", "19.988442"])
        .assert()
        .success()
        .stdout(contains("0.000 km"))
        .stdout(contains("Inside"));
}

#[test]
fn distance_between_points() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["distance", "--lat", "0", "--lon", "0", "--to-lat", "0", "--to-lon", "1"])
        .assert()
        .success()
        .stdout(contains("111.19"));
}

#[test]
fn safety_is_always_granted() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["--now", PRE_EVENT, "access", "safety"])
        .assert()
        .success()
        .stdout(contains("SAFETY: GRANTED"));
}

#[test]
fn easter_egg_without_spot_is_denied() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["access", "easter-egg"])
        .args(ON_SITE)
        .assert()
        .success()
        .stdout(contains("EASTER_EGG: DENIED"));
}

#[test]
fn art_installation_found_before_event() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["--now", PRE_EVENT, "access", "art-installation"])
        .args(ON_SITE)
        .args(["--spot-lat", "-32.5513", "--spot-lon", "19.9884"])
        .assert()
        .success()
        .stdout(contains("ART_INSTALLATION: GRANTED"));

    cmd(&data)
        .args(["--now", PRE_EVENT, "access", "art-installation"])
        .args(OFF_SITE)
        .args(["--spot-lat", "-32.5513", "--spot-lon", "19.9884"])
        .assert()
        .success()
        .stdout(contains("ART_INSTALLATION: DENIED"));
}

#[test]
fn map_is_limited_before_event() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["--now", PRE_EVENT, "access", "map"])
        .assert()
        .success()
        .stdout(contains("MAP: LIMITED"));
}

#[test]
fn invalid_content_type_is_rejected() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["access", "fireworks"])
        .assert()
        .failure()
        .stderr(contains("fireworks"));
}

#[test]
fn unlock_latches_across_runs() {
    let data = tempdir().unwrap();

    cmd(&data)
        .args(["--now", PRE_EVENT, "unlock"])
        .args(OFF_SITE)
        .assert()
        .success()
        .stdout(contains("Unlock: LOCKED"));

    cmd(&data)
        .args(["--now", PRE_EVENT, "unlock"])
        .args(ON_SITE)
        .assert()
        .success()
        .stdout(contains("Unlock: UNLOCKED"));

    cmd(&data)
        .args(["--now", PRE_EVENT, "unlock"])
        .args(OFF_SITE)
        .assert()
        .success()
        .stdout(contains("Unlock: UNLOCKED"))
        .stdout(contains("Since: 2026-04-20 12:00:00 UTC"));

    cmd(&data)
        .args(["--now", PRE_EVENT, "status"])
        .assert()
        .success()
        .stdout(contains("UNLOCKED (since 2026-04-20 12:00:00 UTC)"));
}

#[test]
fn bypass_does_not_persist() {
    let data = tempdir().unwrap();

    cmd(&data)
        .args(["--now", PRE_EVENT, "unlock", "--bypass"])
        .args(OFF_SITE)
        .assert()
        .success()
        .stdout(contains("Unlock: UNLOCKED"))
        .stdout(contains("nothing persisted"));

    cmd(&data)
        .args(["--now", PRE_EVENT, "unlock"])
        .args(OFF_SITE)
        .assert()
        .success()
        .stdout(contains("Unlock: LOCKED"));
}

#[test]
fn event_start_unlocks_without_location() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["--now", "2026-04-28T10:00:00Z", "unlock"])
        .assert()
        .success()
        .stdout(contains("Unlock: UNLOCKED"));
}

#[test]
fn sync_then_status_lists_packages() {
    let data = tempdir().unwrap();
    let catalog = tempdir().unwrap();
    write_catalog(catalog.path());

    cmd(&data)
        .arg("sync")
        .arg("--catalog")
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(contains("Synced:   2"))
        .stdout(contains("+ map-base v2"))
        .stdout(contains("Storage used: 9 bytes"));

    cmd(&data)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Installed: 2 package(s)"))
        .stdout(contains("safety-core v1"))
        .stdout(contains("NEVER SYNCED").not());

    // Nothing changed in the catalog
    cmd(&data)
        .arg("sync")
        .arg("--catalog")
        .arg(catalog.path())
        .assert()
        .success()
        .stdout(contains("Synced:   0"));
}

#[test]
fn sync_respects_capacity_from_config() {
    let data = tempdir().unwrap();
    let catalog = tempdir().unwrap();
    write_catalog(catalog.path());
    std::fs::write(
        data.path().join("playa.toml"),
        format!(
            "[storage]\ncapacity_bytes = 4\n\n[sync]\ncatalog_dir = {:?}\n",
            catalog.path().display().to_string()
        ),
    )
    .unwrap();

    cmd(&data)
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("+ safety-core v1"))
        .stdout(contains("- map-base (5 bytes)"));
}

#[test]
fn sync_from_missing_catalog_is_offline() {
    let data = tempdir().unwrap();
    cmd(&data)
        .args(["sync", "--catalog"])
        .arg(data.path().join("no-such-catalog"))
        .assert()
        .failure()
        .stderr(contains("offline"));

    cmd(&data)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Last error"));
}

#[test]
fn sync_without_catalog_fails() {
    let data = tempdir().unwrap();
    cmd(&data)
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("No catalog configured"));
}

#[test]
fn explicit_config_overrides_event() {
    let data = tempdir().unwrap();
    let config = data.path().join("custom.toml");
    std::fs::write(
        &config,
        "[event]\nevent_id = \"test-burn\"\ncenter_latitude = 0.0\ncenter_longitude = 0.0\n",
    )
    .unwrap();

    cmd(&data)
        .arg("--config")
        .arg(&config)
        .args(["distance", "--lat", "0", "--lon", "0"])
        .assert()
        .success()
        .stdout(contains("0.000 km"));

    cmd(&data)
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("ID:     test-burn"));
}

#[test]
fn invalid_event_config_is_reported() {
    let data = tempdir().unwrap();
    std::fs::write(
        data.path().join("playa.toml"),
        "[event]\nstart_date = \"2026-05-03\"\nend_date = \"2026-04-27\"\n",
    )
    .unwrap();

    cmd(&data)
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("Invalid [event] configuration"));
}
