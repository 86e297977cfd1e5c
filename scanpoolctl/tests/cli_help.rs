use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const SCANPOOL_VARS: [&str; 6] = [
    "SCANPOOL_CONFIG",
    "SCANPOOL_POOL_SIZE",
    "SCANPOOL_LATENCY_WINDOW",
    "SCANPOOL_THROTTLE_FACTOR",
    "SCANPOOL_DECODE_TIMEOUT",
    "SCANPOOL_FAULT_POLICY",
];

fn scanpoolctl() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("scanpoolctl");
    for var in SCANPOOL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn top_level_help_lists_commands() {
    let output = scanpoolctl()
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for command in ["decode", "bench", "config"] {
        assert!(text.contains(command), "help missing '{command}'");
    }
    assert!(text.contains("--pool-size"), "help missing --pool-size");
}

#[test]
fn bench_help_mentions_rate_flags() {
    scanpoolctl()
        .args(["bench", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fps"))
        .stdout(predicate::str::contains("--hit-rate"));
}

#[test]
fn config_show_prints_file_values_and_flag_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("scanpool.toml");
    fs::write(
        &path,
        "[pool]\npool_size = 3\nthrottle_factor = 1.5\ndecode_timeout = \"250ms\"\n",
    )
    .expect("write config");

    scanpoolctl()
        .args(["config", "show", "--config"])
        .arg(&path)
        .args(["--fault-policy", "respawn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[pool]"))
        .stdout(predicate::str::contains("pool_size = 3"))
        .stdout(predicate::str::contains("throttle_factor = 1.5"))
        .stdout(predicate::str::contains("decode_timeout = \"250ms\""))
        .stdout(predicate::str::contains("fault_policy = \"respawn\""));
}

#[test]
fn environment_overrides_reach_config_show() {
    scanpoolctl()
        .args(["config", "show"])
        .env("SCANPOOL_POOL_SIZE", "5")
        .env("SCANPOOL_LATENCY_WINDOW", "4")
        .assert()
        .success()
        .stdout(predicate::str::contains("pool_size = 5"))
        .stdout(predicate::str::contains("latency_window = 4"));
}

#[test]
fn missing_explicit_config_fails() {
    scanpoolctl()
        .args(["config", "show", "--config", "does/not/exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file missing"));
}

#[test]
fn malformed_environment_value_fails() {
    scanpoolctl()
        .args(["config", "show"])
        .env("SCANPOOL_THROTTLE_FACTOR", "fast")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SCANPOOL_THROTTLE_FACTOR"));
}

#[test]
fn bench_reports_counters() {
    scanpoolctl()
        .args([
            "bench",
            "--frames",
            "20",
            "--fps",
            "200",
            "--min-latency-ms",
            "1",
            "--max-latency-ms",
            "4",
            "--pool-size",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted:"))
        .stdout(predicate::str::contains("frames offered:   20"));
}

#[test]
fn decode_rejects_unreadable_images() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("not-an-image.png");
    fs::write(&path, b"definitely not a png").expect("write");

    scanpoolctl()
        .arg("decode")
        .arg(&path)
        .args(["--pool-size", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open image"));
}
