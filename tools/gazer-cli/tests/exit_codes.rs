//! End-to-end runs of the `gazer` binary on synthetic input.

use std::path::Path;
use std::process::{Command, Output};

fn gazer(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gazer"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .output()
        .expect("run gazer")
}

#[test]
fn no_arguments_prints_help() {
    let home = tempfile::tempdir().unwrap();
    let out = gazer(home.path(), &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("--input"));
}

#[test]
fn invalid_arguments_exit_with_one() {
    let home = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().to_str().unwrap();

    let missing_output = gazer(home.path(), &["-i", "synthetic://16x16"]);
    assert_eq!(missing_output.status.code(), Some(1));

    let missing_input = gazer(home.path(), &["-o", out, "-i", "/no/such/clip.mov"]);
    assert_eq!(missing_input.status.code(), Some(1));

    let bad_flag = gazer(home.path(), &["-o", out, "--frobnicate"]);
    assert_eq!(bad_flag.status.code(), Some(1));

    let bad_scale = gazer(
        home.path(),
        &["-o", out, "-i", "synthetic://16x16?frames=2", "-s", "0", "--gpu", "software"],
    );
    assert_eq!(bad_scale.status.code(), Some(1));
    assert!(!out_dir.path().join("analysis.jsonl").exists());
}

#[test]
fn empty_input_exits_with_255() {
    let home = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let out = gazer(
        home.path(),
        &[
            "-o",
            out_dir.path().to_str().unwrap(),
            "-i",
            "synthetic://16x16?frames=0",
            "--gpu",
            "software",
        ],
    );
    assert_eq!(out.status.code(), Some(255));
}

#[test]
fn synthetic_run_writes_one_analysis_line_per_frame() {
    let home = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let out = gazer(
        home.path(),
        &[
            "-o",
            out_dir.path().to_str().unwrap(),
            "-i",
            "synthetic://64x48?frames=6",
            "--gpu",
            "software",
            "-s",
            "1.5",
        ],
    );
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let log = std::fs::read_to_string(out_dir.path().join("analysis.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[5]["sequence"], 5);
    assert!(lines[1]["motion"]["energy"].as_f64().unwrap() > 0.0);
    assert!(!out_dir.path().join(".gazer").exists());
}
