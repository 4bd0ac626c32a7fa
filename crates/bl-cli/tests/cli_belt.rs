use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_beltline"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("beltline_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn belt_args<'a>(input: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "belt",
        "--input",
        input,
        "--confidence-level",
        "0.9",
        "--scan-points",
        "3",
        "--toys-factor",
        "0.04",
        "--seed",
        "11",
        "--threads",
        "1",
    ];
    args.extend_from_slice(extra);
    args
}

fn assert_belt_contract(v: &serde_json::Value) {
    let cl = v
        .get("confidence_level")
        .and_then(|x| x.as_f64())
        .expect("confidence_level should be a number");
    assert!((cl - 0.9).abs() < 1e-12);

    let points = v.get("points").and_then(|x| x.as_array()).expect("points should be an array");
    assert_eq!(points.len(), 3);

    let mut last_mu = f64::NEG_INFINITY;
    for p in points {
        let mu = p
            .get("point")
            .and_then(|sp| sp.get("poi_value"))
            .and_then(|x| x.as_f64())
            .expect("poi_value should be a number");
        assert!(mu > last_mu, "grid must ascend");
        last_mu = mu;

        let threshold =
            p.get("threshold").and_then(|x| x.as_f64()).expect("threshold should be a number");
        assert!(threshold.is_finite() && threshold >= 0.0);

        let n_valid =
            p.get("n_valid").and_then(|x| x.as_u64()).expect("n_valid should be an integer");
        assert!(n_valid > 0);
    }
}

#[test]
fn belt_writes_valid_json_to_stdout() {
    let input = fixture_path("counting_workspace.json");
    assert!(input.exists(), "missing fixture: {}", input.display());

    let out = run(&belt_args(input.to_string_lossy().as_ref(), &[]));
    assert!(
        out.status.success(),
        "belt should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON");
    assert_belt_contract(&v);
}

#[test]
fn persisted_belt_feeds_the_limit_command() {
    let input = fixture_path("counting_workspace.json");
    let input = input.to_string_lossy();
    let belt_file = tmp_path("belt.json");

    let out = run(&belt_args(
        input.as_ref(),
        &["--output", belt_file.to_string_lossy().as_ref()],
    ));
    assert!(
        out.status.success(),
        "belt should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(belt_file.exists());

    let out = run(&[
        "limit",
        "--input",
        input.as_ref(),
        "--belt",
        belt_file.to_string_lossy().as_ref(),
        "--confidence-level",
        "0.9",
        "--band-toys",
        "8",
        "--seed",
        "11",
        "--threads",
        "1",
    ]);
    assert!(
        out.status.success(),
        "limit with a persisted belt should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON");
    assert!(v.get("bands").is_some());

    let _ = std::fs::remove_file(&belt_file);
}

#[test]
fn mismatched_belt_level_is_rejected() {
    let input = fixture_path("counting_workspace.json");
    let input = input.to_string_lossy();
    let belt_file = tmp_path("belt_cl90.json");

    let out = run(&belt_args(
        input.as_ref(),
        &["--output", belt_file.to_string_lossy().as_ref()],
    ));
    assert!(out.status.success());

    // The belt was built at CL=0.9; asking for 0.95 must fail loudly.
    let out = run(&[
        "limit",
        "--input",
        input.as_ref(),
        "--belt",
        belt_file.to_string_lossy().as_ref(),
        "--confidence-level",
        "0.95",
        "--band-toys",
        "8",
        "--threads",
        "1",
    ]);
    assert!(!out.status.success(), "expected failure for belt/analysis CL mismatch");

    let _ = std::fs::remove_file(&belt_file);
}
