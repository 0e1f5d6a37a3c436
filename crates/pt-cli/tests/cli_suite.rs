use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_petabtests"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("petabtests_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run(root: &Path, args: &[&str]) -> Output {
    let cases = root.join("cases");
    let models = root.join("models");
    Command::new(bin_path())
        .current_dir(root)
        .args(["--cases-dir", cases.to_str().unwrap(), "--models-dir", models.to_str().unwrap()])
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const CASE: &str = r#"
id: 1
brief: Simulation. Nothing special.
description: Two data points.
observables:
  - columns: [observableId, observableFormula, noiseFormula, noiseDistribution]
    rows:
      - [obs_a, A, 0.5, normal]
measurements:
  - columns: [observableId, time, measurement]
    rows:
      - [obs_a, 0, 0.7]
      - [obs_a, 10, 0.1]
parameters:
  columns: [parameterId, lowerBound, upperBound, nominalValue, estimate]
  rows:
    - [a0, 0, 10, 1, true]
    - [b0, 0, 10, 0, true]
    - [k1, 0, 10, 0.8, true]
    - [k2, 0, 10, 0.6, true]
simulations:
  - formula: conversion_a(t, a0, b0, k1, k2)
"#;

fn suite(name: &str) -> PathBuf {
    let root = tmp_dir(name);
    let models = root.join("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("conversion_reaction.xml"), "<sbml/>\n").unwrap();
    std::fs::write(models.join("conversion_reaction.py"), "# pysb\n").unwrap();
    let case_dir = root.join("cases/v2.0.0/sbml/0001");
    std::fs::create_dir_all(&case_dir).unwrap();
    std::fs::write(case_dir.join("case.yaml"), CASE).unwrap();
    root
}

fn stdout_json(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&out.stdout)))
}

#[test]
fn create_list_clear() {
    let root = suite("create");

    let out = run(&root, &["create"]);
    assert!(out.status.success(), "create failed, stderr={}", String::from_utf8_lossy(&out.stderr));
    let report = stdout_json(&out);
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert!(report["failed"].as_array().unwrap().is_empty());
    assert!(root.join("cases/v2.0.0/sbml/0001/_0001_solution.yaml").is_file());

    let out = run(&root, &["list", "--petab-version", "v2.0.0", "--format", "sbml"]);
    assert!(out.status.success());
    let list = stdout_json(&out);
    assert_eq!(list[0]["cases"][0], "0001");

    let out = run(&root, &["clear"]);
    assert!(out.status.success());
    assert_eq!(stdout_json(&out)["removed"], 7);
    assert!(!root.join("cases/v2.0.0/sbml/0001/_0001.yaml").exists());
}

#[test]
fn evaluate_reference_against_itself() {
    let root = suite("evaluate");
    let out = run(&root, &["create"]);
    assert!(out.status.success(), "create failed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let case_dir = root.join("cases/v2.0.0/sbml/0001");
    let solution = case_dir.join("_0001_solution.yaml");
    let args = ["evaluate", "--petab-version", "v2.0.0", "--format", "sbml", "--case", "1", "--result"];

    let mut good = args.to_vec();
    good.push(solution.to_str().unwrap());
    let out = run(&root, &good);
    assert!(out.status.success(), "evaluate failed, stderr={}", String::from_utf8_lossy(&out.stderr));
    let report = stdout_json(&out);
    assert_eq!(report["passed"], true);
    assert_eq!(report["case"], "0001");

    // a result without chi2 fails but still prints a report
    let result = root.join("result.yaml");
    std::fs::write(
        &result,
        "simulation_files: [cases/v2.0.0/sbml/0001/_simulations.tsv]\nllh: null\n",
    )
    .unwrap();
    let mut bad = args.to_vec();
    bad.push(result.to_str().unwrap());
    let out = run(&root, &bad);
    assert!(!out.status.success());
    let report = stdout_json(&out);
    assert_eq!(report["chi2"], false);
    assert_eq!(report["simulations"], true);
}

#[test]
fn failing_case_gives_nonzero_exit() {
    let root = suite("failing");
    let broken = root.join("cases/v2.0.0/sbml/0002");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("case.yaml"), CASE.replace("obs_a, 0, 0.7", "obs_x, 0, 0.7").replace("id: 1", "id: 2"))
        .unwrap();

    let out = run(&root, &["create"]);
    assert!(!out.status.success());
    let report = stdout_json(&out);
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert_eq!(report["failed"].as_array().unwrap().len(), 1);

    let out = run(&root, &["create", "--fail-fast"]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn version_subcommand() {
    let out = Command::new(bin_path()).arg("version").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("petabtests "));
}
