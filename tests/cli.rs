use assert_cmd::Command;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("granary 0.3.0\n");
}

// Prepare subcommand tests

fn prepare_sample(root: &std::path::Path) -> std::path::PathBuf {
    let out = root.join("out");
    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args([
        "prepare",
        "tests/fixtures/sample.csv",
        "--cache-dir",
        root.join("cache").to_str().unwrap(),
        "--output-dir",
        out.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Prepared dataset"))
        .stdout(predicates::str::contains("train"));
    out
}

#[test]
fn prepare_materializes_a_csv_file() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    assert!(out.join("dataset_info.json").is_file());
    assert!(out.join("train-00000-of-00001.parquet").is_file());
}

#[test]
fn prepare_rejects_unknown_verification_modes() {
    let root = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args([
        "prepare",
        "tests/fixtures/sample.csv",
        "--cache-dir",
        root.path().join("cache").to_str().unwrap(),
        "--verification",
        "paranoid",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("unknown verification mode"));
}

#[test]
fn prepare_rejects_missing_inputs() {
    let root = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args([
        "prepare",
        "no_such_file.csv",
        "--cache-dir",
        root.path().join("cache").to_str().unwrap(),
    ]);
    cmd.assert().failure();
}

// Inspect subcommand tests

#[test]
fn inspect_shows_schema_and_rows() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args(["inspect", out.to_str().unwrap(), "--rows", "2"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("columns:"))
        .stdout(predicates::str::contains("score"))
        .stdout(predicates::str::contains("first 2 row(s)"))
        .stdout(predicates::str::contains("alice"));
}

#[test]
fn inspect_json_output_is_machine_readable() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args([
        "inspect",
        out.to_str().unwrap(),
        "--rows",
        "1",
        "--output",
        "json",
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"config_name\": \"default\""))
        .stdout(predicates::str::contains("\"num_examples\": 4"));
}

// Verify subcommand tests

#[test]
fn verify_passes_on_untouched_output() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args(["verify", out.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Verification passed"));
}

#[test]
fn verify_catches_tampered_shards() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    // Corrupt the shard: the footer is gone, and the byte size changed.
    let shard = out.join("train-00000-of-00001.parquet");
    let mut bytes = std::fs::read(&shard).unwrap();
    bytes.extend_from_slice(b"garbage");
    std::fs::write(&shard, bytes).unwrap();

    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args(["verify", out.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("do not match"))
        .stderr(predicates::str::contains("train"));
}

// Card subcommand tests

#[test]
fn card_writes_a_readme_stub() {
    let root = tempfile::tempdir().unwrap();
    let out = prepare_sample(root.path());

    let mut cmd = Command::cargo_bin("granary").unwrap();
    cmd.args([
        "card",
        out.to_str().unwrap(),
        "--pretty-name",
        "Sample Rows",
        "--license",
        "mit",
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Wrote dataset card"));

    let readme = std::fs::read_to_string(out.join("README.md")).unwrap();
    assert!(readme.starts_with("---\n"));
    assert!(readme.contains("pretty_name: Sample Rows"));
    assert!(readme.contains("license: mit"));
    assert!(readme.contains("n<1K"));
    assert!(readme.contains("# Sample Rows"));
}
