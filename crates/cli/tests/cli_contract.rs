use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const TABLE: &str = "\u{feff}nomor;halaman;teks;x0;x1;top;bottom;font_style;font_size;sumbu\r\n\
    1;1;Nomor;10,0;50,0;100,0;112,0;Helvetica;11,0;106,0\r\n\
    2;1;Surat;60,0;90,0;101,0;113,0;Helvetica;11,0;107,0\r\n\
    3;1;Perihal;10,0;50,0;140,0;152,0;Helvetica;11,0;146,0\r\n\
    4;3;Lampiran;10,0;80,0;300,0;312,0;Helvetica;11,0;306,0\r\n";

fn fixture(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("surat.csv");
    fs::write(&path, contents).expect("fixture should be written");
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn summary_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("summary")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut value = stdout_json(&output);
    value["path"] = Value::String("<FIXTURE>".to_owned());

    assert_eq!(
        value,
        json!({
            "path": "<FIXTURE>",
            "records": 4,
            "pages": [{ "page": 1, "records": 3 }, { "page": 3, "records": 1 }],
            "skipped": []
        })
    );
}

#[test]
fn summary_reports_skipped_rows() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(
        temp.path(),
        "nomor;halaman;teks;x0;x1;top;bottom;font_style;font_size;sumbu\n\
         1;1;ok;1,0;2,0;3,0;4,0;F;1,0;3,5\n\
         2;abc;bad;1,0;2,0;3,0;4,0;F;1,0;3,5\n",
    );

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("summary")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["records"], 1);
    assert_eq!(value["skipped"][0]["line"], 3);
}

#[test]
fn group_uses_tolerance_argument() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);
    let config = temp.path().join("absent-config.json");

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("group")
        .arg(&file)
        .args(["--id", "1", "--config"])
        .arg(&config)
        .env_remove("OVERLAY_VIEWER_GROUP_TOLERANCE")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["grouped"], json!(["1", "2"]));

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("group")
        .arg(&file)
        .args(["--id", "1", "--tolerance", "0,5", "--config"])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["grouped"], json!(["1"]));
}

#[test]
fn group_reads_tolerance_from_environment() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("group")
        .arg(&file)
        .args(["--id", "2", "--config"])
        .arg(temp.path().join("absent-config.json"))
        .env("OVERLAY_VIEWER_GROUP_TOLERANCE", "0,5")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["tolerance"], 0.5);
    assert_eq!(value["grouped"], json!(["2"]));
}

#[test]
fn group_fails_for_unknown_id() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    cargo_bin_cmd!("overlay-viewer")
        .arg("group")
        .arg(&file)
        .args(["--id", "99", "--config"])
        .arg(temp.path().join("absent-config.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no record with id"));
}

#[test]
fn page_lists_records_in_table_order() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("page")
        .arg(&file)
        .args(["--page", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    let ids: Vec<&str> =
        value["records"].as_array().expect("records array").iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(value["records"][0]["midline"], 106.0);
}

#[test]
fn edit_rewrites_table_in_place() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    cargo_bin_cmd!("overlay-viewer")
        .arg("edit")
        .arg(&file)
        .args(["--id", "3", "--text", "Hal", "--page", "2"])
        .assert()
        .success();

    let written = fs::read_to_string(&file).expect("table should be readable");
    assert!(written.starts_with('\u{feff}'));
    assert!(written.contains("3;2;Hal;10,0;50,0;140,0;152,0;Helvetica;11,0;146,0\r\n"));
    assert!(!temp.path().join("surat.csv.tmp").exists());
}

#[test]
fn edit_without_changes_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);

    cargo_bin_cmd!("overlay-viewer")
        .arg("edit")
        .arg(&file)
        .args(["--id", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to change"));
}

#[test]
fn normalize_round_trips_canonical_table() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(temp.path(), TABLE);
    let output_path = temp.path().join("out").join("normalized.csv");
    fs::create_dir_all(output_path.parent().expect("parent")).expect("mkdir");

    cargo_bin_cmd!("overlay-viewer")
        .arg("normalize")
        .arg(&file)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("normalized.csv"));

    let written = fs::read_to_string(&output_path).expect("output should exist");
    assert_eq!(written, TABLE);
}

#[test]
fn ranges_prints_one_based_pages() {
    let output = cargo_bin_cmd!("overlay-viewer")
        .args(["ranges", "1, 3, 5-7", "--pages", "6"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(stdout_json(&output), json!([1, 3, 5, 6]));
}

#[test]
fn ranges_fail_on_garbage() {
    cargo_bin_cmd!("overlay-viewer")
        .args(["ranges", "1-x", "--pages", "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid page range"));
}

#[test]
fn config_prints_defaults_when_file_missing() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let output = cargo_bin_cmd!("overlay-viewer")
        .arg("config")
        .arg("--config")
        .arg(temp.path().join("absent.json"))
        .env_remove("OVERLAY_VIEWER_GROUP_TOLERANCE")
        .env_remove("OVERLAY_VIEWER_ZOOM_STEP")
        .env_remove("OVERLAY_VIEWER_WORD_CACHE_PAGES")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["group_tolerance"], 2.0);
    assert_eq!(value["zoom"]["step"], 0.2);
    assert_eq!(value["layers"]["live_coords"], true);
}

#[test]
fn summary_fails_for_missing_file() {
    cargo_bin_cmd!("overlay-viewer")
        .arg("summary")
        .arg("missing.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("overlay-viewer")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
