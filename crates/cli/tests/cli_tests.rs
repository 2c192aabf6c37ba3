//! End-to-end tests for the `sitemaster` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

const SITES: &str = "\
SR_NUM,Hospital,STATE,CITY,POSTAL_CODE,ADDRESS_LINE_1,COUNTRY
101,Mercy Hospital,CA,Fresno,93701,1 Main St.,United States
102,County Clinic,CA,Oakland,94601,77 Elm Ave,United States
103,MERCY HOSPITAL,CA,Fresno,93701,1 Main Street,United States
104,St. Agnes Medical,CA,Fresno,93720,900 Herndon Ave,United States
105,County Clinic,CA,Oakland,94601,77 Elm Ave.,United States
201,Apollo Hospital,TN,Chennai,600006,21 Greams Ln,India
202,Apollo Hospitals,TN,Chennai,600006,21 Greams Lane,India
";

fn pipeline(extra: &str) -> String {
    format!(
        r#"
name = "cli-test"

[input]
file = "sites.csv"
id_column = "SR_NUM"

[input.rename]
"Hospital" = "SITE_NAME"

[batching]
max_size = 2
{extra}
"#
    )
}

fn setup(dir: &Path, config: &str) -> std::path::PathBuf {
    fs::write(dir.join("sites.csv"), SITES).unwrap();
    let path = dir.join("pipeline.toml");
    fs::write(&path, config).unwrap();
    path
}

fn sitemaster(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sitemaster"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sitemaster")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

#[test]
fn validate_accepts_good_config() {
    let dir = tempdir().unwrap();
    let config = setup(dir.path(), &pipeline(""));
    let out = sitemaster(&["validate", config.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    assert!(stderr(&out).contains("valid: pipeline 'cli-test'"));
}

#[test]
fn validate_rejects_zero_batch_size() {
    let dir = tempdir().unwrap();
    let config = setup(dir.path(), &pipeline("").replace("max_size = 2", "max_size = 0"));
    let out = sitemaster(&["validate", config.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("max_size"));
}

#[test]
fn missing_config_is_read_error() {
    let out = sitemaster(&["validate", "/nonexistent/pipeline.toml"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn run_writes_artifacts_and_json_summary() {
    let dir = tempdir().unwrap();
    let config = setup(dir.path(), &pipeline(""));
    let out = sitemaster(&["run", config.to_str().unwrap(), "--json", "-q"]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["name"], "cli-test");
    let countries = summary["countries"].as_array().unwrap();
    assert_eq!(countries.len(), 2);
    assert_eq!(countries[0]["country"], "United_States");
    assert_eq!(countries[0]["records"], 5);
    assert_eq!(countries[0]["masters"], 3);
    assert_eq!(countries[1]["country"], "India");
    assert_eq!(countries[1]["masters"], 1);

    let master_data = dir.path().join("Master_Data");
    for name in [
        "United_States_Master.csv",
        "United_States_Raw_Cross_Ref.csv",
        "United_States_Cross_Ref_Full_Report.csv",
        "India_Master.csv",
    ] {
        assert!(master_data.join(name).exists(), "{name}");
    }
    let xref = fs::read_to_string(master_data.join("United_States_Raw_Cross_Ref.csv")).unwrap();
    assert!(xref.lines().any(|l| l.starts_with("101,103,")));
}

#[test]
fn run_single_country_into_output_root() {
    let dir = tempdir().unwrap();
    let out_root = dir.path().join("out");
    let config = setup(dir.path(), &pipeline(""));
    let out = sitemaster(&[
        "run",
        config.to_str().unwrap(),
        "--country",
        "India",
        "--output",
        out_root.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    assert!(out_root.join("Master_Data/India_Master.csv").exists());
    assert!(!out_root.join("Master_Data/United_States_Master.csv").exists());
    assert!(stderr(&out).contains("India: 2 records -> 1 masters"));
}

#[test]
fn unknown_country_is_usage_error() {
    let dir = tempdir().unwrap();
    let config = setup(dir.path(), &pipeline(""));
    let out = sitemaster(&["run", config.to_str().unwrap(), "--country", "Peru"]);
    assert_eq!(out.status.code(), Some(2));
    let err = stderr(&out);
    assert!(err.contains("no records for country 'Peru'"));
    assert!(err.contains("hint:  input has: United_States, India"));
}

#[cfg(unix)]
#[test]
fn failing_command_scorer_aborts_run() {
    let dir = tempdir().unwrap();
    let config = setup(
        dir.path(),
        &pipeline(
            r#"
[scorer]
kind = "command"
command = "sh"
args = ["-c", "echo 'scorer exploded' >&2; exit 7", "scorer"]
"#,
        ),
    );
    let out = sitemaster(&["run", config.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(20));
    let err = stderr(&out);
    assert!(err.contains("exit 7"));
    assert!(err.contains("scorer exploded"));
    assert!(!dir
        .path()
        .join("Master_Data/United_States_Master.csv")
        .exists());
}

#[test]
fn missing_input_file_is_input_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(&path, pipeline("")).unwrap();
    let out = sitemaster(&["run", path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(10));
}
