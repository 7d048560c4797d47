//! CLI Integration Tests
//!
//! Runs the `batch-bulk-edit` binary end to end against fixture recipes.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PROC_XML: &str = "<RecipeElement xmlns=\"urn:Rockwell/MasterRecipe\">
  <RecipeElementID>PROC</RecipeElementID>
  <Parameter>
    <Name>BATCH_SIZE</Name>
    <Real>100</Real>
  </Parameter>
  <Steps>
    <Step>
      <Name>UP1:1</Name>
      <StepRecipeID>UP1</StepRecipeID>
    </Step>
  </Steps>
</RecipeElement>
";

const UP1_XML: &str = "<RecipeElement xmlns=\"urn:Rockwell/MasterRecipe\">
  <RecipeElementID>UP1</RecipeElementID>
  <Steps>
    <Step>
      <Name>CHARGE:1</Name>
      <FormulaValue>
        <Name>AMOUNT</Name>
        <Real>5</Real>
      </FormulaValue>
    </Step>
  </Steps>
</RecipeElement>
";

fn fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("PROC.pxml"), PROC_XML).unwrap();
    fs::write(dir.path().join("UP1.uxml"), UP1_XML).unwrap();
    let root = dir.path().join("PROC.pxml");
    (dir, root)
}

fn bin(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("batch-bulk-edit").unwrap();
    cmd.current_dir(dir)
        .env_remove("BULK_EDIT_CONFIG")
        .env_remove("BULK_EDIT_OUTPUT_ROOT")
        .env_remove("BULK_EDIT_STRICT_SHEETS");
    cmd
}

/// The single timestamped directory created under `root`.
fn output_dir(root: &Path) -> PathBuf {
    let dirs: Vec<PathBuf> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "expected one output directory, got {:?}", dirs);
    dirs.into_iter().next().unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    bin(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("xml2excel"))
        .stdout(predicate::str::contains("excel2xml"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    bin(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("batch-bulk-edit"));
}

#[test]
fn test_missing_arguments_fail() {
    let dir = TempDir::new().unwrap();
    bin(dir.path()).arg("xml2excel").assert().failure();
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND TRIP
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_xml2excel_then_excel2xml() {
    let (dir, root) = fixture();
    let excel = dir.path().join("PROC.xlsx");
    let out = dir.path().join("out");

    bin(dir.path())
        .args(["xml2excel", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .success()
        .stdout(predicate::str::contains("Export complete"))
        .stdout(predicate::str::contains("UP1"));
    assert!(excel.exists());

    bin(dir.path())
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Import complete"));

    let written = output_dir(&out);
    assert_eq!(fs::read_to_string(written.join("PROC.pxml")).unwrap(), PROC_XML);
    assert_eq!(fs::read_to_string(written.join("UP1.uxml")).unwrap(), UP1_XML);

    let report = fs::read_to_string(written.join("import-report.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert!(json["issues"].as_array().unwrap().is_empty());
    assert_eq!(json["sheets"].as_array().unwrap().len(), 2);

    // Sources are never overwritten.
    assert_eq!(fs::read_to_string(&root).unwrap(), PROC_XML);
}

#[test]
fn test_default_output_next_to_root_document() {
    let (dir, root) = fixture();
    let excel = dir.path().join("PROC.xlsx");

    bin(dir.path())
        .args(["xml2excel", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .success();
    bin(dir.path())
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .success();

    let written = output_dir(&dir.path().join("converted-outputs"));
    assert!(written.join("PROC.pxml").is_file());
}

#[test]
fn test_rejected_rows_exit_partial() {
    let (dir, root) = fixture();
    let excel = dir.path().join("edited.xlsx");
    let out = dir.path().join("out");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("PROC").unwrap();
    for (col, title) in ["FullPath", "TagType", "Real", "Integer"].iter().enumerate() {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    sheet.write_string(1, 0, "PROC/Parameter[BATCH_SIZE]").unwrap();
    sheet.write_string(1, 1, "Parameter").unwrap();
    sheet.write_string(1, 2, "200").unwrap();
    sheet.write_string(1, 3, "2").unwrap();
    workbook.save(&excel).unwrap();

    bin(dir.path())
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("AmbiguousValueType"));

    let written = output_dir(&out);
    // The rejected row keeps its node as it was.
    assert_eq!(fs::read_to_string(written.join("PROC.pxml")).unwrap(), PROC_XML);
    let report = fs::read_to_string(written.join("import-report.json")).unwrap();
    assert!(report.contains("AmbiguousValueType"));
}

// ═══════════════════════════════════════════════════════════════════════════
// FATAL ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_reference_exits_1_without_output() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("PROC.pxml");
    fs::write(&root, PROC_XML).unwrap();
    let excel = dir.path().join("PROC.xlsx");

    bin(dir.path())
        .args(["xml2excel", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("UnresolvedReference"));
    assert!(!excel.exists());
}

#[test]
fn test_missing_workbook_exits_1() {
    let (dir, root) = fixture();
    let out = dir.path().join("out");

    bin(dir.path())
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(dir.path().join("nope.xlsx"))
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
    assert!(!out.exists());
}

#[test]
fn test_strict_sheets_from_env() {
    let (dir, root) = fixture();
    let excel = dir.path().join("stray.xlsx");
    let out = dir.path().join("out");

    let mut workbook = Workbook::new();
    workbook.add_worksheet().set_name("Sheet1").unwrap();
    workbook.save(&excel).unwrap();

    bin(dir.path())
        .env("BULK_EDIT_STRICT_SHEETS", "true")
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("UnmatchedSheet"));
    assert!(!out.exists());
}

#[test]
fn test_config_file_sets_output_root() {
    let (dir, root) = fixture();
    let excel = dir.path().join("PROC.xlsx");
    fs::write(
        dir.path().join("batch-bulk-edit.yaml"),
        "output_root: from-config\n",
    )
    .unwrap();

    bin(dir.path())
        .args(["xml2excel", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .success();
    bin(dir.path())
        .args(["excel2xml", "--xml"])
        .arg(&root)
        .arg("--excel")
        .arg(&excel)
        .assert()
        .success();

    let written = output_dir(&dir.path().join("from-config"));
    assert!(written.join("UP1.uxml").is_file());
}
