//! Excel round-trip tests: export to a real .xlsx, read it back, sync

use calamine::{open_workbook, Data, Reader, Xlsx};
use ftbatch_bulk_edit::config::RunContext;
use ftbatch_bulk_edit::excel::{ExcelExporter, ExcelImporter, DOCUMENT_INDEX_SHEET};
use ftbatch_bulk_edit::schema::Field;
use ftbatch_bulk_edit::sync::SyncEngine;
use ftbatch_bulk_edit::{Document, ErrorKind, RecipeTree};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tempfile::TempDir;

const PROC_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RecipeElement xmlns="urn:Rockwell/MasterRecipe">
  <RecipeElementID>PROC</RecipeElementID>
  <Parameter>
    <Name>BATCH_SIZE</Name>
    <Real>0.</Real>
    <EngineeringUnits>kg</EngineeringUnits>
  </Parameter>
  <Steps>
    <Step>
      <Name>UP1:1</Name>
      <StepRecipeID>UP1</StepRecipeID>
    </Step>
  </Steps>
</RecipeElement>
"#;

const UP1_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RecipeElement xmlns="urn:Rockwell/MasterRecipe">
  <RecipeElementID>UP1</RecipeElementID>
  <Steps>
    <Step>
      <Name>CHARGE:1</Name>
      <FormulaValue>
        <Name>AMOUNT</Name>
        <Display>true</Display>
        <Value/>
        <Real>12.50</Real>
        <FormulaValueLimit Verification="High_Low">
          <LowValue>0.</LowValue>
          <HighValue>100</HighValue>
        </FormulaValueLimit>
      </FormulaValue>
      <FormulaValue>
        <Name>MODE</Name>
        <EnumerationSet>Modes</EnumerationSet>
        <EnumerationMember>Auto</EnumerationMember>
      </FormulaValue>
    </Step>
  </Steps>
</RecipeElement>
"#;

fn tree() -> RecipeTree {
    let mut tree = RecipeTree::new();
    tree.add(Document::parse(Path::new("PROC.pxml"), PROC_XML.as_bytes()).unwrap())
        .unwrap();
    tree.add(Document::parse(Path::new("UP1.uxml"), UP1_XML.as_bytes()).unwrap())
        .unwrap();
    tree
}

fn cell(range: &calamine::Range<Data>, row: usize, col: usize) -> String {
    match range.get((row, col)) {
        Some(Data::String(s)) => s.clone(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EXPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_export_one_sheet_per_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("PROC.xlsx");
    let summary = ExcelExporter::new(&tree()).export(&path).unwrap();

    assert_eq!(
        summary.sheets,
        vec![("PROC".to_string(), 1), ("UP1".to_string(), 2)]
    );
    assert_eq!(summary.total_rows(), 3);

    let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["PROC".to_string(), "UP1".to_string()]);

    let range = workbook.worksheet_range("PROC").unwrap();
    assert_eq!(cell(&range, 0, 0), "FullPath");
    assert_eq!(cell(&range, 0, 1), "TagType");
    let header: Vec<String> = (0..range.width()).map(|c| cell(&range, 0, c)).collect();
    // Only Parameter leaves here: no FormulaValue-only columns.
    assert!(header.contains(&"EngineeringUnits".to_string()));
    assert!(!header.contains(&"Defer".to_string()));
    assert!(!header.iter().any(|h| h.starts_with("FormulaValueLimit_")));
    assert_eq!(cell(&range, 1, 0), "PROC/Parameter[BATCH_SIZE]");

    let range = workbook.worksheet_range("UP1").unwrap();
    let header: Vec<String> = (0..range.width()).map(|c| cell(&range, 0, c)).collect();
    assert!(header.contains(&"FormulaValueLimit_Verification".to_string()));
    assert!(header.contains(&"Defer".to_string()));
}

#[test]
fn test_export_keeps_lexical_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("PROC.xlsx");
    ExcelExporter::new(&tree()).export(&path).unwrap();

    let sheets = ExcelImporter::new(&path).import().unwrap();
    let proc_sheet = sheets.iter().find(|s| s.name == "PROC").unwrap();
    assert_eq!(proc_sheet.rows[0].number, Some(2));
    assert_eq!(proc_sheet.rows[0].fields.text(Field::Real), Some("0."));

    let up1 = sheets.iter().find(|s| s.name == "UP1").unwrap();
    let amount = &up1.rows[0];
    assert_eq!(amount.full_path, "UP1/Steps/Step[CHARGE:1]/FormulaValue[AMOUNT]");
    assert_eq!(amount.tag_type, "FormulaValue");
    assert_eq!(amount.fields.text(Field::Real), Some("12.50"));
    assert_eq!(amount.fields.text(Field::LimitVerification), Some("High_Low"));
    assert_eq!(amount.fields.text(Field::LimitLow), Some("0."));
    assert_eq!(amount.fields.text(Field::Value), None);

    let mode = &up1.rows[1];
    assert_eq!(mode.fields.text(Field::EnumerationSet), Some("Modes"));
    assert_eq!(mode.fields.text(Field::EnumerationMember), Some("Auto"));
}

#[test]
fn test_plain_export_has_no_index_sheet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("PROC.xlsx");
    let summary = ExcelExporter::new(&tree()).export(&path).unwrap();
    assert!(summary.renamed.is_empty());

    let workbook: Xlsx<_> = open_workbook(&path).unwrap();
    assert!(!workbook.sheet_names().contains(&DOCUMENT_INDEX_SHEET.to_string()));
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND TRIP THROUGH THE WORKBOOK
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_workbook_round_trip_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("PROC.xlsx");
    let mut tree = tree();
    ExcelExporter::new(&tree).export(&path).unwrap();

    let sheets = ExcelImporter::new(&path).import().unwrap();
    let ctx = RunContext::default();
    let report = SyncEngine::new(&ctx).sync(&mut tree, &sheets).unwrap();

    assert!(report.issues.is_empty(), "{:?}", report.issues);
    assert_eq!(report.changed(), 0);
    assert_eq!(
        String::from_utf8(tree.get("PROC").unwrap().to_bytes().unwrap()).unwrap(),
        PROC_XML
    );
    assert_eq!(
        String::from_utf8(tree.get("UP1").unwrap().to_bytes().unwrap()).unwrap(),
        UP1_XML
    );
}

#[test]
fn test_hand_edited_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("edited.xlsx");

    // Numbers typed as numbers, an extra notes column and a stray sheet.
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("PROC").unwrap();
    for (col, title) in ["FullPath", "TagType", "Name", "Real", "EngineeringUnits", "Notes"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    sheet.write_string(1, 0, "PROC/Parameter[BATCH_SIZE]").unwrap();
    sheet.write_string(1, 1, "Parameter").unwrap();
    sheet.write_number(1, 3, 250.0).unwrap();
    sheet.write_string(1, 5, "raised for the big reactor").unwrap();
    // Row 3 left empty on purpose.
    sheet.write_string(3, 0, "PROC/Parameter[NEW_ONE]").unwrap();
    sheet.write_string(3, 1, "Parameter").unwrap();
    sheet.write_number(3, 3, 1.25).unwrap();
    workbook.add_worksheet().set_name("Sheet1").unwrap();
    workbook.save(&path).unwrap();

    let sheets = ExcelImporter::new(&path).import().unwrap();
    let proc_sheet = sheets.iter().find(|s| s.name == "PROC").unwrap();
    assert_eq!(proc_sheet.rows.len(), 2);
    assert_eq!(proc_sheet.rows[0].fields.text(Field::Real), Some("250"));
    assert_eq!(proc_sheet.rows[1].number, Some(4));

    let mut tree = tree();
    let ctx = RunContext::default();
    let report = SyncEngine::new(&ctx).sync(&mut tree, &sheets).unwrap();

    assert_eq!(report.skipped_sheets, vec!["Sheet1".to_string()]);
    assert_eq!(report.untouched_documents, vec!["UP1".to_string()]);
    assert_eq!(report.created(), 1);
    assert_eq!(report.issues_of(ErrorKind::UnmatchedSheet).len(), 1);

    let out = String::from_utf8(tree.get("PROC").unwrap().to_bytes().unwrap()).unwrap();
    assert!(out.contains("<Real>250</Real>"));
    assert!(out.contains("<EngineeringUnits>kg</EngineeringUnits>"));
    assert!(out.contains("<Name>NEW_ONE</Name>"));
    assert!(out.contains("<Real>1.25</Real>"));
}

#[test]
fn test_long_document_id_round_trips() {
    const LONG_ID: &str = "UP_ACQUISITION_AND_DOSING_LINE_01";
    let xml = UP1_XML.replace("<RecipeElementID>UP1</RecipeElementID>", "<RecipeElementID>LONG</RecipeElementID>");
    let mut tree = RecipeTree::new();
    tree.add(Document::parse(Path::new(&format!("{}.uxml", LONG_ID)), xml.as_bytes()).unwrap())
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.xlsx");
    let summary = ExcelExporter::new(&tree).export(&path).unwrap();
    assert_eq!(summary.sheets, vec![(LONG_ID.to_string(), 2)]);
    assert_eq!(
        summary.renamed,
        vec![(LONG_ID.to_string(), "UP_ACQUISITION_AND_DOSING_LINE_".to_string())]
    );

    let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["UP_ACQUISITION_AND_DOSING_LINE_".to_string(), DOCUMENT_INDEX_SHEET.to_string()]
    );
    let index = workbook.worksheet_range(DOCUMENT_INDEX_SHEET).unwrap();
    assert_eq!(cell(&index, 1, 0), "UP_ACQUISITION_AND_DOSING_LINE_");
    assert_eq!(cell(&index, 1, 1), LONG_ID);

    let sheets = ExcelImporter::new(&path).import().unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, LONG_ID);

    let ctx = RunContext::default();
    let report = SyncEngine::new(&ctx).sync(&mut tree, &sheets).unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    assert!(report.skipped_sheets.is_empty());
    assert_eq!(report.changed(), 0);
    assert_eq!(
        String::from_utf8(tree.get(LONG_ID).unwrap().to_bytes().unwrap()).unwrap(),
        xml
    );
}
