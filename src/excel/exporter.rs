//! Excel exporter implementation

use super::{DOCUMENT_INDEX_DOCUMENT, DOCUMENT_INDEX_SHEET, DOCUMENT_INDEX_SHEET_NAME};
use crate::error::{BulkEditError, BulkEditResult};
use crate::schema::{columns_for, Field, FULL_PATH_COLUMN, TAG_TYPE_COLUMN};
use crate::tree::{Document, RecipeTree};
use crate::types::Row;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::Path;

/// Excel's limit on worksheet name length, in characters.
const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Rows written per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// `(document id, rows)` in export order.
    pub sheets: Vec<(String, usize)>,
    /// `(document id, sheet name)` for documents whose id is not a usable
    /// sheet name. Listed in the hidden index sheet.
    pub renamed: Vec<(String, String)>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|(_, rows)| rows).sum()
    }
}

/// Writes one sheet per loaded document, one row per leaf.
pub struct ExcelExporter<'a> {
    tree: &'a RecipeTree,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(tree: &'a RecipeTree) -> Self {
        Self { tree }
    }

    /// Export the tree to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> BulkEditResult<ExportSummary> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let mut sheets = Vec::new();
        let mut renamed = Vec::new();
        let mut taken: HashSet<String> = HashSet::from([DOCUMENT_INDEX_SHEET.to_lowercase()]);

        for document in self.tree.documents() {
            let sheet_name = sheet_name_for(document.id(), &taken);
            taken.insert(sheet_name.to_lowercase());
            if sheet_name != document.id() {
                tracing::warn!(
                    "Document {} exported to sheet '{}'; its id is not a valid sheet name",
                    document.id(),
                    sheet_name
                );
                renamed.push((document.id().to_string(), sheet_name.clone()));
            }
            let rows = self.export_document(&mut workbook, document, &sheet_name, &header_format)?;
            tracing::debug!("Exported {} row(s) to sheet {}", rows, sheet_name);
            sheets.push((document.id().to_string(), rows));
        }

        if !renamed.is_empty() {
            Self::write_index(&mut workbook, &renamed, &header_format)?;
        }

        workbook
            .save(output_path)
            .map_err(|e| BulkEditError::Export(format!("Failed to save Excel file: {}", e)))?;

        Ok(ExportSummary { sheets, renamed })
    }

    fn export_document(
        &self,
        workbook: &mut Workbook,
        document: &Document,
        sheet_name: &str,
        header_format: &Format,
    ) -> BulkEditResult<usize> {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name).map_err(|e| {
            BulkEditError::Export(format!(
                "Failed to name worksheet '{}' for document {}: {}",
                sheet_name,
                document.id(),
                e
            ))
        })?;

        let columns = columns_for(&document.leaf_kinds());
        for (col_idx, name) in columns.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col_idx as u16, name, header_format)
                .map_err(|e| BulkEditError::Export(format!("Failed to write header: {}", e)))?;
        }
        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| BulkEditError::Export(format!("Failed to freeze header: {}", e)))?;

        let rows = document.rows();
        for (row_idx, row) in rows.iter().enumerate() {
            Self::write_row(worksheet, (row_idx + 1) as u32, &columns, row)?;
        }
        worksheet.autofit();
        Ok(rows.len())
    }

    /// Hidden sheet mapping each renamed sheet back to its document.
    fn write_index(
        workbook: &mut Workbook,
        renamed: &[(String, String)],
        header_format: &Format,
    ) -> BulkEditResult<()> {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(DOCUMENT_INDEX_SHEET)
            .map_err(|e| BulkEditError::Export(format!("Failed to name index sheet: {}", e)))?;
        for (col_idx, title) in [DOCUMENT_INDEX_SHEET_NAME, DOCUMENT_INDEX_DOCUMENT].iter().enumerate() {
            worksheet
                .write_string_with_format(0, col_idx as u16, *title, header_format)
                .map_err(|e| BulkEditError::Export(format!("Failed to write header: {}", e)))?;
        }
        for (row_idx, (document, sheet)) in renamed.iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            for (col_idx, text) in [sheet, document].iter().enumerate() {
                worksheet
                    .write_string(excel_row, col_idx as u16, text.as_str())
                    .map_err(|e| BulkEditError::Export(format!("Failed to write cell: {}", e)))?;
            }
        }
        worksheet.set_hidden(true);
        Ok(())
    }

    /// Cells are always written as text so lexical forms like `0.` survive.
    fn write_row(
        worksheet: &mut Worksheet,
        excel_row: u32,
        columns: &[String],
        row: &Row,
    ) -> BulkEditResult<()> {
        for (col_idx, column) in columns.iter().enumerate() {
            let text = match column.as_str() {
                FULL_PATH_COLUMN => Some(row.full_path.as_str()),
                TAG_TYPE_COLUMN => Some(row.tag_type.as_str()),
                other => Field::from_column(other).and_then(|f| row.fields.text(f)),
            };
            if let Some(text) = text {
                worksheet
                    .write_string(excel_row, col_idx as u16, text)
                    .map_err(|e| BulkEditError::Export(format!("Failed to write cell: {}", e)))?;
            }
        }
        Ok(())
    }
}

/// A valid worksheet name for a document, unique (ignoring case) among
/// `taken`. Forbidden characters become `_`; long ids are cut and a `~N`
/// suffix tells clashing names apart.
pub(crate) fn sheet_name_for(id: &str, taken: &HashSet<String>) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    let base = if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("History") {
        "Document"
    } else {
        cleaned
    };

    let mut candidate = truncate(base, MAX_SHEET_NAME);
    let mut counter = 1;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!("~{}", counter);
        candidate = format!("{}{}", truncate(base, MAX_SHEET_NAME - suffix.len()), suffix);
        counter += 1;
    }
    candidate
}

fn truncate(text: &str, max_chars: usize) -> String {
    let cut: String = text.chars().take(max_chars).collect();
    cut.trim_end_matches('\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_lowercase()).collect()
    }

    #[test]
    fn test_valid_ids_are_kept() {
        assert_eq!(sheet_name_for("UP_CHARGE", &taken(&[])), "UP_CHARGE");
        assert_eq!(sheet_name_for("A-1 (copy)", &taken(&["PROC"])), "A-1 (copy)");
    }

    #[test]
    fn test_long_ids_are_cut_and_told_apart() {
        let id = "UP_ACQUISITION_AND_DOSING_LINE_01";
        let first = sheet_name_for(id, &taken(&[]));
        assert_eq!(first, "UP_ACQUISITION_AND_DOSING_LINE_");
        assert_eq!(first.chars().count(), MAX_SHEET_NAME);

        let second = sheet_name_for("UP_ACQUISITION_AND_DOSING_LINE_02", &taken(&[&first]));
        assert_eq!(second, "UP_ACQUISITION_AND_DOSING_LIN~1");
        assert!(second.chars().count() <= MAX_SHEET_NAME);
    }

    #[test]
    fn test_forbidden_characters_and_case_clashes() {
        assert_eq!(sheet_name_for("OP[1]:A", &taken(&[])), "OP_1__A");
        assert_eq!(sheet_name_for("'quoted'", &taken(&[])), "quoted");
        assert_eq!(sheet_name_for("History", &taken(&[])), "Document");
        assert_eq!(sheet_name_for("up1", &taken(&["UP1"])), "up1~1");
    }
}
