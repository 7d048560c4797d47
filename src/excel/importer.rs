//! Excel importer implementation

use super::DOCUMENT_INDEX_SHEET;
use crate::error::{BulkEditError, BulkEditResult};
use crate::schema::{Field, FULL_PATH_COLUMN, TAG_TYPE_COLUMN};
use crate::types::{Cell, Row, Sheet};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Meaning of one header cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    FullPath,
    TagType,
    Field(Field),
    Ignored,
}

/// Reads every sheet of an edited workbook back into rows.
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn import(&self) -> BulkEditResult<Vec<Sheet>> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            BulkEditError::Workbook(format!(
                "Failed to open Excel file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let sheet_names = workbook.sheet_names().to_vec();
        let documents = if sheet_names.iter().any(|n| n == DOCUMENT_INDEX_SHEET) {
            let range = workbook.worksheet_range(DOCUMENT_INDEX_SHEET).map_err(|e| {
                BulkEditError::Workbook(format!("Failed to read sheet '{}': {}", DOCUMENT_INDEX_SHEET, e))
            })?;
            read_document_index(&range)
        } else {
            HashMap::new()
        };

        let mut sheets = Vec::new();
        for sheet_name in sheet_names.iter().filter(|n| *n != DOCUMENT_INDEX_SHEET) {
            let range = workbook.worksheet_range(sheet_name).map_err(|e| {
                BulkEditError::Workbook(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;
            let document = documents.get(sheet_name).map_or(sheet_name.as_str(), String::as_str);
            if document != sheet_name {
                tracing::debug!("Sheet {} holds document {}", sheet_name, document);
            }
            let sheet = read_sheet(document, &range);
            tracing::debug!("Read {} row(s) from sheet {}", sheet.rows.len(), sheet_name);
            sheets.push(sheet);
        }
        Ok(sheets)
    }
}

/// Sheet name to document id, from the index sheet's rows below its header.
fn read_document_index(range: &Range<Data>) -> HashMap<String, String> {
    range
        .rows()
        .skip(1)
        .filter_map(|row| {
            let sheet = row.first().map(cell_text)?.trim().to_string();
            let document = row.get(1).map(cell_text)?.trim().to_string();
            (!sheet.is_empty() && !document.is_empty()).then_some((sheet, document))
        })
        .collect()
}

/// Convert one worksheet; the first row of the used range is the header.
pub(crate) fn read_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut rows_iter = range.rows();
    let Some(header) = rows_iter.next() else {
        let mut sheet = Sheet::new(name, Vec::new());
        sheet.has_full_path_column = false;
        return sheet;
    };

    let columns: Vec<Column> = header
        .iter()
        .map(|cell| {
            let title = cell_text(cell);
            match title.trim() {
                FULL_PATH_COLUMN => Column::FullPath,
                TAG_TYPE_COLUMN => Column::TagType,
                other => match Field::from_column(other) {
                    Some(field) => Column::Field(field),
                    None => {
                        if !other.is_empty() {
                            tracing::debug!("Sheet {}: ignoring column '{}'", name, other);
                        }
                        Column::Ignored
                    }
                },
            }
        })
        .collect();

    let first_row = range.start().map(|(row, _)| row).unwrap_or(0);
    let mut rows = Vec::new();
    for (offset, cells) in rows_iter.enumerate() {
        if cells.iter().all(|c| cell_text(c).trim().is_empty()) {
            continue;
        }
        // Header is at `first_row`; data starts one below, 1-based for users.
        let mut row = Row::new("", "");
        row.number = Some(first_row + offset as u32 + 2);
        for (column, cell) in columns.iter().zip(cells.iter()) {
            let text = cell_text(cell);
            match column {
                Column::FullPath => row.full_path = text.trim().to_string(),
                Column::TagType => row.tag_type = text.trim().to_string(),
                Column::Field(field) => row.fields.set(*field, Cell::from_text(&text)),
                Column::Ignored => {}
            }
        }
        rows.push(row);
    }

    let mut sheet = Sheet::new(name, rows);
    sheet.has_full_path_column = columns.contains(&Column::FullPath);
    sheet
}

/// Text form of a cell; whole floats lose their `.0` so typed-in numbers
/// match the integer text the document uses.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(cells: &[&[Data]]) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn test_cell_text_conversions() {
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
        assert_eq!(cell_text(&Data::Float(0.5)), "0.5");
        assert_eq!(cell_text(&Data::Int(-3)), "-3");
        assert_eq!(cell_text(&Data::Bool(false)), "false");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn test_document_index_rows() {
        let index = range(&[
            &[s("Sheet"), s("Document")],
            &[s("UP_ACQUISITION_AND_DOSING_LINE_"), s("UP_ACQUISITION_AND_DOSING_LINE_01")],
            &[s(""), s("ORPHAN")],
        ]);
        let documents = read_document_index(&index);
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents.get("UP_ACQUISITION_AND_DOSING_LINE_").map(String::as_str),
            Some("UP_ACQUISITION_AND_DOSING_LINE_01")
        );
    }

    #[test]
    fn test_read_sheet_maps_columns() {
        let range = range(&[
            &[s("FullPath"), s("TagType"), s("Name"), s("Real"), s("Notes")],
            &[s("T/Parameter[A]"), s("Parameter"), s("A"), Data::Float(5.0), s("x")],
            &[Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty],
            &[s("T/Parameter[B]"), s("Parameter"), s("B"), Data::Empty, Data::Empty],
        ]);
        let sheet = read_sheet("T", &range);
        assert!(sheet.has_full_path_column);
        assert_eq!(sheet.rows.len(), 2);

        let a = &sheet.rows[0];
        assert_eq!(a.number, Some(2));
        assert_eq!(a.full_path, "T/Parameter[A]");
        assert_eq!(a.fields.text(Field::Real), Some("5"));

        let b = &sheet.rows[1];
        assert_eq!(b.number, Some(4));
        assert_eq!(b.fields.get(Field::Real), Some(&Cell::Blank));
        assert_eq!(b.fields.get(Field::Integer), None);
    }

    #[test]
    fn test_read_sheet_without_full_path() {
        let range = range(&[&[s("Name"), s("Real")], &[s("A"), s("1")]]);
        let sheet = read_sheet("T", &range);
        assert!(!sheet.has_full_path_column);
    }
}
