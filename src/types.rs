use crate::schema::{Field, FIELD_COUNT};

//==============================================================================
// Cells
//==============================================================================

/// A spreadsheet cell for a declared sub-field.
///
/// Paired with `Option` this gives the three states a row has to keep
/// apart: `None` (absent), `Some(Cell::Blank)` (present but empty) and
/// `Some(Cell::Text(..))` (populated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Blank,
    Text(String),
}

impl Cell {
    /// Build a cell from raw text; whitespace-only text is blank.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Cell::Blank
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Blank)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Blank => None,
            Cell::Text(s) => Some(s.as_str()),
        }
    }

    /// Text as written to the sheet (blank for `Cell::Blank`).
    pub fn as_str(&self) -> &str {
        self.text().unwrap_or("")
    }
}

/// Non-blank text of an optional cell.
pub fn populated(cell: Option<&Cell>) -> Option<&str> {
    cell.and_then(Cell::text)
}

//==============================================================================
// Field values
//==============================================================================

/// Fixed-shape record: one optional cell per schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValues {
    cells: [Option<Cell>; FIELD_COUNT],
}

impl Default for FieldValues {
    fn default() -> Self {
        Self {
            cells: std::array::from_fn(|_| None),
        }
    }
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&Cell> {
        self.cells[field.index()].as_ref()
    }

    /// Non-blank text for `field`.
    pub fn text(&self, field: Field) -> Option<&str> {
        populated(self.get(field))
    }

    pub fn set(&mut self, field: Field, cell: Cell) {
        self.cells[field.index()] = Some(cell);
    }

    pub fn set_text(&mut self, field: Field, text: &str) {
        self.set(field, Cell::from_text(text));
    }

    pub fn clear(&mut self, field: Field) {
        self.cells[field.index()] = None;
    }

    /// Present fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &Cell)> {
        Field::ALL
            .iter()
            .filter_map(move |f| self.get(*f).map(|cell| (*f, cell)))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}

//==============================================================================
// Rows
//==============================================================================

/// Flat projection of one leaf node, as exported or as read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based spreadsheet row, when the row was read from a workbook.
    pub number: Option<u32>,
    pub full_path: String,
    pub tag_type: String,
    pub fields: FieldValues,
}

impl Row {
    pub fn new(full_path: impl Into<String>, tag_type: impl Into<String>) -> Self {
        Self {
            number: None,
            full_path: full_path.into(),
            tag_type: tag_type.into(),
            fields: FieldValues::new(),
        }
    }

    /// Builder-style setter, mostly for tests and fixtures.
    pub fn with(mut self, field: Field, text: &str) -> Self {
        self.fields.set_text(field, text);
        self
    }

    /// Identity used in diagnostics: the FullPath, or the row number.
    pub fn identity(&self) -> String {
        if !self.full_path.trim().is_empty() {
            self.full_path.trim().to_string()
        } else {
            match self.number {
                Some(n) => format!("row {}", n),
                None => "-".to_string(),
            }
        }
    }
}

/// Rows read back from one workbook sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    /// Whether the header row carried the FullPath column.
    pub has_full_path_column: bool,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            has_full_path_column: true,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_from_text_trims() {
        assert_eq!(Cell::from_text("  "), Cell::Blank);
        assert_eq!(Cell::from_text(" 42 "), Cell::Text("42".to_string()));
    }

    #[test]
    fn test_field_values_three_states() {
        let mut values = FieldValues::new();
        assert!(values.get(Field::Real).is_none());

        values.set(Field::Real, Cell::Blank);
        assert_eq!(values.get(Field::Real), Some(&Cell::Blank));
        assert_eq!(values.text(Field::Real), None);

        values.set_text(Field::Real, "5");
        assert_eq!(values.text(Field::Real), Some("5"));

        values.clear(Field::Real);
        assert!(values.is_empty());
    }

    #[test]
    fn test_field_values_iter_is_canonical_order() {
        let mut values = FieldValues::new();
        values.set_text(Field::Scale, "false");
        values.set_text(Field::Name, "A");
        values.set_text(Field::Real, "1");
        let fields: Vec<Field> = values.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![Field::Name, Field::Real, Field::Scale]);
    }

    #[test]
    fn test_row_identity() {
        let row = Row::new("TEST/Parameter[A]", "Parameter");
        assert_eq!(row.identity(), "TEST/Parameter[A]");

        let mut row = Row::new("", "Parameter");
        row.number = Some(7);
        assert_eq!(row.identity(), "row 7");
    }
}
