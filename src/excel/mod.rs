//! Workbook boundary
//!
//! - Export: recipe tree → Excel (.xlsx), one sheet per document
//! - Import: Excel (.xlsx) → rows keyed by FullPath
//!
//! A document whose id cannot be a sheet name is written under a derived
//! name and listed in a hidden index sheet, which the importer reads back.

mod exporter;
mod importer;

pub use exporter::{ExcelExporter, ExportSummary};

/// Hidden sheet listing documents exported under a different sheet name.
pub const DOCUMENT_INDEX_SHEET: &str = "_DocumentIndex";
pub const DOCUMENT_INDEX_SHEET_NAME: &str = "Sheet";
pub const DOCUMENT_INDEX_DOCUMENT: &str = "Document";
pub use importer::ExcelImporter;
