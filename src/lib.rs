//! Batch Bulk Edit - FactoryTalk Batch recipes through Excel
//!
//! This library loads a recipe document together with every document it
//! references, projects their `Parameter` and `FormulaValue` nodes onto
//! workbook rows keyed by FullPath, and applies edited rows back onto the
//! documents without disturbing anything the edit did not touch.
//!
//! # Example
//!
//! ```no_run
//! use ftbatch_bulk_edit::config::RunContext;
//! use ftbatch_bulk_edit::excel::{ExcelExporter, ExcelImporter};
//! use ftbatch_bulk_edit::parser::load_tree;
//! use ftbatch_bulk_edit::sync::SyncEngine;
//! use std::path::Path;
//!
//! let ctx = RunContext::default();
//! let mut tree = load_tree(Path::new("PROC.pxml"), &ctx)?;
//! ExcelExporter::new(&tree).export(Path::new("PROC.xlsx"))?;
//!
//! // ... edit the workbook ...
//!
//! let sheets = ExcelImporter::new("PROC.xlsx").import()?;
//! let report = SyncEngine::new(&ctx).sync(&mut tree, &sheets)?;
//! println!("created {}, deleted {}", report.created(), report.deleted());
//! # Ok::<(), ftbatch_bulk_edit::error::BulkEditError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod excel;
pub mod logging;
pub mod parser;
pub mod schema;
pub mod sync;
pub mod tree;
pub mod types;
pub mod writer;
pub mod xml;

// Re-export commonly used types
pub use error::{BulkEditError, BulkEditResult, ErrorKind};
pub use tree::{Document, RecipeTree};
pub use types::{Cell, Row, Sheet};
