//! Output of a finished import.
//!
//! Documents are never written over their sources: each run gets a fresh
//! `<YYYY-MM-DD-HHMMSS>` directory (suffixed `-N` when that name is taken)
//! under the output root.

use crate::error::{BulkEditError, BulkEditResult};
use crate::sync::SyncReport;
use crate::tree::RecipeTree;
use chrono::Local;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "import-report.json";

/// Create a new timestamped directory under `output_root`.
pub fn create_output_dir(output_root: &Path) -> BulkEditResult<PathBuf> {
    fs::create_dir_all(output_root)?;
    let stamp = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{}-{}", stamp, attempt)
        };
        let candidate = output_root.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write every document of the tree into `dir` under its original file name.
pub fn write_documents(tree: &RecipeTree, dir: &Path) -> BulkEditResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for document in tree.documents() {
        let path = dir.join(document.file_name());
        fs::write(&path, document.to_bytes()?)?;
        tracing::debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Serialize the import report next to the documents.
pub fn write_report(report: &SyncReport, dir: &Path) -> BulkEditResult<PathBuf> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BulkEditError::Report(format!("Failed to serialize report: {}", e)))?;
    let path = dir.join(REPORT_FILE);
    fs::write(&path, json)?;
    Ok(path)
}

/// Full output step: fresh directory, documents, report.
pub fn write_output(
    tree: &RecipeTree,
    report: &SyncReport,
    output_root: &Path,
) -> BulkEditResult<PathBuf> {
    let dir = create_output_dir(output_root)?;
    write_documents(tree, &dir)?;
    write_report(report, &dir)?;
    tracing::info!("Output written to {}", dir.display());
    Ok(dir)
}
