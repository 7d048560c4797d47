use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BulkEditResult<T> = Result<T, BulkEditError>;

/// Failures that abort a run before any output is produced.
#[derive(Error, Debug)]
pub enum BulkEditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error in {}: {message}", path.display())]
    Xml { path: PathBuf, message: String },

    #[error(
        "UnresolvedReference: {} references '{reference}' but {} does not exist",
        parent.display(),
        expected.display()
    )]
    UnresolvedReference {
        parent: PathBuf,
        reference: String,
        expected: PathBuf,
    },

    #[error("CyclicReference: {}", cycle.join(" -> "))]
    CyclicReference { cycle: Vec<String> },

    #[error(
        "Duplicate document identifier '{id}': {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateDocument {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Excel export error: {0}")]
    Export(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("UnmatchedSheet: workbook sheet '{0}' matches no loaded document")]
    UnmatchedSheet(String),
}

impl BulkEditError {
    /// Taxonomy kind for failures that belong to it.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BulkEditError::UnresolvedReference { .. } => Some(ErrorKind::UnresolvedReference),
            BulkEditError::CyclicReference { .. } => Some(ErrorKind::CyclicReference),
            BulkEditError::UnmatchedSheet(_) => Some(ErrorKind::UnmatchedSheet),
            _ => None,
        }
    }
}

/// Error taxonomy shared by fatal errors and row-scoped issues.
///
/// The `Display` form is part of the log line format and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnresolvedReference,
    CyclicReference,
    AmbiguousValueType,
    MissingValueType,
    OrphanInsertion,
    UnresolvedDeferral,
    InvalidValue,
    MalformedRow,
    DuplicateRow,
    UnmatchedSheet,
}

impl ErrorKind {
    /// Fatal kinds abort the whole run; everything else is collected.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::UnresolvedReference | ErrorKind::CyclicReference
        )
    }

    /// Advisory kinds are reported but do not reject the row.
    pub fn is_advisory(self) -> bool {
        matches!(self, ErrorKind::UnresolvedDeferral | ErrorKind::UnmatchedSheet)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnresolvedReference => "UnresolvedReference",
            ErrorKind::CyclicReference => "CyclicReference",
            ErrorKind::AmbiguousValueType => "AmbiguousValueType",
            ErrorKind::MissingValueType => "MissingValueType",
            ErrorKind::OrphanInsertion => "OrphanInsertion",
            ErrorKind::UnresolvedDeferral => "UnresolvedDeferral",
            ErrorKind::InvalidValue => "InvalidValue",
            ErrorKind::MalformedRow => "MalformedRow",
            ErrorKind::DuplicateRow => "DuplicateRow",
            ErrorKind::UnmatchedSheet => "UnmatchedSheet",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
