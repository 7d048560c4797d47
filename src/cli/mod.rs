//! CLI command handlers

pub mod commands;

pub use commands::{excel2xml, xml2excel, CommandStatus};
