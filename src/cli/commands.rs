use crate::config::RunContext;
use crate::error::{BulkEditResult, ErrorKind};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::logging;
use crate::parser::load_tree;
use crate::sync::{SyncEngine, SyncReport};
use crate::tree::RecipeTree;
use crate::writer;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// How a command finished, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Everything applied.
    Success,
    /// Output written, but some rows were reported.
    Partial,
}

impl CommandStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::Partial => 2,
        }
    }
}

/// Execute the xml2excel command
pub fn xml2excel(ctx: &RunContext, xml: &Path, excel: &Path) -> BulkEditResult<CommandStatus> {
    println!("{}", "Batch Bulk Edit - XML to Excel".bold().green());
    println!("   Recipe: {}", xml.display());
    println!("   Output: {}\n", excel.display());

    let tree = load_tree(xml, ctx)?;
    print_documents(&tree);

    let summary = ExcelExporter::new(&tree).export(excel)?;

    println!("{}", "Export complete".bold().green());
    for (sheet, rows) in &summary.sheets {
        println!("   {} {} row(s)", sheet.bright_blue().bold(), rows);
    }
    for (document, sheet) in &summary.renamed {
        println!(
            "   {} {} written to sheet '{}'",
            "note:".yellow(),
            document.bright_blue().bold(),
            sheet
        );
    }
    println!("   Excel file: {}\n", excel.display());
    Ok(CommandStatus::Success)
}

/// Execute the excel2xml command
pub fn excel2xml(
    ctx: &RunContext,
    xml: &Path,
    excel: &Path,
    output_dir: Option<PathBuf>,
) -> BulkEditResult<CommandStatus> {
    println!("{}", "Batch Bulk Edit - Excel to XML".bold().green());
    println!("   Recipe:   {}", xml.display());
    println!("   Workbook: {}\n", excel.display());

    let mut tree = load_tree(xml, ctx)?;
    print_documents(&tree);

    let sheets = ExcelImporter::new(excel).import()?;
    let report = SyncEngine::new(ctx).sync(&mut tree, &sheets)?;
    logging::log_issues(&report.issues);

    let output_root = output_dir.unwrap_or_else(|| ctx.config.output_root_for(xml));
    let dir = writer::write_output(&tree, &report, &output_root)?;

    print_report(&report);
    println!("   Output directory: {}\n", dir.display());

    if report.issues.is_empty() {
        println!("{}", "Import complete".bold().green());
        Ok(CommandStatus::Success)
    } else {
        println!(
            "{}",
            format!(
                "Import finished with {} issue(s); see the log or {}",
                report.issues.len(),
                writer::REPORT_FILE
            )
            .yellow()
            .bold()
        );
        Ok(CommandStatus::Partial)
    }
}

fn print_documents(tree: &RecipeTree) {
    println!("   Loaded {} document(s)", tree.len());
    for document in tree.documents() {
        println!(
            "      {} ({} leaves)",
            document.id().cyan(),
            document.leaves().len()
        );
    }
    println!();
}

fn print_report(report: &SyncReport) {
    println!("{}", "Changes:".bold().cyan());
    println!("   Created: {}", report.created().to_string().green());
    println!(
        "   Updated: {} ({} changed)",
        report.updated(),
        report.changed().to_string().green()
    );
    println!("   Deleted: {}", report.deleted().to_string().red());
    println!("   Deferrals: {}", report.deferrals());

    for name in &report.skipped_sheets {
        println!("   {} sheet '{}' matches no document", "Skipped".yellow(), name);
    }
    for id in &report.untouched_documents {
        println!("   {} document '{}' left untouched", "Note".yellow(), id);
    }

    let rejected: Vec<_> = report.issues.iter().filter(|i| i.rejects_row()).collect();
    let advisories = report.issues_of(ErrorKind::UnresolvedDeferral);
    if !rejected.is_empty() {
        println!("\n{}", format!("Rejected rows ({}):", rejected.len()).red().bold());
        for issue in rejected {
            println!("   {}", issue.log_line());
        }
    }
    if !advisories.is_empty() {
        println!("\n{}", format!("Warnings ({}):", advisories.len()).yellow().bold());
        for issue in advisories {
            println!("   {}", issue.log_line());
        }
    }
    println!();
}
