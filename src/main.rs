use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use ftbatch_bulk_edit::cli::{self, CommandStatus};
use ftbatch_bulk_edit::config::{Config, RunContext};
use ftbatch_bulk_edit::logging;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "batch-bulk-edit")]
#[command(about = "Bulk edit FactoryTalk Batch recipes through an Excel workbook")]
#[command(long_about = "Batch Bulk Edit - round-trip recipe XML through Excel

Export a procedure (.pxml) and every unit procedure / operation it
references into one workbook, edit the rows, and import them back.
Rows are keyed by FullPath: a missing row deletes its node, a new row
creates one, every other row updates its node in place.

COMMANDS:
  xml2excel   - Recipe XML to Excel (.xlsx)
  excel2xml   - Edited Excel back to recipe XML

EXIT STATUS:
  0  success
  2  output written, some rows were rejected or warned about
  1  nothing written (unreadable input, missing or cyclic reference)

EXAMPLES:
  batch-bulk-edit xml2excel --xml PROC.pxml --excel PROC.xlsx
  batch-bulk-edit excel2xml --xml PROC.pxml --excel PROC.xlsx")]
#[command(version)]
struct Cli {
    /// Verbose logging, also written to the log file
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: ./batch-bulk-edit.yaml if present)
    #[arg(long, global = true, env = "BULK_EDIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export recipe documents to an Excel workbook
    Xml2excel {
        /// Root recipe document (.pxml, .uxml or .oxml)
        #[arg(long)]
        xml: PathBuf,

        /// Workbook to create
        #[arg(long)]
        excel: PathBuf,
    },

    /// Apply an edited workbook to the recipe documents
    Excel2xml {
        /// Root recipe document the workbook was exported from
        #[arg(long)]
        xml: PathBuf,

        /// Edited workbook
        #[arg(long)]
        excel: PathBuf,

        /// Parent directory for the timestamped output folder
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> anyhow::Result<CommandStatus> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let ctx = RunContext::new(config, cli.debug);
    logging::init(&ctx).context("Failed to initialise logging")?;

    let status = match cli.command {
        Commands::Xml2excel { xml, excel } => cli::xml2excel(&ctx, &xml, &excel)?,
        Commands::Excel2xml {
            xml,
            excel,
            output_dir,
        } => cli::excel2xml(&ctx, &xml, &excel, output_dir)?,
    };
    Ok(status)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}
