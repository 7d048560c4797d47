//! Log sink setup for the binary.
//!
//! Console output goes to stderr at INFO (DEBUG with `--debug`). In debug
//! mode a plain-text copy is also appended to the configured log file.
//! `RUST_LOG` overrides the level either way.

use crate::config::RunContext;
use crate::error::BulkEditResult;
use crate::sync::RowIssue;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events reach the sinks: the library and the binary.
const LOG_TARGETS: [&str; 2] = ["ftbatch_bulk_edit", "batch_bulk_edit"];

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn init(ctx: &RunContext) -> BulkEditResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(ctx.debug)));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let file_layer = if ctx.debug {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&ctx.config.log_file)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
    } else {
        None
    };

    // A second initialisation in the same process keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();
    Ok(())
}

/// Emit the stable per-row diagnostic line for each issue.
pub fn log_issues(issues: &[RowIssue]) {
    for issue in issues {
        if issue.kind.is_advisory() {
            tracing::warn!("{}", issue.log_line());
        } else {
            tracing::error!("{}", issue.log_line());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_binary_events() {
        assert_eq!(default_directive(false), "ftbatch_bulk_edit=info,batch_bulk_edit=info");
        assert_eq!(default_directive(true), "ftbatch_bulk_edit=debug,batch_bulk_edit=debug");
        assert!(default_directive(true).parse::<EnvFilter>().is_ok());
    }
}
