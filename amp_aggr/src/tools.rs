//! Command lines of the plotting, report and spreadsheet programs.

use amp_types::ExternalCommand;
use anyhow::Result;
use std::path::Path;
use std::process::ExitStatus;

/// Runs an external program to completion.
pub trait ToolRunner {
    fn run(&self, command: &ExternalCommand) -> Result<ExitStatus>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> Result<ExitStatus> {
        command.status()
    }
}

pub fn plot_command(program: &str, table: &Path, site: &str, site_dir: &Path) -> ExternalCommand {
    ExternalCommand::new(program)
        .flag("table", table.display())
        .flag("site", site)
        .flag("outdir", site_dir.display())
}

/// The HDR plot also needs the intended edits.
pub fn hdr_plot_command(
    program: &str,
    table: &Path,
    site: &str,
    site_dir: &Path,
    edits: &str,
) -> ExternalCommand {
    plot_command(program, table, site, site_dir).flag("edits", edits)
}

pub fn report_command(program: &str, site_dir: &Path, site: &str) -> ExternalCommand {
    ExternalCommand::new(program)
        .flag("site", site)
        .flag("dir", site_dir.display())
}

pub fn spreadsheet_command(program: &str, table: &Path) -> ExternalCommand {
    ExternalCommand::new(program)
        .arg(table)
        .arg(format!("{}.xlsx", table.display()))
}
