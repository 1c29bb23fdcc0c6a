//! amplicon-runner
#![deny(missing_docs)]

use amp_jobs::RunError;
use amp_wrap::args::RunArgs;
use amp_wrap::context::RunContext;
use amp_wrap::logging::init_logging;
use amp_wrap::pipeline;
use amp_wrap::utils::{print_error_chain, terminate_process_group};
use anyhow::Result;
use clap::Parser;
use log::info;
use std::process::ExitCode;

const CMD: &str = "amplicon-runner";

/// Analyze CRISPR edits in multiplexed amplicon sequencing data.
#[derive(Parser, Debug)]
#[clap(name = CMD, version)]
struct AmpliconRunner {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug)]
enum SubCommand {
    /// Validate the inputs, run one job per sample and aggregate the results
    /// per target site.
    #[clap(name = "run")]
    Run(RunArgs),

    /// Validate the inputs and print the job of every sample.
    #[clap(name = "check")]
    Check(RunArgs),
}

fn inner_main() -> Result<ExitCode> {
    let opts = AmpliconRunner::parse();
    let (args, dry) = match opts.subcmd {
        SubCommand::Run(args) => {
            let dry = args.dry;
            (args, dry)
        }
        SubCommand::Check(args) => (args, true),
    };
    init_logging(args.verbose);

    let ctx = RunContext::new(args)?;
    if dry {
        pipeline::dry_run(&ctx);
        return Ok(ExitCode::SUCCESS);
    }
    let report = pipeline::run(&ctx)?;
    info!(
        "results of {} target site(s) are in {}",
        report.sites,
        ctx.layout.deliverables_dir.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            print_error_chain(&err);
            if matches!(err.downcast_ref::<RunError>(), Some(RunError::Watchdog { .. })) {
                terminate_process_group();
            }
            ExitCode::FAILURE
        }
    }
}
