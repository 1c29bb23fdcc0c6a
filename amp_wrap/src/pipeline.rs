//! The steps of a run: dispatch and monitor the sample jobs, then aggregate
//! the target sites.

use crate::commands::{sample_jobs, worker_command};
use crate::context::RunContext;
use amp_aggr::{SiteAggregator, SystemRunner, ToolRunner};
use amp_jobs::{JobMonitor, MarkerFiles};
use anyhow::{bail, Result};
use itertools::Itertools;
use log::{error, info};

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub skipped: usize,
    pub done: usize,
    pub sites: usize,
}

/// Print the worker command of every sample without running anything.
pub fn dry_run(ctx: &RunContext) {
    for sample in ctx.model.samples() {
        println!("{}", worker_command(ctx, sample));
    }
    info!(
        "inputs are valid, {} job(s) would run on the {} backend",
        ctx.model.relation.num_samples(),
        ctx.backend().name()
    );
}

pub fn run(ctx: &RunContext) -> Result<RunReport> {
    run_with(ctx, &SystemRunner)
}

/// Run with the given runner for the plotting and report programs.
pub fn run_with(ctx: &RunContext, runner: &dyn ToolRunner) -> Result<RunReport> {
    ctx.layout.create()?;

    let backend = ctx.backend();
    let markers = MarkerFiles::new(&ctx.layout.align_dir);
    let jobs = sample_jobs(ctx);
    info!(
        "running {} sample job(s) on the {} backend",
        jobs.len(),
        backend.name()
    );
    let monitor = JobMonitor::new(
        &backend,
        &markers,
        ctx.monitor_settings(),
        &ctx.layout.align_dir,
    );
    let summary = monitor.run(jobs)?;
    info!(
        "all sample jobs finished ({} done, {} skipped as already done)",
        summary.done.len(),
        summary.skipped.len()
    );

    let site_layout = ctx.layout.site_layout();
    let aggregator = SiteAggregator {
        layout: &site_layout,
        tools: &ctx.params.tools,
        alignment_view: ctx.args.alignment_view(),
        runner,
    };
    let aggregation = aggregator.aggregate_all(&ctx.model.sites, &ctx.model.relation);

    let report = RunReport {
        skipped: summary.skipped.len(),
        done: summary.done.len(),
        sites: aggregation.sites.len(),
    };
    info!(
        "run summary: {} sample(s) done, {} skipped, {} of {} site(s) aggregated",
        report.done,
        report.skipped,
        report.sites,
        ctx.model.sites.len()
    );

    if !aggregation.failures.is_empty() {
        for failure in &aggregation.failures {
            error!("{failure}: {:#}", failure.source);
        }
        bail!(
            "{} target site(s) could not be aggregated: {}",
            aggregation.failures.len(),
            aggregation.failures.iter().map(|f| &f.site).join(", ")
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context;
    use amp_aggr::TableKind;
    use amp_jobs::RunError;
    use parameters_toml::{Parameters, Plots, Tools};
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// A worker writing a one-row table of every per-sample kind.
    const FAKE_WORKER: &str = r#"#!/bin/sh
for arg in "$@"; do
    case "$arg" in
        --sample=*) sample="${arg#--sample=}" ;;
        --outdir=*) out="${arg#--outdir=}" ;;
        --site-names=*) sites="${arg#--site-names=}" ;;
    esac
done
for ext in cnt chr; do
    printf 'sample\tvalue\n%s\t1\n' "$sample" > "$out/$sample.$ext"
done
for site in $(echo "$sites" | tr ',' ' '); do
    for ext in snp pct len; do
        printf 'sample\tvalue\n%s\t1\n' "$sample" > "$out/${sample}_${site}.$ext"
    done
    touch "$out/${sample}_${site}.png"
done
touch "$out/$sample.done"
"#;

    fn params(worker: &Path) -> Parameters {
        let plots = Plots {
            read_count: Some("true".to_string()),
            chromosome: Some("true".to_string()),
            snp: Some("true".to_string()),
            indel: Some("true".to_string()),
            length: Some("true".to_string()),
            alignment_view: Some("true".to_string()),
            hdr: Some("true".to_string()),
        };
        Parameters {
            tools: Tools {
                worker: worker.display().to_string(),
                report: Some("true".to_string()),
                spreadsheet: None,
                plots,
            },
            ..Parameters::default()
        }
    }

    fn write_worker(dir: &Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("worker.sh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_local_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let worker = write_worker(dir.path(), FAKE_WORKER);
        let ctx = context(dir.path(), &[], params(&worker));

        let report = run(&ctx)?;
        assert_eq!(
            report,
            RunReport {
                skipped: 0,
                done: 2,
                sites: 1
            }
        );

        let site_dir = ctx.layout.deliverables_dir.join("siteA");
        for kind in TableKind::ALL {
            let table = kind.site_table(&site_dir, "siteA");
            let expected = matches!(
                kind,
                TableKind::ReadCount
                    | TableKind::Chromosome
                    | TableKind::Snp
                    | TableKind::Indel
                    | TableKind::Length
            );
            assert_eq!(table.exists(), expected, "{kind}");
        }
        assert_eq!(
            std::fs::read_to_string(TableKind::Snp.site_table(&site_dir, "siteA"))?,
            "sample\tvalue\ns1\t1\ns2\t1\n"
        );
        assert!(site_dir.join("s2_siteA.png").exists());

        // A second run finds both samples done.
        let report = run(&ctx)?;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.done, 0);
        Ok(())
    }

    #[test]
    fn test_failed_job_stops_before_aggregation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let worker = write_worker(dir.path(), "#!/bin/sh\necho broken >&2\nexit 1\n");
        let ctx = context(dir.path(), &[], params(&worker));

        let err = run(&ctx).unwrap_err();
        match err.downcast_ref::<RunError>() {
            Some(RunError::JobsFailed { samples, .. }) => assert_eq!(samples, &["s1", "s2"]),
            _ => panic!("unexpected {err:#}"),
        }
        assert_eq!(
            std::fs::read_to_string(ctx.layout.align_dir.join("s1.log"))?,
            "broken\n"
        );
        assert!(!ctx.layout.deliverables_dir.join("siteA").exists());
        Ok(())
    }
}
