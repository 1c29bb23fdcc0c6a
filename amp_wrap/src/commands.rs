//! Command lines of the per-sample worker.

use crate::context::RunContext;
use amp_jobs::{JobSpec, MarkerFiles};
use amp_types::ExternalCommand;
use itertools::Itertools;

/// The worker invocation for `sample`. The worker writes its tables, images
/// and `<sample>.done` marker to the alignment folder.
pub fn worker_command(ctx: &RunContext, sample: &str) -> ExternalCommand {
    let args = &ctx.args;
    let site_names = ctx.model.sites_for_sample(sample).map(|s| &s.name).join(",");
    let reads = ctx
        .model
        .reads
        .get(sample)
        .map(|r| r.joined())
        .unwrap_or_default();

    ExternalCommand::new(&ctx.params.tools.worker)
        .flag("sample", sample)
        .flag("reads", reads)
        .flag("region", args.region.display())
        .flag("sites", args.sites.display())
        .flag("site-names", site_names)
        .flag("genome", args.genome.display())
        .optional_flag("refgene", args.refgene.as_ref().map(|p| p.display()))
        .flag("outdir", ctx.layout.align_dir.display())
        .flag("min-mapq", args.min_mapq)
        .flag("min-base-quality", args.min_base_quality)
        .flag("indel-window", args.indel_window)
}

/// One job per sample, in sample order.
pub fn sample_jobs(ctx: &RunContext) -> Vec<JobSpec> {
    let markers = MarkerFiles::new(&ctx.layout.align_dir);
    ctx.model
        .samples()
        .map(|sample| JobSpec {
            sample: sample.to_string(),
            command: worker_command(ctx, sample).to_shell_string(),
            log_path: markers.log_path(sample),
        })
        .collect()
}
