//! Everything a run needs, built once and passed to every step.

use crate::args::{JobMode, RunArgs};
use amp_aggr::SiteLayout;
use amp_jobs::{Backend, ClusterBackend, LocalBackend, MonitorSettings, SgeQueue};
use amp_types::{validate_inputs, ExperimentModel};
use anyhow::{Context, Result};
use log::info;
use parameters_toml::Parameters;
use std::path::{Path, PathBuf};

/// Output folders of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub outdir: PathBuf,
    /// Markers, logs and per-sample tables and images.
    pub align_dir: PathBuf,
    /// One folder per target site.
    pub deliverables_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(outdir: &Path) -> Self {
        OutputLayout {
            outdir: outdir.to_path_buf(),
            align_dir: outdir.join("align"),
            deliverables_dir: outdir.join("deliverables"),
        }
    }

    pub fn create(&self) -> Result<()> {
        for dir in [&self.align_dir, &self.deliverables_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Unable to create the output folder {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn site_layout(&self) -> SiteLayout {
        SiteLayout {
            align_dir: self.align_dir.clone(),
            deliverables_dir: self.deliverables_dir.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RunContext {
    pub args: RunArgs,
    pub params: Parameters,
    pub model: ExperimentModel,
    pub layout: OutputLayout,
    /// Distinguishes the cluster jobs of this run from other runs.
    pub run_id: String,
}

impl RunContext {
    /// Load the parameters and validate the inputs.
    pub fn new(args: RunArgs) -> Result<RunContext> {
        let params = Parameters::load(args.parameters.as_deref())?;
        RunContext::with_parameters(args, params)
    }

    pub fn with_parameters(args: RunArgs, params: Parameters) -> Result<RunContext> {
        let model = validate_inputs(&args.input_files(), &params.fastq_suffixes)?;
        info!(
            "validated {} sample(s) and {} target site(s) on {} {}",
            model.relation.num_samples(),
            model.sites.len(),
            model.amplicon.gene_symbol,
            model.amplicon.region()
        );
        let layout = OutputLayout::new(&args.outdir);
        let run_id = args
            .id
            .clone()
            .unwrap_or_else(|| std::process::id().to_string());
        Ok(RunContext {
            args,
            params,
            model,
            layout,
            run_id,
        })
    }

    /// Job names of this run start with this.
    pub fn job_prefix(&self) -> String {
        format!("{}{}_", self.params.cluster.job_prefix, self.run_id)
    }

    pub fn backend(&self) -> Backend {
        match self.args.jobmode {
            JobMode::Local => Backend::Local(LocalBackend),
            JobMode::Sge => {
                let cluster = &self.params.cluster;
                Backend::Cluster(ClusterBackend {
                    queue: Box::new(SgeQueue {
                        submit_program: cluster.submit_program.clone(),
                        status_program: cluster.status_program.clone(),
                        delete_program: cluster.delete_program.clone(),
                        parallel_environment: cluster.parallel_environment.clone(),
                        queue: cluster.queue.clone(),
                    }),
                    cores: cluster.cores,
                    job_prefix: self.job_prefix(),
                })
            }
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.params.poll_interval(),
            timeout: self.params.timeout(),
            watchdog_grace: self.params.watchdog_grace(),
        }
    }
}
