//! The two ways a per-sample job can be executed.

use crate::errors::SubmissionError;
use crate::queue::{ClusterQueue, SubmitRequest};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

/// A fully formed per-sample job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub sample: String,
    /// Shell command line of the worker.
    pub command: String,
    /// Combined stdout and stderr of the job go here.
    pub log_path: PathBuf,
}

/// What happened when a job was handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The job already ran to completion.
    Finished(ExitStatus),
    /// The job is waiting in the cluster queue under this name.
    Queued { job_name: String },
}

/// Runs every job inline, one after the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    fn run(&self, job: &JobSpec) -> Result<ExitStatus> {
        let log = File::create(&job.log_path)
            .with_context(|| format!("creating {}", job.log_path.display()))?;
        let log_err = log
            .try_clone()
            .with_context(|| format!("duplicating handle of {}", job.log_path.display()))?;
        Command::new("sh")
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .with_context(|| format!("running `{}`", job.command))
    }
}

/// Submits every job to a batch queue.
pub struct ClusterBackend {
    pub queue: Box<dyn ClusterQueue>,
    /// Cores reserved for each job.
    pub cores: usize,
    /// Prepended to the sample name to form the job name. Unique per run.
    pub job_prefix: String,
}

impl std::fmt::Debug for ClusterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterBackend")
            .field("cores", &self.cores)
            .field("job_prefix", &self.job_prefix)
            .finish_non_exhaustive()
    }
}

impl ClusterBackend {
    pub fn job_name(&self, sample: &str) -> String {
        format!("{}{sample}", self.job_prefix)
    }

    /// Names of this run's jobs that the queue still knows about.
    pub fn live_jobs(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .queue
            .live_jobs()?
            .into_iter()
            .filter(|name| name.starts_with(&self.job_prefix))
            .collect())
    }

    pub fn cancel(&self, job_names: &[String]) {
        self.queue.cancel(job_names);
    }
}

#[derive(Debug)]
pub enum Backend {
    Local(LocalBackend),
    Cluster(ClusterBackend),
}

impl Backend {
    pub fn submit(&self, job: &JobSpec) -> Result<Submission, SubmissionError> {
        match self {
            Backend::Local(local) => local
                .run(job)
                .map(Submission::Finished)
                .map_err(|source| SubmissionError::Dispatch {
                    sample: job.sample.clone(),
                    source,
                }),
            Backend::Cluster(cluster) => {
                let job_name = cluster.job_name(&job.sample);
                cluster.queue.submit(&SubmitRequest {
                    sample: &job.sample,
                    job_name: &job_name,
                    cores: cluster.cores,
                    log_path: &job.log_path,
                    command: &job.command,
                })?;
                Ok(Submission::Queued { job_name })
            }
        }
    }

    /// True if jobs keep running after `submit` returns.
    pub fn is_async(&self) -> bool {
        matches!(self, Backend::Cluster(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "local",
            Backend::Cluster(_) => "sge",
        }
    }
}
