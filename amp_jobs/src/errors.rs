use itertools::Itertools;
use std::path::PathBuf;
use std::time::Duration;

/// Handing a job to the execution backend failed. This points at the
/// infrastructure rather than the sample, so the whole run stops.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(
        "The job of sample {sample} was rejected ({status}) by `{command}`:\n{output}\n\
         Please check the cluster configuration."
    )]
    Rejected {
        sample: String,
        command: String,
        status: String,
        output: String,
    },

    #[error("Unable to dispatch the job of sample {sample}")]
    Dispatch {
        sample: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Every way a run can end without all samples completing.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(
        "{} sample(s) failed: {}\nPlease check the log files in {log_dir:?}.",
        samples.len(),
        samples.join(", ")
    )]
    JobsFailed {
        samples: Vec<String>,
        log_dir: PathBuf,
    },

    #[error(
        "Gave up after {}s with {} unfinished sample(s): {}\nPlease check the log files in {log_dir:?}.",
        elapsed.as_secs(),
        pending.len(),
        pending.join(", ")
    )]
    Timeout {
        pending: Vec<String>,
        elapsed: Duration,
        log_dir: PathBuf,
    },

    #[error(
        "None of the {} submitted job(s) are in the cluster queue and none of them wrote a \
         log file to {log_dir:?}. The cluster appears to have dropped the submissions: {}",
        job_names.len(),
        job_names.iter().join(", ")
    )]
    Watchdog {
        job_names: Vec<String>,
        log_dir: PathBuf,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
