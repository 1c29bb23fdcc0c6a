use anyhow::{Context, Result};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Marker suffix written by the worker on success.
pub const DONE_SUFFIX: &str = "done";
/// Marker suffix written on failure.
pub const FAILED_SUFFIX: &str = "failed";
pub const LOG_SUFFIX: &str = "log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Pending,
    Submitted,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// Where the monitor learns about the state of a sample's job.
///
/// `query` only ever reports `Pending`, `Done` or `Failed`; `Submitted` is
/// tracked by the monitor itself.
pub trait JobStatusSource {
    fn query(&self, sample: &str) -> JobState;

    /// True once the job has written its log.
    fn has_log(&self, sample: &str) -> bool;

    /// Forget a previous failed attempt before the sample is dispatched again.
    fn clear_stale(&self, sample: &str) -> Result<()>;

    /// Record that the job failed.
    fn mark_failed(&self, sample: &str) -> Result<()>;
}

/// Job state derived from `<sample>.done` / `<sample>.failed` files in a
/// shared directory.
#[derive(Debug, Clone)]
pub struct MarkerFiles {
    dir: PathBuf,
}

impl MarkerFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MarkerFiles { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, sample: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{sample}.{suffix}"))
    }

    pub fn done_path(&self, sample: &str) -> PathBuf {
        self.path(sample, DONE_SUFFIX)
    }

    pub fn failed_path(&self, sample: &str) -> PathBuf {
        self.path(sample, FAILED_SUFFIX)
    }

    pub fn log_path(&self, sample: &str) -> PathBuf {
        self.path(sample, LOG_SUFFIX)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

impl JobStatusSource for MarkerFiles {
    fn query(&self, sample: &str) -> JobState {
        if self.done_path(sample).exists() {
            JobState::Done
        } else if self.failed_path(sample).exists() {
            JobState::Failed
        } else {
            JobState::Pending
        }
    }

    fn has_log(&self, sample: &str) -> bool {
        self.log_path(sample).exists()
    }

    fn clear_stale(&self, sample: &str) -> Result<()> {
        remove_if_exists(&self.failed_path(sample))?;
        remove_if_exists(&self.log_path(sample))
    }

    fn mark_failed(&self, sample: &str) -> Result<()> {
        let path = self.failed_path(sample);
        File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(())
    }
}
