//! Dispatching all jobs of a run and polling them to completion.

use crate::backend::{Backend, ClusterBackend, JobSpec, Submission};
use crate::errors::RunError;
use crate::status::{JobState, JobStatusSource};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Pause between two scans of the marker files.
    pub poll_interval: Duration,
    /// Ceiling on the time spent polling.
    pub timeout: Duration,
    /// How long the watchdog waits before declaring the submissions lost.
    pub watchdog_grace: Duration,
}

/// Samples of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Already done before the run started.
    pub skipped: Vec<String>,
    /// Dispatched and finished successfully.
    pub done: Vec<String>,
}

pub struct JobMonitor<'a> {
    pub backend: &'a Backend,
    pub status: &'a dyn JobStatusSource,
    pub settings: MonitorSettings,
    /// Mentioned in error messages so the user knows where to look.
    pub log_dir: PathBuf,
}

impl<'a> JobMonitor<'a> {
    pub fn new(
        backend: &'a Backend,
        status: &'a dyn JobStatusSource,
        settings: MonitorSettings,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        JobMonitor {
            backend,
            status,
            settings,
            log_dir: log_dir.into(),
        }
    }

    /// Dispatch every job in sample order and block until all of them are
    /// done or failed.
    pub fn run(&self, mut jobs: Vec<JobSpec>) -> Result<RunSummary, RunError> {
        jobs.sort_by(|a, b| a.sample.cmp(&b.sample));

        let mut summary = RunSummary::default();
        let mut states = BTreeMap::new();
        let mut job_names = Vec::new();

        for job in &jobs {
            if self.status.query(&job.sample) == JobState::Done {
                info!("sample {} is already done, skipping it", job.sample);
                summary.skipped.push(job.sample.clone());
                continue;
            }
            self.dispatch(job, &mut job_names)?;
            states.insert(job.sample.clone(), JobState::Submitted);
        }

        if !states.is_empty() {
            self.poll(&mut states, &job_names)?;
        }

        let failed: Vec<_> = states
            .iter()
            .filter(|(_, state)| **state == JobState::Failed)
            .map(|(sample, _)| sample.clone())
            .collect();
        if !failed.is_empty() {
            return Err(RunError::JobsFailed {
                samples: failed,
                log_dir: self.log_dir.clone(),
            });
        }
        summary.done = states.into_keys().collect();
        Ok(summary)
    }

    fn dispatch(&self, job: &JobSpec, job_names: &mut Vec<String>) -> Result<(), RunError> {
        self.status.clear_stale(&job.sample)?;
        debug!("{}: {}", job.sample, job.command);

        match self.backend.submit(job)? {
            Submission::Finished(exit) => {
                if !exit.success() {
                    warn!("the job of sample {} failed ({exit})", job.sample);
                    self.status.mark_failed(&job.sample)?;
                } else if self.status.query(&job.sample) != JobState::Done {
                    warn!(
                        "the job of sample {} exited successfully without writing its done marker",
                        job.sample
                    );
                    self.status.mark_failed(&job.sample)?;
                }
            }
            Submission::Queued { job_name } => {
                info!("submitted sample {} as {job_name}", job.sample);
                job_names.push(job_name);
            }
        }
        Ok(())
    }

    fn poll(
        &self,
        states: &mut BTreeMap<String, JobState>,
        job_names: &[String],
    ) -> Result<(), RunError> {
        let total = states.len();
        let start = Instant::now();
        let mut first_scan = true;

        loop {
            // Local jobs have all resolved by now.
            if self.backend.is_async() || !first_scan {
                sleep(self.settings.poll_interval);
            }
            first_scan = false;

            for (sample, state) in states.iter_mut().filter(|(_, s)| !s.is_terminal()) {
                let observed = self.status.query(sample);
                if observed.is_terminal() {
                    info!("sample {sample}: {observed:?}");
                    *state = observed;
                }
            }

            let finished = states.values().filter(|s| s.is_terminal()).count();
            info!("{finished} of {total} sample(s) finished");
            if finished == total {
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= self.settings.timeout {
                return Err(RunError::Timeout {
                    pending: states
                        .iter()
                        .filter(|(_, s)| !s.is_terminal())
                        .map(|(sample, _)| sample.clone())
                        .collect(),
                    elapsed,
                    log_dir: self.log_dir.clone(),
                });
            }

            if finished == 0 {
                if let Backend::Cluster(cluster) = self.backend {
                    let samples: Vec<_> = states.keys().map(String::as_str).collect();
                    self.watchdog(cluster, job_names, &samples)?;
                }
            }
        }
    }

    /// Detect submissions that the queue silently dropped.
    fn watchdog(
        &self,
        cluster: &ClusterBackend,
        job_names: &[String],
        samples: &[&str],
    ) -> Result<(), RunError> {
        let live = match cluster.live_jobs() {
            Ok(live) => live,
            Err(e) => {
                warn!("unable to list the cluster queue: {e:#}");
                return Ok(());
            }
        };
        if job_names.iter().any(|name| live.contains(name)) {
            return Ok(());
        }

        warn!(
            "none of the {} submitted job(s) are in the queue, checking again in {}s",
            job_names.len(),
            self.settings.watchdog_grace.as_secs()
        );
        sleep(self.settings.watchdog_grace);

        let started = samples
            .iter()
            .any(|s| self.status.has_log(s) || self.status.query(s) != JobState::Pending);
        if started {
            return Ok(());
        }

        cluster.cancel(job_names);
        Err(RunError::Watchdog {
            job_names: job_names.to_vec(),
            log_dir: self.log_dir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::errors::SubmissionError;
    use crate::queue::{ClusterQueue, SubmitRequest};
    use crate::status::MarkerFiles;
    use amp_types::ExternalCommand;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::fs::File;
    use std::path::Path;
    use std::rc::Rc;

    fn quick() -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::ZERO,
            timeout: Duration::from_secs(3600),
            watchdog_grace: Duration::ZERO,
        }
    }

    fn job(dir: &Path, sample: &str, command: String) -> JobSpec {
        JobSpec {
            sample: sample.to_string(),
            command,
            log_path: dir.join(format!("{sample}.log")),
        }
    }

    /// A worker that only writes its done marker.
    fn touch_done(dir: &Path, sample: &str) -> JobSpec {
        let cmd = ExternalCommand::new("touch").arg(dir.join(format!("{sample}.done")));
        job(dir, sample, cmd.to_shell_string())
    }

    #[derive(Default)]
    struct QueueLog {
        submitted: Vec<String>,
        cancelled: Vec<String>,
    }

    /// In-memory queue. Jobs either stay queued forever, vanish, or finish
    /// as soon as they are submitted. The job of `reject_sample` is refused.
    struct FakeQueue {
        log: Rc<RefCell<QueueLog>>,
        keep_jobs: bool,
        finish_in: Option<PathBuf>,
        broken_status: bool,
        reject_sample: Option<String>,
    }

    impl ClusterQueue for FakeQueue {
        fn submit(&self, request: &SubmitRequest<'_>) -> Result<(), SubmissionError> {
            if self.reject_sample.as_deref() == Some(request.sample) {
                return Err(SubmissionError::Rejected {
                    sample: request.sample.to_string(),
                    command: format!("qsub -N {}", request.job_name),
                    status: "exit status: 1".to_string(),
                    output: "Unable to run job: unknown queue".to_string(),
                });
            }
            self.log
                .borrow_mut()
                .submitted
                .push(request.job_name.to_string());
            if let Some(dir) = &self.finish_in {
                File::create(dir.join(format!("{}.done", request.sample))).unwrap();
            }
            Ok(())
        }

        fn live_jobs(&self) -> Result<BTreeSet<String>> {
            anyhow::ensure!(!self.broken_status, "qstat: command not found");
            let log = self.log.borrow();
            Ok(if self.keep_jobs {
                log.submitted.iter().cloned().collect()
            } else {
                BTreeSet::new()
            })
        }

        fn cancel(&self, job_names: &[String]) {
            self.log.borrow_mut().cancelled.extend_from_slice(job_names);
        }
    }

    fn cluster(queue: FakeQueue) -> Backend {
        Backend::Cluster(ClusterBackend {
            queue: Box::new(queue),
            cores: 2,
            job_prefix: "amp7_".to_string(),
        })
    }

    fn fake_queue(log: &Rc<RefCell<QueueLog>>) -> FakeQueue {
        FakeQueue {
            log: Rc::clone(log),
            keep_jobs: false,
            finish_in: None,
            broken_status: false,
            reject_sample: None,
        }
    }

    #[test]
    fn test_local_run_succeeds() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let backend = Backend::Local(LocalBackend);
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());

        let summary = monitor.run(vec![
            touch_done(dir.path(), "s2"),
            touch_done(dir.path(), "s1"),
        ])?;
        assert_eq!(
            summary,
            RunSummary {
                skipped: vec![],
                done: vec!["s1".to_string(), "s2".to_string()],
            }
        );
        assert!(markers.has_log("s1"));
        Ok(())
    }

    #[test]
    fn test_done_sample_is_not_redispatched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        std::fs::write(markers.done_path("s1"), "previous run")?;

        let backend = Backend::Local(LocalBackend);
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());
        let ran = dir.path().join("ran");
        let rerun = job(
            dir.path(),
            "s1",
            ExternalCommand::new("touch").arg(&ran).to_shell_string(),
        );

        let summary = monitor.run(vec![rerun, touch_done(dir.path(), "s2")])?;
        assert_eq!(summary.skipped, vec!["s1"]);
        assert_eq!(summary.done, vec!["s2"]);
        assert!(!ran.exists());
        assert_eq!(
            std::fs::read_to_string(markers.done_path("s1"))?,
            "previous run"
        );
        Ok(())
    }

    #[test]
    fn test_stale_failed_marker_is_cleared() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        markers.mark_failed("s1")?;

        let backend = Backend::Local(LocalBackend);
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());
        monitor.run(vec![touch_done(dir.path(), "s1")])?;
        assert!(!markers.failed_path("s1").exists());
        assert_eq!(markers.query("s1"), JobState::Done);
        Ok(())
    }

    #[test]
    fn test_local_failures_fail_the_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let backend = Backend::Local(LocalBackend);
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());

        let err = monitor
            .run(vec![
                job(dir.path(), "s1", "exit 3".to_string()),
                touch_done(dir.path(), "s2"),
                job(dir.path(), "s3", "true".to_string()),
            ])
            .unwrap_err();
        match err {
            RunError::JobsFailed { samples, log_dir } => {
                assert_eq!(samples, vec!["s1", "s3"]);
                assert_eq!(log_dir, dir.path());
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(markers.query("s1"), JobState::Failed);
        assert_eq!(markers.query("s2"), JobState::Done);
        assert_eq!(markers.query("s3"), JobState::Failed);
        Ok(())
    }

    #[test]
    fn test_cluster_run_succeeds() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let log = Rc::new(RefCell::new(QueueLog::default()));
        let backend = cluster(FakeQueue {
            finish_in: Some(dir.path().to_path_buf()),
            ..fake_queue(&log)
        });
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());

        let summary = monitor.run(vec![
            touch_done(dir.path(), "s2"),
            touch_done(dir.path(), "s1"),
        ])?;
        assert_eq!(summary.done, vec!["s1", "s2"]);
        assert_eq!(log.borrow().submitted, vec!["amp7_s1", "amp7_s2"]);
        assert!(log.borrow().cancelled.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejected_submission_aborts_the_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let log = Rc::new(RefCell::new(QueueLog::default()));
        let backend = cluster(FakeQueue {
            reject_sample: Some("s2".to_string()),
            finish_in: Some(dir.path().to_path_buf()),
            ..fake_queue(&log)
        });
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());

        let err = monitor
            .run(vec![
                touch_done(dir.path(), "s1"),
                touch_done(dir.path(), "s2"),
                touch_done(dir.path(), "s3"),
            ])
            .unwrap_err();
        match err {
            RunError::Submission(SubmissionError::Rejected { sample, .. }) => {
                assert_eq!(sample, "s2")
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(log.borrow().submitted, vec!["amp7_s1"]);
        assert_eq!(markers.query("s3"), JobState::Pending);
        assert!(!markers.failed_path("s2").exists());
        Ok(())
    }

    #[test]
    fn test_timeout_lists_pending_samples() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let log = Rc::new(RefCell::new(QueueLog::default()));
        let backend = cluster(FakeQueue {
            keep_jobs: true,
            ..fake_queue(&log)
        });
        let settings = MonitorSettings {
            timeout: Duration::ZERO,
            ..quick()
        };
        let monitor = JobMonitor::new(&backend, &markers, settings, dir.path());

        File::create(markers.done_path("s0"))?;
        let err = monitor
            .run(vec![
                touch_done(dir.path(), "s0"),
                touch_done(dir.path(), "s1"),
                touch_done(dir.path(), "s2"),
            ])
            .unwrap_err();
        match err {
            RunError::Timeout { pending, .. } => assert_eq!(pending, vec!["s1", "s2"]),
            other => panic!("unexpected {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_watchdog_aborts_dropped_submissions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let log = Rc::new(RefCell::new(QueueLog::default()));
        let backend = cluster(fake_queue(&log));
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());

        let err = monitor
            .run(vec![
                touch_done(dir.path(), "s1"),
                touch_done(dir.path(), "s2"),
            ])
            .unwrap_err();
        match err {
            RunError::Watchdog { job_names, .. } => {
                assert_eq!(job_names, vec!["amp7_s1", "amp7_s2"])
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(log.borrow().cancelled, vec!["amp7_s1", "amp7_s2"]);
        Ok(())
    }

    #[test]
    fn test_watchdog_spares_started_jobs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let markers = MarkerFiles::new(dir.path());
        let log = Rc::new(RefCell::new(QueueLog::default()));
        let backend = cluster(fake_queue(&log));
        let monitor = JobMonitor::new(&backend, &markers, quick(), dir.path());
        let Backend::Cluster(queue) = &backend else {
            unreachable!()
        };
        let names = vec!["amp7_s1".to_string(), "amp7_s2".to_string()];

        // A job that wrote its log has started even if the queue forgot it.
        std::fs::write(markers.log_path("s2"), "aligning")?;
        monitor.watchdog(queue, &names, &["s1", "s2"])?;
        assert!(log.borrow().cancelled.is_empty());

        // An unusable queue listing never trips the watchdog.
        let broken = cluster(FakeQueue {
            broken_status: true,
            ..fake_queue(&log)
        });
        let Backend::Cluster(broken_queue) = &broken else {
            unreachable!()
        };
        monitor.watchdog(broken_queue, &names, &["s1"])?;
        assert!(log.borrow().cancelled.is_empty());
        Ok(())
    }
}
