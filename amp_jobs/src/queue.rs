//! Grid Engine style batch queue.

use crate::errors::SubmissionError;
use amp_types::ExternalCommand;
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

/// One job handed to the queue.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    pub sample: &'a str,
    pub job_name: &'a str,
    pub cores: usize,
    pub log_path: &'a Path,
    /// Shell command run by the job.
    pub command: &'a str,
}

/// The operations the run needs from a cluster queue.
pub trait ClusterQueue {
    fn submit(&self, request: &SubmitRequest<'_>) -> Result<(), SubmissionError>;

    /// Names of every job the queue currently knows about.
    fn live_jobs(&self) -> Result<BTreeSet<String>>;

    /// Best-effort removal of jobs from the queue.
    fn cancel(&self, job_names: &[String]);
}

/// Submits through `qsub`, lists with `qstat -xml`, cancels with `qdel`.
#[derive(Debug, Clone)]
pub struct SgeQueue {
    pub submit_program: String,
    pub status_program: String,
    pub delete_program: String,
    pub parallel_environment: String,
    pub queue: Option<String>,
}

impl SgeQueue {
    /// The submission command. The job script is passed on stdin.
    pub fn submit_command(&self, request: &SubmitRequest<'_>) -> ExternalCommand {
        let cmd = ExternalCommand::new(&self.submit_program)
            .arg("-N")
            .arg(request.job_name)
            .arg("-cwd")
            .arg("-V")
            .arg("-j")
            .arg("y")
            .arg("-o")
            .arg(request.log_path)
            .arg("-pe")
            .arg(&self.parallel_environment)
            .arg(request.cores.to_string());
        match &self.queue {
            Some(queue) => cmd.arg("-q").arg(queue),
            None => cmd,
        }
    }

    fn status_command(&self) -> ExternalCommand {
        ExternalCommand::new(&self.status_program).arg("-xml")
    }

    fn delete_command(&self, job_names: &[String]) -> ExternalCommand {
        job_names
            .iter()
            .fold(ExternalCommand::new(&self.delete_program), |cmd, name| {
                cmd.arg(name)
            })
    }
}

lazy_static! {
    static ref JOB_NAME: Regex =
        Regex::new(r"<JB_name>[ \t\r\n]*([^< \t\r\n]+)[ \t\r\n]*</JB_name>").unwrap();
}

/// Extract the job names from `qstat -xml` output.
pub fn parse_job_names(xml: &str) -> BTreeSet<String> {
    JOB_NAME
        .captures_iter(xml)
        .map(|c| c[1].to_string())
        .collect()
}

impl ClusterQueue for SgeQueue {
    fn submit(&self, request: &SubmitRequest<'_>) -> Result<(), SubmissionError> {
        let cmd = self.submit_command(request);
        let dispatch = |source: anyhow::Error| SubmissionError::Dispatch {
            sample: request.sample.to_string(),
            source,
        };

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {cmd}"))
            .map_err(dispatch)?;

        if let Some(mut stdin) = child.stdin.take() {
            match writeln!(stdin, "{}", request.command) {
                // A rejecting submit program may exit before reading the script.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("{} closed its stdin: {e}", cmd.program)
                }
                result => result
                    .with_context(|| format!("Failed to write to stdin of {}", cmd.program))
                    .map_err(dispatch)?,
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to read the output of {}", cmd.program))
            .map_err(dispatch)?;
        if !output.status.success() {
            return Err(SubmissionError::Rejected {
                sample: request.sample.to_string(),
                command: cmd.to_string(),
                status: output.status.to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(
            "{}",
            String::from_utf8_lossy(&output.stdout).trim_end_matches('\n')
        );
        Ok(())
    }

    fn live_jobs(&self) -> Result<BTreeSet<String>> {
        let cmd = self.status_command();
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .with_context(|| format!("Failed to run {cmd}"))?;
        anyhow::ensure!(
            output.status.success(),
            "{cmd} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(parse_job_names(&String::from_utf8_lossy(&output.stdout)))
    }

    fn cancel(&self, job_names: &[String]) {
        if job_names.is_empty() {
            return;
        }
        let cmd = self.delete_command(job_names);
        match Command::new(&cmd.program).args(&cmd.args).output() {
            Ok(output) if output.status.success() => (),
            Ok(output) => warn!(
                "{cmd} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!("failed to run {cmd}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn sge() -> SgeQueue {
        SgeQueue {
            submit_program: "qsub".to_string(),
            status_program: "qstat".to_string(),
            delete_program: "qdel".to_string(),
            parallel_environment: "smp".to_string(),
            queue: Some("short.q".to_string()),
        }
    }

    #[test]
    fn test_submit_command() {
        let log = PathBuf::from("/work/align/s1.log");
        let request = SubmitRequest {
            sample: "s1",
            job_name: "amp42_s1",
            cores: 2,
            log_path: &log,
            command: "amp-sample --sample=s1",
        };
        assert_eq!(
            sge().submit_command(&request).to_string(),
            "qsub -N amp42_s1 -cwd -V -j y -o /work/align/s1.log -pe smp 2 -q short.q"
        );
        assert_eq!(
            sge()
                .delete_command(&["a".to_string(), "b".to_string()])
                .to_string(),
            "qdel a b"
        );
    }

    #[test]
    fn test_failing_submit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("s1.log");
        let queue = SgeQueue {
            submit_program: "false".to_string(),
            ..sge()
        };
        let request = SubmitRequest {
            sample: "s1",
            job_name: "amp42_s1",
            cores: 2,
            log_path: &log,
            command: "amp-sample --sample=s1",
        };
        match queue.submit(&request).unwrap_err() {
            SubmissionError::Rejected {
                sample, command, ..
            } => {
                assert_eq!(sample, "s1");
                assert!(command.starts_with("false -N amp42_s1 "));
            }
            other => panic!("unexpected {other}"),
        }

        let missing = SgeQueue {
            submit_program: "/definitely/not/qsub".to_string(),
            ..sge()
        };
        assert!(matches!(
            missing.submit(&request),
            Err(SubmissionError::Dispatch { .. })
        ));
    }

    #[test]
    fn test_parse_job_names() {
        let xml = r#"<?xml version='1.0'?>
<job_info>
  <queue_info>
    <job_list state="running">
      <JB_job_number>101</JB_job_number>
      <JB_name>amp42_s1</JB_name>
    </job_list>
  </queue_info>
  <job_info>
    <job_list state="pending">
      <JB_job_number>102</JB_job_number>
      <JB_name> amp42_s2 </JB_name>
    </job_list>
  </job_info>
</job_info>"#;
        assert_eq!(
            parse_job_names(xml).into_iter().collect::<Vec<_>>(),
            vec!["amp42_s1", "amp42_s2"]
        );
        assert!(parse_job_names("<job_info></job_info>").is_empty());
    }
}
