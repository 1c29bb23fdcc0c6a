use anyhow::{anyhow, ensure, Result};
use itertools::Itertools;
use log::warn;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Convert an io::error to a string and strip "(os error 4)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Print an error chain to stderr.
pub fn print_error_chain(err: &anyhow::Error) {
    let error_chain = err.chain().join("\n\tCaused by: ");
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        let io_err_str = io_error_to_string(io_err);
        match err.chain().len() {
            1 => eprintln!("ERROR: {io_err_str}"),
            2 => eprintln!("ERROR: {io_err_str}: {err}"),
            _ => eprintln!("ERROR: {error_chain}"),
        };
    } else {
        eprintln!("ERROR: {error_chain}");
    };
}

/// An input path, canonicalized when parsed from the command line so that
/// jobs started from another working directory still find it.
#[derive(Clone)]
pub struct CliPath(PathBuf);

impl FromStr for CliPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<CliPath> {
        Path::new(s)
            .canonicalize()
            .map(CliPath)
            .map_err(|e| anyhow!(io_error_to_string(&e)))
    }
}

impl Debug for CliPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Deref for CliPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

/// Cluster job names embed the run id and some schedulers truncate long
/// names.
const MAX_ID_LEN: usize = 32;

/// Value parser of `--id`: 1 to 32 letters, digits, underscores or dashes.
pub fn validate_id(id: &str) -> Result<String> {
    ensure!(!id.is_empty(), "The --id parameter cannot be empty.");
    ensure!(
        id.len() <= MAX_ID_LEN,
        "The --id parameter must be {MAX_ID_LEN} characters or less, please use a shorter string.",
    );
    ensure!(
        id.bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-'),
        "The --id parameter must contain only letters, digits, underscores and dashes."
    );
    Ok(id.to_string())
}

/// Send SIGTERM to every process in our process group, ourselves included.
pub fn terminate_process_group() {
    // SAFETY: getpgrp cannot fail and killpg only reads its arguments.
    let ret = unsafe { libc::killpg(libc::getpgrp(), libc::SIGTERM) };
    if ret != 0 {
        warn!(
            "failed to terminate the process group: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        for s in ["A-Z", "run-123", "__RUN-3", "__---00"] {
            assert!(validate_id(s).is_ok(), "{s} should be a valid ID");
        }
        for s in ["", "_A*S", "_RUN/123", "(?:)", "ΔδΔ"] {
            assert!(validate_id(s).is_err(), "{s} should be an invalid ID");
        }
        assert!(validate_id(&"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let p: CliPath = dir.path().to_str().unwrap().parse().unwrap();
        assert!(p.is_absolute());
        assert!("/definitely/not/here".parse::<CliPath>().is_err());
    }
}
