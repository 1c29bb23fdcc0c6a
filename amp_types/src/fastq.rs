use crate::errors::ValidationProblem;
use crate::sitemap::SampleTargets;
use crate::tsv::read_rows;
use itertools::Itertools;
use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default accepted FASTQ suffix.
pub const DEFAULT_FASTQ_SUFFIXES: &[&str] = &[".gz"];

/// The read files of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReads {
    pub read1: PathBuf,
    pub read2: Option<PathBuf>,
}

impl SampleReads {
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.read1.as_path()).chain(self.read2.as_deref())
    }

    /// The files as a comma separated list.
    pub fn joined(&self) -> String {
        self.files().map(|p| p.display()).join(",")
    }

    pub fn is_paired(&self) -> bool {
        self.read2.is_some()
    }
}

/// Check a single FASTQ file. Returns true if it can be used.
fn check_fastq(
    sample: &str,
    path: &Path,
    suffixes: &[String],
    problems: &mut Vec<ValidationProblem>,
) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            problems.push(ValidationProblem::FastqMissing {
                sample: sample.to_string(),
                path: path.to_path_buf(),
            });
            return false;
        }
    };

    let mut ok = true;
    if meta.len() == 0 {
        problems.push(ValidationProblem::FastqEmpty {
            sample: sample.to_string(),
            path: path.to_path_buf(),
        });
        ok = false;
    }
    let name = path.to_string_lossy();
    if !suffixes.iter().any(|suffix| name.ends_with(suffix.as_str())) {
        problems.push(ValidationProblem::FastqBadSuffix {
            sample: sample.to_string(),
            path: path.to_path_buf(),
            suffixes: suffixes.to_vec(),
        });
        ok = false;
    }
    ok
}

/// Resolve the `sample, read1[, read2]` file into validated read files.
///
/// Every row is checked; all problems are recorded rather than stopping at the
/// first one.
pub fn resolve_fastqs(
    path: &Path,
    suffixes: &[String],
    problems: &mut Vec<ValidationProblem>,
) -> BTreeMap<String, SampleReads> {
    let mut resolved = BTreeMap::new();
    let rows = match read_rows(path) {
        Ok(rows) => rows,
        Err(problem) => {
            problems.push(problem);
            return resolved;
        }
    };

    let mut seen = BTreeMap::new();
    for row in rows {
        let sample = row.get(0).to_string();
        if seen.insert(sample.clone(), row.line).is_some() {
            problems.push(ValidationProblem::DuplicateFastqSample {
                path: path.to_path_buf(),
                line: row.line,
                sample,
            });
            continue;
        }

        let candidates: Vec<PathBuf> = row.fields[1..]
            .iter()
            .take(2)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from)
            .collect();

        let before = problems.len();
        let valid: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|file| check_fastq(&sample, file, suffixes, problems))
            .collect();

        if valid.is_empty() {
            problems.push(ValidationProblem::NoFastqForSample {
                sample: sample.clone(),
            });
        }
        if problems.len() > before {
            continue;
        }

        let mut files = valid.into_iter();
        if let Some(read1) = files.next() {
            resolved.insert(
                sample,
                SampleReads {
                    read1,
                    read2: files.next(),
                },
            );
        }
    }
    resolved
}

/// Every sample of the relation must have resolved read files.
///
/// Samples that only appear in the fastq file are dropped with a warning.
pub fn check_samples_resolved(
    relation: &SampleTargets,
    reads: &mut BTreeMap<String, SampleReads>,
    problems: &mut Vec<ValidationProblem>,
) {
    let unresolved: Vec<String> = relation
        .samples()
        .filter(|sample| !reads.contains_key(*sample))
        .map(String::from)
        .collect();
    if !unresolved.is_empty() {
        problems.push(ValidationProblem::UnresolvedSamples {
            samples: unresolved,
        });
    }

    reads.retain(|sample, _| {
        let keep = relation.contains_sample(sample);
        if !keep {
            warn!("sample {sample} has fastq files but no target sites, ignoring it");
        }
        keep
    });
}
