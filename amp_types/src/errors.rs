use itertools::Itertools;
use std::path::PathBuf;

/// A single problem found while reading the experiment metadata.
///
/// Problems are collected across all input files and reported together in a
/// [`ValidationError`] so that a whole batch can be fixed in one pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationProblem {
    #[error("Unable to read {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("The file {path:?} does not contain any {what} rows.")]
    NoRows { path: PathBuf, what: &'static str },

    #[error(
        "The amplicon file {path:?} must contain exactly one amplicon, but {rows} rows were found."
    )]
    MultipleAmplicons { path: PathBuf, rows: usize },

    #[error("Line {line} of {path:?} has {found} column(s), but at least {expected} are required.")]
    MissingColumns {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "Line {line} of {path:?}: the {bound} coordinate '{value}' is not a non-negative integer."
    )]
    InvalidCoordinate {
        path: PathBuf,
        line: usize,
        bound: &'static str,
        value: String,
    },

    #[error("Line {line} of {path:?}: the start coordinate {start} must be less than the end coordinate {end}.")]
    StartNotBeforeEnd {
        path: PathBuf,
        line: usize,
        start: u64,
        end: u64,
    },

    #[error(
        "The amplicon in {path:?} spans {length} bases, but it must be at least {min_length} bases long."
    )]
    AmpliconTooShort {
        path: PathBuf,
        length: u64,
        min_length: u64,
    },

    #[error("Line {line} of {path:?}: strand '{value}' must be '+' or '-'.")]
    InvalidStrand {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error(
        "Line {line} of {path:?}: target site {site} is on chromosome {chrom}, \
         but the amplicon is on chromosome {amplicon_chrom}."
    )]
    ChromosomeMismatch {
        path: PathBuf,
        line: usize,
        site: String,
        chrom: String,
        amplicon_chrom: String,
    },

    #[error(
        "Line {line} of {path:?}: target site {site} ({start}-{end}) lies outside of the \
         amplicon ({amplicon_start}-{amplicon_end})."
    )]
    SiteOutsideAmplicon {
        path: PathBuf,
        line: usize,
        site: String,
        start: u64,
        end: u64,
        amplicon_start: u64,
        amplicon_end: u64,
    },

    #[error("Line {line} of {path:?}: the target site name '{name}' was encountered already.")]
    DuplicateSiteName {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("Line {line} of {path:?}: the target sequence {sequence} was encountered already.")]
    DuplicateSiteSequence {
        path: PathBuf,
        line: usize,
        sequence: String,
    },

    #[error(
        "Line {line} of {path:?}: the target sequence '{sequence}' may only contain the bases A, C, G, T and N."
    )]
    InvalidSequence {
        path: PathBuf,
        line: usize,
        sequence: String,
    },

    #[error(
        "Line {line} of {path:?}: the HDR edit '{edit}' of target site {site} must be a \
         1-based position followed by one of A, C, G or T, e.g. 1024A."
    )]
    InvalidHdrEdit {
        path: PathBuf,
        line: usize,
        site: String,
        edit: String,
    },

    #[error(
        "Line {line} of {path:?}: the HDR edit at position {position} of target site {site} \
         lies outside of the amplicon."
    )]
    HdrOutsideAmplicon {
        path: PathBuf,
        line: usize,
        site: String,
        position: u64,
    },

    #[error("Line {line} of {path:?}: sample {sample} is not associated with any target sequence.")]
    NoSitesForSample {
        path: PathBuf,
        line: usize,
        sample: String,
    },

    #[error(
        "Line {line} of {path:?}: the sequence {sequence} does not match any target site sequence."
    )]
    UnknownSiteSequence {
        path: PathBuf,
        line: usize,
        sequence: String,
    },

    #[error("Line {line} of {path:?}: sample {sample} is listed more than once.")]
    DuplicateFastqSample {
        path: PathBuf,
        line: usize,
        sample: String,
    },

    #[error("FASTQ file {path:?} of sample {sample} does not exist.")]
    FastqMissing { sample: String, path: PathBuf },

    #[error("FASTQ file {path:?} of sample {sample} is empty.")]
    FastqEmpty { sample: String, path: PathBuf },

    #[error(
        "FASTQ file {path:?} of sample {sample} must be compressed and end with one of: {}",
        suffixes.join(", ")
    )]
    FastqBadSuffix {
        sample: String,
        path: PathBuf,
        suffixes: Vec<String>,
    },

    #[error("There is no fastq file for sample {sample}.")]
    NoFastqForSample { sample: String },

    #[error(
        "The following sample(s) are associated with target sites but have no entry in the \
         fastq file:\n{}",
        samples.join("\n")
    )]
    UnresolvedSamples { samples: Vec<String> },
}

/// Every problem detected in the input files of a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Found {} problem(s) in the input files:\n{}",
    problems.len(),
    problems.iter().map(|p| format!("  - {p}")).join("\n")
)]
pub struct ValidationError {
    pub problems: Vec<ValidationProblem>,
}

impl ValidationError {
    /// Return Ok(()) when no problems were collected.
    pub fn check(problems: Vec<ValidationProblem>) -> Result<(), ValidationError> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}
