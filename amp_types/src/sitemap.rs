use crate::errors::ValidationProblem;
use crate::target::TargetSiteTable;
use crate::tsv::read_rows;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// The many-to-many relation between samples and target sites, indexed both
/// ways. Site entries are site names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTargets {
    by_sample: BTreeMap<String, BTreeSet<String>>,
    by_site: BTreeMap<String, BTreeSet<String>>,
}

impl SampleTargets {
    pub fn insert(&mut self, sample: &str, site: &str) {
        self.by_sample
            .entry(sample.to_string())
            .or_default()
            .insert(site.to_string());
        self.by_site
            .entry(site.to_string())
            .or_default()
            .insert(sample.to_string());
    }

    /// Sorted sample names.
    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.by_sample.keys().map(String::as_str)
    }

    /// Sorted names of sites with at least one sample.
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.by_site.keys().map(String::as_str)
    }

    pub fn sites_for_sample(&self, sample: &str) -> impl Iterator<Item = &str> {
        self.by_sample
            .get(sample)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn samples_for_site(&self, site: &str) -> impl Iterator<Item = &str> {
        self.by_site
            .get(site)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn contains_sample(&self, sample: &str) -> bool {
        self.by_sample.contains_key(sample)
    }

    pub fn num_samples(&self) -> usize {
        self.by_sample.len()
    }
}

/// Read the sample to target sequence mapping, recording every problem found.
///
/// Rows are `sample, seq1, seq2, ...`. Sequences are resolved to sites through
/// `sites`; pass None when the target site file could not be read at all, in
/// which case sequences are not checked.
pub fn read_sample_targets(
    path: &Path,
    sites: Option<&TargetSiteTable>,
    problems: &mut Vec<ValidationProblem>,
) -> SampleTargets {
    let mut relation = SampleTargets::default();
    let rows = match read_rows(path) {
        Ok(rows) => rows,
        Err(problem) => {
            problems.push(problem);
            return relation;
        }
    };
    if rows.is_empty() {
        problems.push(ValidationProblem::NoRows {
            path: path.to_path_buf(),
            what: "sample",
        });
    }

    for row in rows {
        let sample = row.get(0);
        let sequences: Vec<_> = row.fields[1..]
            .iter()
            .filter(|s| !s.is_empty())
            .collect();
        if sequences.is_empty() {
            problems.push(ValidationProblem::NoSitesForSample {
                path: path.to_path_buf(),
                line: row.line,
                sample: sample.to_string(),
            });
            continue;
        }
        let Some(sites) = sites else {
            continue;
        };
        for sequence in sequences {
            match sites.site_for_sequence(sequence) {
                Some(site) => relation.insert(sample, site),
                None => problems.push(ValidationProblem::UnknownSiteSequence {
                    path: path.to_path_buf(),
                    line: row.line,
                    sequence: sequence.to_ascii_uppercase(),
                }),
            }
        }
    }
    relation
}
