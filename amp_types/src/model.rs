//! Building the validated experiment model from the input files.

use crate::amplicon::{read_amplicon, Amplicon};
use crate::errors::{ValidationError, ValidationProblem};
use crate::fastq::{check_samples_resolved, resolve_fastqs, SampleReads};
use crate::sitemap::{read_sample_targets, SampleTargets};
use crate::target::{read_target_sites, TargetSite};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The metadata files describing one run.
#[derive(Debug, Clone)]
pub struct InputFiles {
    /// Amplicon region, one row.
    pub amplicon: PathBuf,
    /// Target site definitions.
    pub target_sites: PathBuf,
    /// Sample to target sequence mapping.
    pub sample_sites: PathBuf,
    /// Sample to FASTQ files mapping.
    pub fastqs: PathBuf,
}

/// Everything known about the experiment once validation succeeded.
#[derive(Debug, Clone)]
pub struct ExperimentModel {
    pub amplicon: Amplicon,
    pub sites: BTreeMap<String, TargetSite>,
    pub relation: SampleTargets,
    pub reads: BTreeMap<String, SampleReads>,
}

impl ExperimentModel {
    /// Target sites of a sample, sorted by name.
    pub fn sites_for_sample<'a>(&'a self, sample: &'a str) -> impl Iterator<Item = &'a TargetSite> {
        self.relation
            .sites_for_sample(sample)
            .filter_map(|name| self.sites.get(name))
    }

    /// Sorted sample names.
    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.relation.samples()
    }
}

/// Read and cross-check all input files.
///
/// Problems that can be detected independently of each other are all
/// reported in the returned [`ValidationError`].
pub fn validate_inputs(
    files: &InputFiles,
    fastq_suffixes: &[String],
) -> Result<ExperimentModel, ValidationError> {
    let mut problems: Vec<ValidationProblem> = Vec::new();

    let amplicon = read_amplicon(&files.amplicon, &mut problems);
    let sites = read_target_sites(&files.target_sites, amplicon.as_ref(), &mut problems);
    let site_file_readable = !problems.iter().any(|p| {
        matches!(p, ValidationProblem::Unreadable { path, .. } if *path == files.target_sites)
    });
    let relation = read_sample_targets(
        &files.sample_sites,
        site_file_readable.then_some(&sites),
        &mut problems,
    );

    let mut reads = resolve_fastqs(&files.fastqs, fastq_suffixes, &mut problems);
    check_samples_resolved(&relation, &mut reads, &mut problems);

    match amplicon {
        Some(amplicon) if problems.is_empty() => Ok(ExperimentModel {
            amplicon,
            sites: sites.sites,
            relation,
            reads,
        }),
        _ => Err(ValidationError { problems }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplicon::tests::write_file;
    use crate::fastq::DEFAULT_FASTQ_SUFFIXES;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const SITE_A: &str = "ACGTACGTACGTACGTACGT";

    /// Inputs for the `chr1 100-200` amplicon with `siteA` and samples s1, s2.
    fn write_inputs(dir: &Path, amplicon: &str, sites: &str) -> InputFiles {
        let mut fastq_rows = String::new();
        for sample in ["s1", "s2"] {
            let fq = write_file(dir, &format!("{sample}.fastq.gz"), "@r\nACGT\n+\nIIII\n");
            fastq_rows += &format!("{sample}\t{}\n", fq.display());
        }
        InputFiles {
            amplicon: write_file(dir, "amplicon.bed", amplicon),
            target_sites: write_file(dir, "sites.bed", sites),
            sample_sites: write_file(dir, "samples.tsv", &format!("s1\t{SITE_A}\ns2\t{SITE_A}\n")),
            fastqs: write_file(dir, "fastq.tsv", &fastq_rows),
        }
    }

    fn suffixes() -> Vec<String> {
        DEFAULT_FASTQ_SUFFIXES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(
            dir.path(),
            "chr1\t100\t200\tGENE1\tNM_1\t+\n",
            &format!("chr1\t120\t140\tsiteA\t{SITE_A}\t+\n"),
        );
        let model = validate_inputs(&files, &suffixes()).unwrap();
        assert_eq!(model.amplicon.gene_symbol, "GENE1");
        assert_eq!(model.samples().collect::<Vec<_>>(), vec!["s1", "s2"]);
        assert_eq!(
            model
                .sites_for_sample("s2")
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["siteA"]
        );
        assert_eq!(model.reads.len(), 2);
    }

    #[test]
    fn test_site_one_before_amplicon_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(
            dir.path(),
            "chr1\t120\t200\tGENE1\tNM_1\t+\n",
            &format!("chr1\t119\t140\tsiteA\t{SITE_A}\t+\n"),
        );
        let err = validate_inputs(&files, &suffixes()).unwrap_err();
        assert!(matches!(
            err.problems.as_slice(),
            [ValidationProblem::SiteOutsideAmplicon { start: 119, .. }]
        ));
    }

    #[test]
    fn test_problems_from_every_file_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(
            dir.path(),
            "chr1\t200\t100\tGENE1\tNM_1\t+\n",
            &format!(
                "chr1\t120\t140\tsiteA\t{SITE_A}\t+\nchr1\t150\t170\tsiteA\t{SITE_A}\t+\n"
            ),
        );
        std::fs::write(&files.fastqs, "s1\tnope.fastq.gz\n").unwrap();

        let err = validate_inputs(&files, &suffixes()).unwrap_err();
        let kinds: Vec<_> = err
            .problems
            .iter()
            .map(std::mem::discriminant)
            .collect();
        let expect = |p: &ValidationProblem| kinds.contains(&std::mem::discriminant(p));

        assert!(expect(&ValidationProblem::StartNotBeforeEnd {
            path: PathBuf::new(),
            line: 0,
            start: 0,
            end: 0
        }));
        assert!(expect(&ValidationProblem::DuplicateSiteName {
            path: PathBuf::new(),
            line: 0,
            name: String::new()
        }));
        assert!(expect(&ValidationProblem::FastqMissing {
            sample: String::new(),
            path: PathBuf::new()
        }));
        assert!(expect(&ValidationProblem::UnresolvedSamples { samples: vec![] }));
    }
}
