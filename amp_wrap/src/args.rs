use crate::utils::{validate_id, CliPath};
use amp_types::InputFiles;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Where the per-sample jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobMode {
    /// One after the other on this machine.
    Local,
    /// Submitted to a Grid Engine queue.
    Sge,
}

/// Inputs and options of a run.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Amplicon region, a single row of chromosome, start, end, gene
    /// symbol, transcript id and strand.
    #[clap(long, value_name = "TSV")]
    pub region: CliPath,

    /// Target sites: chromosome, start, end, name, sequence, strand and
    /// optional HDR edits such as `125G,130T`.
    #[clap(long, value_name = "TSV")]
    pub sites: CliPath,

    /// Sample to target sequences mapping.
    #[clap(long, value_name = "TSV")]
    pub sitemap: CliPath,

    /// Sample to FASTQ files mapping: sample, read1 and optionally read2.
    #[clap(long, value_name = "TSV")]
    pub fastqmap: CliPath,

    /// Genome FASTA the reads are aligned to.
    #[clap(long, value_name = "FASTA")]
    pub genome: CliPath,

    /// Transcript coordinates. Turns on the alignment view tables.
    #[clap(long, value_name = "TSV")]
    pub refgene: Option<CliPath>,

    /// Output folder. The per-sample work goes to `align/`, the merged
    /// tables and plots to `deliverables/<site>/`.
    #[clap(long, value_name = "PATH")]
    pub outdir: PathBuf,

    /// Where the per-sample jobs run.
    #[clap(long, value_enum, default_value_t = JobMode::Local)]
    pub jobmode: JobMode,

    /// Identifier of the run used in cluster job names. Defaults to the
    /// process id.
    #[clap(long, value_name = "ID", value_parser = validate_id)]
    pub id: Option<String>,

    /// Parameters file overriding the built-in defaults.
    #[clap(long, value_name = "TOML")]
    pub parameters: Option<CliPath>,

    /// Minimum mapping quality of a read to be counted.
    #[clap(long, value_name = "NUM", default_value_t = 20)]
    pub min_mapq: u32,

    /// Minimum base quality of a variant to be counted.
    #[clap(long, value_name = "NUM", default_value_t = 30)]
    pub min_base_quality: u32,

    /// Indels this many bases around a target site count as edits.
    #[clap(long, value_name = "NUM", default_value_t = 1)]
    pub indel_window: u32,

    /// Validate the inputs and print the job commands without running them.
    #[clap(long)]
    pub dry: bool,

    /// Log debug messages.
    #[clap(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    pub fn input_files(&self) -> InputFiles {
        InputFiles {
            amplicon: self.region.to_path_buf(),
            target_sites: self.sites.to_path_buf(),
            sample_sites: self.sitemap.to_path_buf(),
            fastqs: self.fastqmap.to_path_buf(),
        }
    }

    /// Alignment view tables need transcript coordinates.
    pub fn alignment_view(&self) -> bool {
        self.refgene.is_some()
    }
}
