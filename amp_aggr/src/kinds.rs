//! The tables written by the per-sample worker and their naming convention.

use parameters_toml::Plots;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKind {
    ReadCount,
    Chromosome,
    Snp,
    Indel,
    Length,
    AlignmentView,
    Hdr,
}

impl TableKind {
    /// Every kind, in the order they are aggregated.
    pub const ALL: [TableKind; 7] = [
        TableKind::ReadCount,
        TableKind::Chromosome,
        TableKind::Snp,
        TableKind::Indel,
        TableKind::Length,
        TableKind::AlignmentView,
        TableKind::Hdr,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            TableKind::ReadCount => "cnt",
            TableKind::Chromosome => "chr",
            TableKind::Snp => "snp",
            TableKind::Indel => "pct",
            TableKind::Length => "len",
            TableKind::AlignmentView => "can",
            TableKind::Hdr => "hdr",
        }
    }

    /// Read counts and the chromosome distribution describe the whole
    /// sample; every other kind is written once per sample and site.
    pub fn is_per_site(self) -> bool {
        !matches!(self, TableKind::ReadCount | TableKind::Chromosome)
    }

    /// Table written by the worker for `sample`.
    pub fn sample_table(self, align_dir: &Path, sample: &str, site: &str) -> PathBuf {
        let name = if self.is_per_site() {
            format!("{sample}_{site}.{}", self.extension())
        } else {
            format!("{sample}.{}", self.extension())
        };
        align_dir.join(name)
    }

    /// Merged table of a site, inside the site's delivery folder.
    pub fn site_table(self, site_dir: &Path, site: &str) -> PathBuf {
        site_dir.join(format!("{site}.{}", self.extension()))
    }

    /// The configured plotting program, if plotting of this kind is enabled.
    pub fn plot_program(self, plots: &Plots) -> Option<&str> {
        let program = match self {
            TableKind::ReadCount => &plots.read_count,
            TableKind::Chromosome => &plots.chromosome,
            TableKind::Snp => &plots.snp,
            TableKind::Indel => &plots.indel,
            TableKind::Length => &plots.length,
            TableKind::AlignmentView => &plots.alignment_view,
            TableKind::Hdr => &plots.hdr,
        };
        program.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::ReadCount => "read count",
            TableKind::Chromosome => "chromosome",
            TableKind::Snp => "SNP",
            TableKind::Indel => "indel",
            TableKind::Length => "length",
            TableKind::AlignmentView => "alignment view",
            TableKind::Hdr => "HDR",
        };
        f.write_str(name)
    }
}
