use crate::amplicon::{check_bed_coord, parse_strand, Amplicon, Strand};
use crate::errors::ValidationProblem;
use crate::tsv::read_rows;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

const TARGET_COLUMNS: usize = 6;

/// A desired homology-directed-repair substitution: replace the base at the
/// 1-based genomic `position` with `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdrEdit {
    pub position: u64,
    pub base: char,
}

impl FromStr for HdrEdit {
    type Err = ();

    /// Parse `1024A`.
    fn from_str(s: &str) -> Result<HdrEdit, ()> {
        let split = s.find(|c: char| !c.is_ascii_digit()).ok_or(())?;
        let (position, base) = s.split_at(split);
        let position: u64 = position.parse().map_err(|_| ())?;
        let base = match base.to_ascii_uppercase().as_str() {
            b @ ("A" | "C" | "G" | "T") => b.chars().next().ok_or(())?,
            _ => return Err(()),
        };
        if position == 0 {
            return Err(());
        }
        Ok(HdrEdit { position, base })
    }
}

impl Display for HdrEdit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.position, self.base)
    }
}

/// A guide target (e.g. a CRISPR cut site) inside the amplicon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSite {
    pub name: String,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    /// Upper case guide sequence.
    pub sequence: String,
    pub strand: Strand,
    pub hdr_edits: Vec<HdrEdit>,
}

impl TargetSite {
    pub fn has_hdr(&self) -> bool {
        !self.hdr_edits.is_empty()
    }

    /// HDR edits in their input form, e.g. `1024A,1030T`.
    pub fn hdr_string(&self) -> String {
        self.hdr_edits.iter().join(",")
    }
}

/// Target sites keyed by name, plus the reverse lookup from sequence to name.
#[derive(Debug, Clone, Default)]
pub struct TargetSiteTable {
    pub sites: BTreeMap<String, TargetSite>,
    /// Every sequence seen in the file, including rows rejected for other
    /// reasons, so lookups from the mapping file do not cascade errors.
    pub sequences: HashMap<String, String>,
}

impl TargetSiteTable {
    /// Name of the site with this (case-insensitive) sequence.
    pub fn site_for_sequence(&self, sequence: &str) -> Option<&str> {
        self.sequences
            .get(&sequence.to_ascii_uppercase())
            .map(String::as_str)
    }
}

fn parse_hdr_edits(
    path: &Path,
    line: usize,
    site: &str,
    field: &str,
    amplicon: Option<&Amplicon>,
    problems: &mut Vec<ValidationProblem>,
) -> Vec<HdrEdit> {
    let mut edits = Vec::new();
    for text in field.split(',').filter(|s| !s.is_empty()) {
        let Ok(edit) = text.parse::<HdrEdit>() else {
            problems.push(ValidationProblem::InvalidHdrEdit {
                path: path.to_path_buf(),
                line,
                site: site.to_string(),
                edit: text.to_string(),
            });
            continue;
        };
        // 1-based position p is the 0-based base p - 1 of [start, end)
        if let Some(amplicon) = amplicon {
            if edit.position <= amplicon.start || edit.position > amplicon.end {
                problems.push(ValidationProblem::HdrOutsideAmplicon {
                    path: path.to_path_buf(),
                    line,
                    site: site.to_string(),
                    position: edit.position,
                });
                continue;
            }
        }
        edits.push(edit);
    }
    edits
}

/// Read the target site file, recording every problem found.
///
/// Without an amplicon only the checks that do not depend on it are run.
pub fn read_target_sites(
    path: &Path,
    amplicon: Option<&Amplicon>,
    problems: &mut Vec<ValidationProblem>,
) -> TargetSiteTable {
    let mut table = TargetSiteTable::default();
    let rows = match read_rows(path) {
        Ok(rows) => rows,
        Err(problem) => {
            problems.push(problem);
            return table;
        }
    };
    if rows.is_empty() {
        problems.push(ValidationProblem::NoRows {
            path: path.to_path_buf(),
            what: "target site",
        });
    }

    let mut names = HashMap::new();
    for row in rows {
        let line = row.line;
        if row.len() < TARGET_COLUMNS {
            problems.push(ValidationProblem::MissingColumns {
                path: path.to_path_buf(),
                line,
                expected: TARGET_COLUMNS,
                found: row.len(),
            });
            continue;
        }
        let before = problems.len();

        let name = row.get(3).to_string();
        let sequence = row.get(4).to_ascii_uppercase();

        if names.insert(name.clone(), line).is_some() {
            problems.push(ValidationProblem::DuplicateSiteName {
                path: path.to_path_buf(),
                line,
                name: name.clone(),
            });
        }
        if table.sequences.contains_key(&sequence) {
            problems.push(ValidationProblem::DuplicateSiteSequence {
                path: path.to_path_buf(),
                line,
                sequence: sequence.clone(),
            });
        } else {
            table.sequences.insert(sequence.clone(), name.clone());
        }
        if !sequence.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N')) {
            problems.push(ValidationProblem::InvalidSequence {
                path: path.to_path_buf(),
                line,
                sequence: sequence.clone(),
            });
        }

        let coords = check_bed_coord(path, line, row.get(1), row.get(2))
            .map_err(|mut coord_problems| problems.append(&mut coord_problems))
            .ok();
        let strand = parse_strand(path, line, row.get(5))
            .map_err(|problem| problems.push(problem))
            .ok();

        let chrom = row.get(0).to_string();
        if let Some(amplicon) = amplicon {
            if chrom != amplicon.chrom {
                problems.push(ValidationProblem::ChromosomeMismatch {
                    path: path.to_path_buf(),
                    line,
                    site: name.clone(),
                    chrom: chrom.clone(),
                    amplicon_chrom: amplicon.chrom.clone(),
                });
            }
            if let Some((start, end)) = coords {
                if !(amplicon.touches(start) && amplicon.touches(end)) {
                    problems.push(ValidationProblem::SiteOutsideAmplicon {
                        path: path.to_path_buf(),
                        line,
                        site: name.clone(),
                        start,
                        end,
                        amplicon_start: amplicon.start,
                        amplicon_end: amplicon.end,
                    });
                }
            }
        }

        let hdr_edits = parse_hdr_edits(path, line, &name, row.get(6), amplicon, problems);

        if problems.len() > before {
            continue;
        }
        if let (Some((start, end)), Some(strand)) = (coords, strand) {
            table.sites.insert(
                name.clone(),
                TargetSite {
                    name,
                    chrom,
                    start,
                    end,
                    sequence,
                    strand,
                    hdr_edits,
                },
            );
        }
    }
    table
}
