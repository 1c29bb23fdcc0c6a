use crate::errors::ValidationProblem;
use crate::tsv::read_rows;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// Amplicons shorter than this are rejected.
pub const MIN_AMPLICON_LENGTH: u64 = 50;

const AMPLICON_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> Result<Strand, String> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(s.to_string()),
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        })
    }
}

/// The single genomic region sequenced in a run. Coordinates are 0-based,
/// end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amplicon {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub gene_symbol: String,
    pub transcript_id: String,
    pub strand: Strand,
}

impl Amplicon {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `pos` lies within the amplicon, counting both edges.
    pub fn touches(&self, pos: u64) -> bool {
        pos >= self.start && pos <= self.end
    }

    /// `chrom:start-end`
    pub fn region(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Parse a BED-style `[start, end)` pair.
///
/// Both bounds must be non-negative integers and `start < end`. When both
/// bounds are malformed, both problems are returned.
pub fn check_bed_coord(
    path: &Path,
    line: usize,
    start: &str,
    end: &str,
) -> Result<(u64, u64), Vec<ValidationProblem>> {
    let parse = |bound: &'static str, value: &str| {
        value
            .parse::<u64>()
            .map_err(|_| ValidationProblem::InvalidCoordinate {
                path: path.to_path_buf(),
                line,
                bound,
                value: value.to_string(),
            })
    };

    match (parse("start", start), parse("end", end)) {
        (Ok(start), Ok(end)) if start < end => Ok((start, end)),
        (Ok(start), Ok(end)) => Err(vec![ValidationProblem::StartNotBeforeEnd {
            path: path.to_path_buf(),
            line,
            start,
            end,
        }]),
        (start, end) => Err([start.err(), end.err()].into_iter().flatten().collect()),
    }
}

pub(crate) fn parse_strand(
    path: &Path,
    line: usize,
    value: &str,
) -> Result<Strand, ValidationProblem> {
    value
        .parse()
        .map_err(|value| ValidationProblem::InvalidStrand {
            path: path.to_path_buf(),
            line,
            value,
        })
}

/// Read the amplicon region file, recording every problem found.
pub fn read_amplicon(path: &Path, problems: &mut Vec<ValidationProblem>) -> Option<Amplicon> {
    let rows = match read_rows(path) {
        Ok(rows) => rows,
        Err(problem) => {
            problems.push(problem);
            return None;
        }
    };

    let row = match rows.as_slice() {
        [] => {
            problems.push(ValidationProblem::NoRows {
                path: path.to_path_buf(),
                what: "amplicon",
            });
            return None;
        }
        [row] => row,
        _ => {
            problems.push(ValidationProblem::MultipleAmplicons {
                path: path.to_path_buf(),
                rows: rows.len(),
            });
            return None;
        }
    };

    if row.len() < AMPLICON_COLUMNS {
        problems.push(ValidationProblem::MissingColumns {
            path: path.to_path_buf(),
            line: row.line,
            expected: AMPLICON_COLUMNS,
            found: row.len(),
        });
        return None;
    }

    let coords = check_bed_coord(path, row.line, row.get(1), row.get(2))
        .map_err(|mut coord_problems| problems.append(&mut coord_problems))
        .ok();
    let strand = parse_strand(path, row.line, row.get(5))
        .map_err(|problem| problems.push(problem))
        .ok();

    let (start, end) = coords?;
    if end - start < MIN_AMPLICON_LENGTH {
        problems.push(ValidationProblem::AmpliconTooShort {
            path: path.to_path_buf(),
            length: end - start,
            min_length: MIN_AMPLICON_LENGTH,
        });
        return None;
    }

    Some(Amplicon {
        chrom: row.get(0).to_string(),
        start,
        end,
        gene_symbol: row.get(3).to_string(),
        transcript_id: row.get(4).to_string(),
        strand: strand?,
    })
}
