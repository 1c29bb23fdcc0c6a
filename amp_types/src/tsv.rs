//! Reader for the headerless, tab separated metadata files.

use crate::errors::ValidationProblem;
use csv::StringRecord;
use std::path::Path;

/// One data row of a metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsvRow {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Columns with all whitespace removed. Trailing empty columns are dropped.
    pub fields: Vec<String>,
}

impl TsvRow {
    /// The column at `i`, or "" if the row is shorter.
    pub fn get(&self, i: usize) -> &str {
        self.fields.get(i).map_or("", String::as_str)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn strip_whitespace(field: &str) -> String {
    field.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Turn one record into a row, or None for blank and indented comment lines.
fn to_row(record: &StringRecord) -> Option<TsvRow> {
    let mut fields: Vec<String> = record.iter().map(strip_whitespace).collect();
    if fields.first().is_some_and(|f| f.starts_with('#')) {
        return None;
    }
    while fields.last().is_some_and(String::is_empty) {
        fields.pop();
    }
    if fields.is_empty() {
        return None;
    }
    let line = record.position().map_or(0, |p| p.line() as usize);
    Some(TsvRow { line, fields })
}

/// Read every data row of `path`.
///
/// Blank lines and lines starting with `#` are skipped. Columns are split on
/// tabs only, quotes have no special meaning, and any other whitespace inside
/// a column is removed.
pub fn read_rows(path: &Path) -> Result<Vec<TsvRow>, ValidationProblem> {
    let unreadable = |e: csv::Error| ValidationProblem::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(unreadable)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.extend(to_row(&record.map_err(unreadable)?));
    }
    Ok(rows)
}
