use crate::errors::AggregationError;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Concatenate tables that share a header line into `output`.
///
/// The header is written once, followed by the body of every input in the
/// given order. Inputs are `(sample, path)` pairs.
pub fn merge_tables(inputs: &[(&str, PathBuf)], output: &Path) -> Result<(), AggregationError> {
    let mut header: Option<String> = None;
    let mut bodies = Vec::with_capacity(inputs.len());

    for (sample, path) in inputs {
        if !path.is_file() {
            return Err(AggregationError::MissingTable {
                sample: sample.to_string(),
                path: path.clone(),
            });
        }
        let mut reader = BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        );
        let mut first = String::new();
        reader
            .read_line(&mut first)
            .with_context(|| format!("reading {}", path.display()))?;
        let first = first.trim_end_matches(['\n', '\r']).to_string();
        if first.is_empty() {
            return Err(AggregationError::EmptyTable { path: path.clone() });
        }
        match &header {
            None => header = Some(first),
            Some(expected) if *expected != first => {
                return Err(AggregationError::HeaderMismatch {
                    path: path.clone(),
                    expected: expected.clone(),
                    found: first,
                });
            }
            Some(_) => (),
        }
        bodies.push((path, reader));
    }

    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    let write_err = || format!("writing {}", output.display());
    if let Some(header) = header {
        writeln!(writer, "{header}").with_context(write_err)?;
    }
    for (path, reader) in bodies {
        for line in reader.lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                writeln!(writer, "{line}").with_context(write_err)?;
            }
        }
    }
    writer.flush().with_context(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_keeps_one_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut inputs = Vec::new();
        for (sample, body) in [("s1", "s1\t10\n"), ("s2", "s2\t20\ns2\t21\n"), ("s3", "")] {
            let path = dir.path().join(format!("{sample}.cnt"));
            std::fs::write(&path, format!("sample\treads\n{body}"))?;
            inputs.push((sample, path));
        }
        let output = dir.path().join("siteA.cnt");
        merge_tables(&inputs, &output)?;
        assert_eq!(
            std::fs::read_to_string(&output)?,
            "sample\treads\ns1\t10\ns2\t20\ns2\t21\n"
        );
        Ok(())
    }

    #[test]
    fn test_merge_crlf_tables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("s1.len");
        let b = dir.path().join("s2.len");
        std::fs::write(&a, "sample\tlength\r\ns1\t150\r\n")?;
        std::fs::write(&b, "sample\tlength\ns2\t148\r\n\r\n")?;
        let output = dir.path().join("siteA.len");
        merge_tables(&[("s1", a), ("s2", b)], &output)?;
        assert_eq!(
            std::fs::read_to_string(&output)?,
            "sample\tlength\ns1\t150\ns2\t148\n"
        );
        Ok(())
    }

    #[test]
    fn test_merge_errors()-> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out.snp");
        let a = dir.path().join("a.snp");
        let b = dir.path().join("b.snp");
        let empty = dir.path().join("empty.snp");
        std::fs::write(&a, "pos\tref\n1\tA\n")?;
        std::fs::write(&b, "pos\talt\n1\tC\n")?;
        std::fs::write(&empty, "")?;

        let err = merge_tables(&[("a", a.clone()), ("b", b)], &output).unwrap_err();
        assert!(matches!(err, AggregationError::HeaderMismatch { ref found, .. } if found == "pos\talt"));

        let err = merge_tables(&[("a", a.clone()), ("e", empty)], &output).unwrap_err();
        assert!(matches!(err, AggregationError::EmptyTable { .. }));

        let err = merge_tables(&[("a", a), ("c", dir.path().join("c.snp"))], &output).unwrap_err();
        assert!(matches!(err, AggregationError::MissingTable { ref sample, .. } if sample == "c"));
        Ok(())
    }
}
