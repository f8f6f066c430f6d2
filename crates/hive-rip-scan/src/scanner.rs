//! Line-by-line report scanning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pattern::FieldPattern;

/// Errors from scanning a captured report.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("report not found: {}", .0.display())]
    MissingReport(PathBuf),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// True when the report file did not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, ScanError::MissingReport(_))
    }
}

/// Scan `reader` to end-of-input and return the value of every line that
/// matches `pattern`, in input order.
///
/// Lines are decoded lossily, so a report with stray non-UTF-8 bytes still
/// scans. A trailing `\r` is dropped from each line.
pub fn scan_reader<R: BufRead>(mut reader: R, pattern: &FieldPattern) -> io::Result<Vec<String>> {
    let mut values = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        if let Some(value) = pattern.extract(line) {
            values.push(value.to_string());
        }
    }

    Ok(values)
}

/// Scan the report at `path` for `field`.
pub fn scan_file(path: &Path, field: &str) -> Result<Vec<String>, ScanError> {
    let pattern = FieldPattern::new(field);
    let reader = open_report(path)?;
    let values = scan_reader(reader, &pattern).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::trace!(field, path = %path.display(), matches = values.len(), "scanned report");
    Ok(values)
}

/// Scan the report at `path` once per field, keyed by field name.
///
/// Every requested field is present in the result, possibly with no values.
pub fn scan_fields(path: &Path, fields: &[&str]) -> Result<BTreeMap<String, Vec<String>>, ScanError> {
    let mut out = BTreeMap::new();
    for field in fields {
        out.insert(field.to_string(), scan_file(path, field)?);
    }
    Ok(out)
}

fn open_report(path: &Path) -> Result<BufReader<File>, ScanError> {
    match File::open(path) {
        Ok(f) => Ok(BufReader::new(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ScanError::MissingReport(path.to_path_buf()))
        }
        Err(source) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
