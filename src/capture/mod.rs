//! Output locations for captured tool streams.
//!
//! ```text
//! {root}/RegRipperError/RegRipperError.txt   stderr of every invocation
//! {root}/RegRipperOutput/{name}_{id}.txt     stdout of one hive file
//! ```
//!
//! Every file here is opened in append mode and never truncated. Re-running
//! the pass over the same hive appends a second report to the same file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Directory holding the shared stderr capture.
pub const ERROR_DIR_NAME: &str = "RegRipperError";
/// Shared stderr capture file name.
pub const ERROR_FILE_NAME: &str = "RegRipperError.txt";
/// Directory holding per-hive reports.
pub const REPORT_DIR_NAME: &str = "RegRipperOutput";

/// The module's output directory tree, derived from its root alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    root: PathBuf,
    report_dir: PathBuf,
    error_dir: PathBuf,
    error_file: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let error_dir = root.join(ERROR_DIR_NAME);
        Self {
            report_dir: root.join(REPORT_DIR_NAME),
            error_file: error_dir.join(ERROR_FILE_NAME),
            error_dir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn error_dir(&self) -> &Path {
        &self.error_dir
    }

    pub fn error_file(&self) -> &Path {
        &self.error_file
    }

    /// Create both directories and the (possibly pre-existing) error capture.
    pub fn create(&self) -> io::Result<ErrorCapture> {
        fs::create_dir_all(&self.report_dir)?;
        fs::create_dir_all(&self.error_dir)?;
        let capture = ErrorCapture::new(self.error_file.clone());
        capture.open()?;
        Ok(capture)
    }

    /// Report location for one hive file.
    pub fn capture_target(&self, reported_name: &str, id: u64) -> CaptureTarget {
        CaptureTarget::new(&self.report_dir, reported_name, id)
    }
}

/// Where one hive file's tool report goes.
///
/// The path depends only on the report directory, the catalog-reported name
/// and the catalog id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureTarget {
    path: PathBuf,
}

impl CaptureTarget {
    pub fn new(report_dir: &Path, reported_name: &str, id: u64) -> Self {
        Self {
            path: report_dir.join(format!("{}_{}.txt", sanitize_name(reported_name), id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the file if absent, then open it for appending.
    pub fn open(&self) -> io::Result<File> {
        open_append(&self.path)
    }
}

/// The single stderr sink shared by every invocation in a run.
///
/// Each invocation opens its own `O_APPEND` handle, so writes from
/// concurrent invocations land whole at the end of the file instead of
/// overwriting each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCapture {
    path: PathBuf,
}

impl ErrorCapture {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> io::Result<File> {
        open_append(&self.path)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Keep a reported name usable as a single path component.
///
/// Catalog names are plain file names in practice; separators or a bare
/// `..` would otherwise let the report escape the report directory.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
