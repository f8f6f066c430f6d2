//! Finalize-time removal of empty output locations.

use std::fs;
use std::io;
use std::path::Path;

use super::report::FinalizeReport;
use crate::capture::OutputLayout;

/// Remove the report directory if it holds nothing, the error capture (and
/// its directory) if it is zero bytes, and the root if both went.
///
/// Problems are logged, never returned.
pub(super) fn remove_empty_outputs(layout: &OutputLayout) -> FinalizeReport {
    let mut report = FinalizeReport::default();

    match dir_is_empty(layout.report_dir()) {
        Ok(true) => match fs::remove_dir(layout.report_dir()) {
            Ok(()) => report.report_dir_removed = true,
            Err(e) => warn_cleanup(layout.report_dir(), &e),
        },
        Ok(false) => {}
        Err(e) => warn_cleanup(layout.report_dir(), &e),
    }

    match fs::metadata(layout.error_file()) {
        Ok(meta) if meta.len() == 0 => {
            let removed = fs::remove_file(layout.error_file())
                .and_then(|()| fs::remove_dir(layout.error_dir()));
            match removed {
                Ok(()) => report.error_capture_removed = true,
                Err(e) => warn_cleanup(layout.error_dir(), &e),
            }
        }
        Ok(_) => {}
        Err(e) => warn_cleanup(layout.error_file(), &e),
    }

    if report.report_dir_removed && report.error_capture_removed {
        match fs::remove_dir(layout.root()) {
            Ok(()) => report.root_removed = true,
            Err(e) => warn_cleanup(layout.root(), &e),
        }
    }

    tracing::debug!(?report, "finalize cleanup done");
    report
}

fn dir_is_empty(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn warn_cleanup(path: &Path, error: &io::Error) {
    tracing::warn!(path = %path.display(), %error, "could not clean up output location");
}
