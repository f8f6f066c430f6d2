//! The per-category materialize-and-invoke pass and the recording pass.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::report::{CategoryReport, FileOutcome, FileReport, RecordedFile};
use super::{LifecycleError, Services};
use crate::cancel::CancelToken;
use crate::capture::{ErrorCapture, OutputLayout};
use crate::evidence::HiveFileRef;
use crate::hive::{self, Candidate, HiveCategory};
use crate::invoke::ToolInvoker;
use crate::record::{ArtifactRecorder, RecordError, RECORDED_CATEGORIES};

pub(super) struct Pass<'a> {
    pub invoker: &'a ToolInvoker,
    pub layout: &'a OutputLayout,
    pub errors: &'a ErrorCapture,
    pub cancel: &'a CancelToken,
}

impl Pass<'_> {
    /// Run the tool over every catalog hit for `category`.
    ///
    /// Lookup, name and materialize problems skip the file. Failing to
    /// query the catalog, open a capture file or start the tool ends the
    /// category with an error.
    pub fn run_category(
        &self,
        services: &Services<'_>,
        category: HiveCategory,
    ) -> Result<CategoryReport, LifecycleError> {
        let condition = category.filter().to_expression();
        let ids = hive::query_candidates(services.catalog, category)
            .map_err(|source| LifecycleError::Catalog { category, source })?;

        let mut report = CategoryReport::new(category, condition, ids.len());
        tracing::info!(%category, candidates = ids.len(), "processing hive category");

        for id in ids {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let file_report = self.process_file(services, category, id)?;
            report.files.push(file_report);
        }

        Ok(report)
    }

    fn process_file(
        &self,
        services: &Services<'_>,
        category: HiveCategory,
        id: u64,
    ) -> Result<FileReport, LifecycleError> {
        let mut file = match hive::resolve_candidate(services.content, category, id) {
            Ok(Candidate::Accepted(file)) => file,
            Ok(Candidate::NameMismatch(file)) => {
                tracing::debug!(%category, file_id = id, file_name = %file.name, "catalog hit has another name, skipping");
                return Ok(file_report(&file, None, FileOutcome::NameMismatch));
            }
            Err(e) => {
                tracing::warn!(%category, file_id = id, error = %e, "file lookup failed, skipping");
                return Ok(file_report(
                    &HiveFileRef::new(id, ""),
                    None,
                    FileOutcome::LookupFailed { error: e.to_string() },
                ));
            }
        };

        let local = match hive::materialize(services.content, &mut file) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(%category, file_id = id, file_name = %file.name, error = %e, "materialize failed, skipping");
                return Ok(file_report(&file, None, FileOutcome::MaterializeFailed { error: e.to_string() }));
            }
        };

        let sha256 = match sha256_file(&local) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::debug!(file_id = id, error = %e, "could not hash hive");
                None
            }
        };

        let target = self.layout.capture_target(&file.name, file.id);
        let invocation = self
            .invoker
            .run(category.profile(), &local, &target, self.errors)
            .map_err(|source| LifecycleError::Invoke {
                category,
                file_id: id,
                source,
            })?;

        if invocation.outcome.is_success() {
            tracing::info!(%category, file_id = id, file_name = %file.name, duration_ms = invocation.duration_ms, "tool finished");
        } else {
            tracing::warn!(
                %category,
                file_id = id,
                file_name = %file.name,
                outcome = ?invocation.outcome,
                "tool failed on file"
            );
        }

        Ok(file_report(
            &file,
            sha256,
            FileOutcome::Invoked {
                capture: target.path().to_path_buf(),
                invocation,
            },
        ))
    }

    /// Mine the reports of every successfully processed SOFTWARE and SYSTEM
    /// hive and record what they hold.
    pub fn record_all(
        &self,
        services: &mut Services<'_>,
        recorder: &ArtifactRecorder,
        categories: &[CategoryReport],
    ) -> Result<Vec<RecordedFile>, LifecycleError> {
        let mut recorded = Vec::new();

        for category in RECORDED_CATEGORIES {
            let Some(report) = categories.iter().find(|c| c.category == category) else {
                continue;
            };
            for file in report.succeeded() {
                let file_ref = HiveFileRef {
                    id: file.file_id,
                    name: file.file_name.clone(),
                    path: file.local_path.clone(),
                };
                let target = self.layout.capture_target(&file.file_name, file.file_id);

                match recorder.record(&mut *services.evidence, &file_ref, category, &target) {
                    Ok(outcome) => recorded.push(RecordedFile {
                        category,
                        file_id: file.file_id,
                        file_name: file.file_name.clone(),
                        outcome,
                    }),
                    Err(RecordError::Scan(e)) => {
                        tracing::warn!(%category, file_id = file.file_id, error = %e, "could not read capture, skipping");
                    }
                    Err(RecordError::Evidence(source)) => {
                        return Err(LifecycleError::Evidence {
                            file_id: file.file_id,
                            source,
                        });
                    }
                }
            }
        }

        Ok(recorded)
    }
}

fn file_report(file: &HiveFileRef, sha256: Option<String>, outcome: FileOutcome) -> FileReport {
    FileReport {
        file_id: file.id,
        file_name: file.name.clone(),
        local_path: file.path.clone(),
        sha256,
        outcome,
    }
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
