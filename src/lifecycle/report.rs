//! Per-file, per-category and per-run results of a report pass.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hive::HiveCategory;
use crate::invoke::{Invocation, InvocationOutcome};
use crate::record::RecordOutcome;

/// What happened to one catalog hit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The catalog returned it but its name is not the hive's file name.
    NameMismatch,
    /// The content collaborator could not look the file up.
    LookupFailed { error: String },
    /// The content collaborator could not write the file locally.
    MaterializeFailed { error: String },
    /// The tool ran; see the invocation for how it ended.
    Invoked {
        capture: PathBuf,
        #[serde(flatten)]
        invocation: Invocation,
    },
}

impl FileOutcome {
    /// The tool ran and exited 0.
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Invoked { invocation, .. } if invocation.outcome.is_success())
    }

    /// Skipped or failed for this file alone.
    pub fn is_file_failure(&self) -> bool {
        match self {
            FileOutcome::NameMismatch => false,
            FileOutcome::LookupFailed { .. } | FileOutcome::MaterializeFailed { .. } => true,
            FileOutcome::Invoked { invocation, .. } => !invocation.outcome.is_success(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_id: u64,
    /// Catalog-reported name; empty when the lookup itself failed.
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// SHA-256 of the materialized hive, when it could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: HiveCategory,
    /// Catalog condition used for the query.
    pub condition: String,
    pub candidates: usize,
    pub files: Vec<FileReport>,
    /// A stop request ended the category before every candidate was seen.
    pub interrupted: bool,
}

impl CategoryReport {
    pub fn new(category: HiveCategory, condition: String, candidates: usize) -> Self {
        Self {
            category,
            condition,
            candidates,
            files: Vec::new(),
            interrupted: false,
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.outcome.is_success())
    }
}

/// Recording result for one successfully processed hive.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedFile {
    pub category: HiveCategory,
    pub file_id: u64,
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

/// Everything one report pass did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub tool: PathBuf,
    pub output_root: PathBuf,
    pub categories: Vec<CategoryReport>,
    pub recorded: Vec<RecordedFile>,
    /// A stop request ended the pass early; recording was skipped.
    pub stopped: bool,
}

impl RunReport {
    pub fn new(tool: PathBuf, output_root: PathBuf) -> Self {
        Self {
            run_id: ulid::Ulid::new().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            tool,
            output_root,
            categories: Vec::new(),
            recorded: Vec::new(),
            stopped: false,
        }
    }

    pub fn category(&self, category: HiveCategory) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.categories.iter().flat_map(|c| c.files.iter())
    }

    pub fn files_succeeded(&self) -> usize {
        self.files().filter(|f| f.outcome.is_success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.files().filter(|f| f.outcome.is_file_failure()).count()
    }

    pub fn artifacts_recorded(&self) -> usize {
        self.recorded
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Recorded { .. }))
            .count()
    }

    /// Short multi-line summary for terminals.
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {} ({})", self.run_id, self.output_root.display());
        for cat in &self.categories {
            let _ = writeln!(
                out,
                "  {:<9} {} candidate(s), {} processed{}",
                cat.category.to_string(),
                cat.candidates,
                cat.succeeded().count(),
                if cat.interrupted { ", interrupted" } else { "" }
            );
            for file in &cat.files {
                let detail = match &file.outcome {
                    FileOutcome::NameMismatch => "skipped: name mismatch".to_string(),
                    FileOutcome::LookupFailed { error } => format!("lookup failed: {}", error),
                    FileOutcome::MaterializeFailed { error } => format!("materialize failed: {}", error),
                    FileOutcome::Invoked { invocation, .. } => match &invocation.outcome {
                        InvocationOutcome::Succeeded => "ok".to_string(),
                        InvocationOutcome::Failed { code: Some(code), .. } => format!("tool exited {}", code),
                        InvocationOutcome::Failed { signal, .. } => {
                            format!("tool killed ({})", signal.as_deref().unwrap_or("unknown signal"))
                        }
                        InvocationOutcome::TimedOut { after_ms } => format!("tool timed out after {} ms", after_ms),
                    },
                };
                let _ = writeln!(out, "    [{}] {}: {}", file.file_id, file.file_name, detail);
            }
        }
        let _ = writeln!(
            out,
            "{} file(s) processed, {} failed, {} artifact(s) recorded{}",
            self.files_succeeded(),
            self.files_failed(),
            self.artifacts_recorded(),
            if self.stopped { " (stopped)" } else { "" }
        );
        out
    }
}

/// What finalize removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub report_dir_removed: bool,
    pub error_capture_removed: bool,
    pub root_removed: bool,
}
