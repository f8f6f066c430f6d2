//! Module lifecycle: initialize, report, finalize.
//!
//! ```text
//! Uninitialized --initialize--> Ready --report--> Reporting --> Ready
//!                                                          \--> Failed
//! Ready/Uninitialized --finalize--> Finalized
//! ```
//!
//! `Failed` is absorbing. Each entry point returns a [`Status`], the
//! three-valued result the host pipeline expects; the `run_*` variants
//! return the typed result instead.

mod cleanup;
mod pass;
mod report;

pub use report::{CategoryReport, FileOutcome, FileReport, FinalizeReport, RecordedFile, RunReport};

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::capture::ErrorCapture;
use crate::config::{verify_executable, ConfigError, ModuleConfig, Settings, SystemProperties};
use crate::evidence::{Catalog, CatalogError, EvidenceError, EvidenceStore, FileContent};
use crate::hive::HiveCategory;
use crate::invoke::{InvokeError, InvokerConfig, ToolInvoker};
use crate::record::ArtifactRecorder;

use pass::Pass;

/// Result of a lifecycle entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Continue.
    Ok,
    /// The step failed.
    Fail,
    /// The step ended early on request; stop the pipeline.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Uninitialized,
    Ready,
    Reporting,
    Finalized,
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Uninitialized => "uninitialized",
            ModuleState::Ready => "ready",
            ModuleState::Reporting => "reporting",
            ModuleState::Finalized => "finalized",
            ModuleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ModuleState,
    },

    #[error("{category}: {source}")]
    Catalog {
        category: HiveCategory,
        #[source]
        source: CatalogError,
    },

    #[error("{category}: file {file_id}: {source}")]
    Invoke {
        category: HiveCategory,
        file_id: u64,
        #[source]
        source: InvokeError,
    },

    #[error("recording file {file_id}: {source}")]
    Evidence {
        file_id: u64,
        #[source]
        source: EvidenceError,
    },
}

/// The collaborators a report pass works against.
pub struct Services<'a> {
    pub catalog: &'a dyn Catalog,
    pub content: &'a dyn FileContent,
    pub evidence: &'a mut dyn EvidenceStore,
}

struct Prepared {
    config: ModuleConfig,
    invoker: ToolInvoker,
    errors: ErrorCapture,
}

/// The hive report module.
pub struct HiveReportModule {
    state: ModuleState,
    prepared: Option<Prepared>,
    recorder: ArtifactRecorder,
    cancel: CancelToken,
}

impl Default for HiveReportModule {
    fn default() -> Self {
        Self::new()
    }
}

impl HiveReportModule {
    pub fn new() -> Self {
        Self::with_cancel_token(CancelToken::new())
    }

    pub fn with_cancel_token(cancel: CancelToken) -> Self {
        Self {
            state: ModuleState::Uninitialized,
            prepared: None,
            recorder: ArtifactRecorder::default(),
            cancel,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Resolved configuration, once initialized.
    pub fn config(&self) -> Option<&ModuleConfig> {
        self.prepared.as_ref().map(|p| &p.config)
    }

    /// Initialize from the host's semicolon-separated module arguments.
    pub fn initialize(&mut self, args: &str, properties: &dyn SystemProperties) -> Status {
        let result = match Settings::from_module_args(args) {
            Ok(settings) => self.run_initialize(&settings, properties),
            Err(e) => {
                if self.state == ModuleState::Uninitialized {
                    self.state = ModuleState::Failed;
                }
                Err(e.into())
            }
        };
        self.status_of(result.map(|_| false), "initialize")
    }

    /// Resolve `settings`, check the tool and create the output tree.
    pub fn run_initialize(
        &mut self,
        settings: &Settings,
        properties: &dyn SystemProperties,
    ) -> Result<(), LifecycleError> {
        if self.state != ModuleState::Uninitialized {
            return Err(LifecycleError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }

        match Self::prepare(settings, properties) {
            Ok(prepared) => {
                tracing::info!(
                    tool = %prepared.config.tool_path.display(),
                    output = %prepared.config.layout.root().display(),
                    "module initialized"
                );
                self.prepared = Some(prepared);
                self.state = ModuleState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = ModuleState::Failed;
                Err(e)
            }
        }
    }

    fn prepare(settings: &Settings, properties: &dyn SystemProperties) -> Result<Prepared, LifecycleError> {
        let config = ModuleConfig::resolve(settings, properties)?;
        verify_executable(&config.tool_path)?;

        let errors = config.layout.create().map_err(|source| LifecycleError::OutputDir {
            path: config.layout.root().to_path_buf(),
            source,
        })?;
        let invoker = ToolInvoker::new(InvokerConfig::from(&config));

        Ok(Prepared { config, invoker, errors })
    }

    /// Run the report pass and reduce the result to a [`Status`].
    pub fn report(&mut self, services: &mut Services<'_>) -> Status {
        let result = self.run_report(services).map(|r| r.stopped);
        self.status_of(result, "report")
    }

    /// Run the tool over every hive category in order, then record OS
    /// facts from the SOFTWARE and SYSTEM reports.
    ///
    /// A stop request ends the pass at the next file boundary, skips
    /// recording and returns the partial report with `stopped` set.
    pub fn run_report(&mut self, services: &mut Services<'_>) -> Result<RunReport, LifecycleError> {
        if self.state != ModuleState::Ready {
            return Err(LifecycleError::InvalidState {
                operation: "report",
                state: self.state,
            });
        }
        let Some(prepared) = self.prepared.as_ref() else {
            return Err(LifecycleError::InvalidState {
                operation: "report",
                state: self.state,
            });
        };

        self.state = ModuleState::Reporting;
        let pass = Pass {
            invoker: &prepared.invoker,
            layout: &prepared.config.layout,
            errors: &prepared.errors,
            cancel: &self.cancel,
        };

        let mut run = RunReport::new(
            prepared.config.tool_path.clone(),
            prepared.config.layout.root().to_path_buf(),
        );
        let result = Self::execute(&pass, &self.recorder, services, &mut run);
        run.finished_at = Some(chrono::Utc::now());

        match result {
            Ok(()) => {
                self.state = ModuleState::Ready;
                tracing::info!(
                    run_id = %run.run_id,
                    succeeded = run.files_succeeded(),
                    failed = run.files_failed(),
                    artifacts = run.artifacts_recorded(),
                    stopped = run.stopped,
                    "report pass complete"
                );
                Ok(run)
            }
            Err(e) => {
                self.state = ModuleState::Failed;
                Err(e)
            }
        }
    }

    fn execute(
        pass: &Pass<'_>,
        recorder: &ArtifactRecorder,
        services: &mut Services<'_>,
        run: &mut RunReport,
    ) -> Result<(), LifecycleError> {
        for category in HiveCategory::ALL {
            if pass.cancel.is_cancelled() {
                run.stopped = true;
                return Ok(());
            }
            let report = pass.run_category(services, category)?;
            let interrupted = report.interrupted;
            run.categories.push(report);
            if interrupted {
                run.stopped = true;
                return Ok(());
            }
        }

        run.recorded = pass.record_all(services, recorder, &run.categories)?;
        Ok(())
    }

    /// Remove output locations that ended up empty. Safe to call more than
    /// once; only the first call does anything.
    pub fn finalize(&mut self) -> Status {
        self.run_finalize();
        Status::Ok
    }

    pub fn run_finalize(&mut self) -> FinalizeReport {
        if self.state == ModuleState::Finalized {
            return FinalizeReport::default();
        }

        let report = match self.prepared {
            Some(ref prepared) => cleanup::remove_empty_outputs(&prepared.config.layout),
            None => FinalizeReport::default(),
        };

        if self.state != ModuleState::Failed {
            self.state = ModuleState::Finalized;
        }
        // Failed stays failed, but cleanup never runs twice.
        self.prepared = None;
        report
    }

    fn status_of(&self, result: Result<bool, LifecycleError>, operation: &str) -> Status {
        match result {
            Ok(false) => Status::Ok,
            Ok(true) => Status::Stop,
            Err(e) => {
                tracing::error!(operation, error = %e, "hive report module failed");
                Status::Fail
            }
        }
    }
}
