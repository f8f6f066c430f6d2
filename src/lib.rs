//! hive-rip - registry hive reports as structured evidence
//!
//! Runs an external hive-dump tool (RegRipper's `rip`) against every
//! NTUSER.DAT, SYSTEM, SAM and SOFTWARE hive found in an evidence catalog,
//! captures each report, then mines the SOFTWARE and SYSTEM reports for
//! operating-system facts and records them as evidence artifacts.
//!
//! The binary-format parsing is entirely the tool's job; this crate owns the
//! process lifecycle, output capture, per-file failure isolation and the
//! text mining (see the `hive-rip-scan` crate).

pub mod cancel;
pub mod capture;
pub mod config;
pub mod evidence;
pub mod hive;
pub mod invoke;
pub mod lifecycle;
pub mod logging;
pub mod record;

pub use cancel::CancelToken;
pub use capture::{CaptureTarget, ErrorCapture, OutputLayout};
pub use config::{ConfigError, ModuleArgs, ModuleConfig, Settings, StaticProperties, SystemProperties};
pub use evidence::{
    Artifact, ArtifactKind, Attribute, AttributeKind, Catalog, DirectoryEvidence, EvidenceStore,
    FileContent, HiveFileRef, JsonlEvidenceStore, MemoryEvidenceStore,
};
pub use hive::HiveCategory;
pub use invoke::{InvocationOutcome, ToolInvoker};
pub use lifecycle::{HiveReportModule, LifecycleError, ModuleState, RunReport, Services, Status};
pub use record::ArtifactRecorder;
