//! Report Pass Integration Tests
//!
//! Drives the module through initialize, report and finalize against a
//! directory of evidence and a shell script standing in for `rip`.

#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use hive_rip::evidence::{CatalogError, ContentError, FileContent, FileFilter, HiveFileRef};
use hive_rip::lifecycle::FileOutcome;
use hive_rip::record::RecordOutcome;
use hive_rip::{
    Artifact, AttributeKind, CancelToken, Catalog, DirectoryEvidence, HiveCategory, HiveReportModule,
    JsonlEvidenceStore, MemoryEvidenceStore, ModuleState, Services, Settings, StaticProperties, Status,
};
use tempfile::TempDir;

/// Echoes the profile, then the hive's bytes, to stdout. A hive containing
/// `EXIT_NONZERO` makes it exit 3.
const FAKE_RIP: &str = r#"#!/bin/sh
echo "profile: $2"
cat "$4"
echo "processed $4" >&2
if grep -q EXIT_NONZERO "$4"; then
    exit 3
fi
exit 0
"#;

struct Fixture {
    _dir: TempDir,
    tool: PathBuf,
    evidence: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("rip.sh");
        fs::write(&tool, FAKE_RIP).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let evidence = dir.path().join("evidence");
        fs::create_dir_all(&evidence).unwrap();
        let output = dir.path().join("out").join("RegRipper");

        Self {
            tool,
            evidence,
            output,
            _dir: dir,
        }
    }

    /// Typical Windows layout: one hive of each category.
    fn with_windows_hives() -> Self {
        let fx = Self::new();
        fx.hive(
            "Windows/System32/config/SOFTWARE",
            "ProductName = Windows 7 Professional\nCSDVersion : Service Pack 1\n",
        );
        fx.hive("Windows/System32/config/SYSTEM", "ProcessorArchitecture -> AMD64\n");
        fx.hive("Windows/System32/config/SAM", "sam hive\n");
        fx.hive("Users/alice/NTUSER.DAT", "user hive\n");
        fx
    }

    fn hive(&self, relative: &str, contents: &str) {
        let path = self.evidence.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn settings(&self) -> Settings {
        Settings {
            tool_path: Some(self.tool.to_string_lossy().to_string()),
            output_dir: Some(self.output.to_string_lossy().to_string()),
            ..Settings::default()
        }
    }

    fn module(&self) -> HiveReportModule {
        let mut module = HiveReportModule::new();
        module
            .run_initialize(&self.settings(), &StaticProperties::default())
            .unwrap();
        module
    }

    fn report_dir(&self) -> PathBuf {
        self.output.join("RegRipperOutput")
    }

    fn error_file(&self) -> PathBuf {
        self.output.join("RegRipperError").join("RegRipperError.txt")
    }
}

fn captures(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Returns every id for every filter, like a catalog that ignores the name
/// condition.
struct LooseCatalog(Vec<u64>);

impl Catalog for LooseCatalog {
    fn file_ids(&self, _filter: &FileFilter) -> Result<Vec<u64>, CatalogError> {
        Ok(self.0.clone())
    }
}

/// Content collaborator that fails the lookup or the materialize step for
/// one chosen id each and delegates everything else.
struct FlakyContent<'a> {
    inner: &'a DirectoryEvidence,
    lookup_fails: u64,
    materialize_fails: u64,
}

impl FileContent for FlakyContent<'_> {
    fn file(&self, id: u64) -> Result<HiveFileRef, ContentError> {
        if id == self.lookup_fails {
            return Err(ContentError::NotFound(id));
        }
        self.inner.file(id)
    }

    fn materialize(&self, file: &mut HiveFileRef) -> Result<(), ContentError> {
        if file.id == self.materialize_fails {
            return Err(ContentError::Io {
                id: file.id,
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.materialize(file)
    }

    fn open(&self, file: &HiveFileRef) -> Result<Box<dyn Read>, ContentError> {
        self.inner.open(file)
    }
}

struct BrokenCatalog;

impl Catalog for BrokenCatalog {
    fn file_ids(&self, _filter: &FileFilter) -> Result<Vec<u64>, CatalogError> {
        Err(CatalogError::Query("database is locked".to_string()))
    }
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn test_full_pass_captures_every_hive_and_records_os_info() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();

    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    assert!(!report.stopped);
    assert_eq!(module.state(), ModuleState::Ready);

    let order: Vec<HiveCategory> = report.categories.iter().map(|c| c.category).collect();
    assert_eq!(order, HiveCategory::ALL.to_vec());
    assert_eq!(report.files_succeeded(), 4);
    assert_eq!(report.files_failed(), 0);

    let names = captures(&fx.report_dir());
    assert_eq!(names.len(), 4);
    for category in HiveCategory::ALL {
        let cat = report.category(category).unwrap();
        assert_eq!(cat.candidates, 1);
        let file = &cat.files[0];
        let expected = format!("{}_{}.txt", file.file_name, file.file_id);
        assert!(names.contains(&expected), "missing {} in {:?}", expected, names);
        assert!(file.sha256.is_some());
    }

    let software = report.category(HiveCategory::Software).unwrap();
    let capture = fs::read_to_string(
        fx.report_dir()
            .join(format!("SOFTWARE_{}.txt", software.files[0].file_id)),
    )
    .unwrap();
    assert!(capture.starts_with("profile: software\n"));
    assert!(capture.contains("ProductName = Windows 7 Professional"));

    let errors = fs::read_to_string(fx.error_file()).unwrap();
    assert_eq!(errors.matches("processed ").count(), 4);
    assert!(!capture.contains("processed "));

    let artifacts = store.artifacts();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(report.artifacts_recorded(), 2);

    let software_artifact = artifacts.iter().find(|a| a.file_name == "SOFTWARE").unwrap();
    let values: Vec<(AttributeKind, &str)> = software_artifact
        .attributes
        .iter()
        .map(|a| (a.kind, a.value.as_str()))
        .collect();
    assert_eq!(
        values,
        vec![
            (AttributeKind::ProgramName, "Windows 7 Professional"),
            (AttributeKind::Version, "Service Pack 1"),
        ]
    );

    let system_artifact = artifacts.iter().find(|a| a.file_name == "SYSTEM").unwrap();
    assert_eq!(system_artifact.attributes.len(), 1);
    assert_eq!(system_artifact.attributes[0].kind, AttributeKind::ProcessorArchitecture);
    assert_eq!(system_artifact.attributes[0].value, "x86-64");
    assert_eq!(system_artifact.attributes[0].producer, "RegRipper");
    assert_eq!(system_artifact.attributes[0].source, "");
}

#[test]
fn test_initialize_from_module_arguments() {
    let fx = Fixture::with_windows_hives();
    let mut module = HiveReportModule::new();
    let args = format!("-e {};-o {}", fx.tool.display(), fx.output.display());

    assert_eq!(module.initialize(&args, &StaticProperties::default()), Status::Ok);
    assert_eq!(module.state(), ModuleState::Ready);
    assert!(fx.report_dir().is_dir());
    assert!(fx.error_file().is_file());

    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut services = Services {
        catalog: &evidence,
        content: &evidence,
        evidence: &mut store,
    };
    assert_eq!(module.report(&mut services), Status::Ok);
}

#[test]
fn test_output_defaults_under_host_output_dir() {
    let fx = Fixture::new();
    let host_out = fx.output.parent().unwrap().join("case");
    let props = StaticProperties::new("", host_out.to_string_lossy());
    let mut module = HiveReportModule::new();

    let args = format!("-e {}", fx.tool.display());
    assert_eq!(module.initialize(&args, &props), Status::Ok);
    assert_eq!(
        module.config().unwrap().layout.root(),
        host_out.join("RegRipper").as_path()
    );
    assert!(host_out.join("RegRipper").join("RegRipperOutput").is_dir());
}

// =============================================================================
// Per-file failure isolation
// =============================================================================

#[test]
fn test_nonzero_exit_does_not_stop_following_files() {
    let fx = Fixture::new();
    fx.hive("a/SOFTWARE", "EXIT_NONZERO\nProductName = Broken Build\n");
    fx.hive("b/SOFTWARE", "ProductName = Windows 10 Pro\n");
    fx.hive("c/SYSTEM", "ProcessorArchitecture = x86\n");

    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();
    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    let software = report.category(HiveCategory::Software).unwrap();
    assert_eq!(software.files.len(), 2);
    assert!(!software.files[0].outcome.is_success());
    assert!(software.files[0].outcome.is_file_failure());
    assert!(software.files[1].outcome.is_success());
    assert_eq!(report.files_failed(), 1);

    // The failed file's capture still holds what the tool wrote.
    let failed_capture = fx
        .report_dir()
        .join(format!("SOFTWARE_{}.txt", software.files[0].file_id));
    assert!(fs::read_to_string(failed_capture).unwrap().contains("Broken Build"));

    // Only successful runs are mined.
    let programs: Vec<&str> = store
        .artifacts()
        .iter()
        .flat_map(|a| a.attributes.iter())
        .filter(|a| a.kind == AttributeKind::ProgramName)
        .map(|a| a.value.as_str())
        .collect();
    assert_eq!(programs, vec!["Windows 10 Pro"]);

    let system = store.artifacts().iter().find(|a| a.file_name == "SYSTEM").unwrap();
    assert_eq!(system.attributes[0].value, "x86");
}

#[test]
fn test_nonzero_exit_does_not_stop_following_categories() {
    let fx = Fixture::with_windows_hives();
    fx.hive("Users/alice/NTUSER.DAT", "EXIT_NONZERO\n");

    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();
    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    let ntuser = report.category(HiveCategory::Ntuser).unwrap();
    assert!(ntuser.files[0].outcome.is_file_failure());
    for category in [HiveCategory::System, HiveCategory::Sam, HiveCategory::Software] {
        let cat = report.category(category).unwrap();
        assert_eq!(cat.succeeded().count(), 1, "{}", category);
    }
    assert_eq!(report.files_failed(), 1);
    assert_eq!(store.artifacts().len(), 2);
}

#[test]
fn test_lookup_and_materialize_failures_skip_only_that_file() {
    let fx = Fixture::new();
    fx.hive("a/SOFTWARE", "ProductName = First\n");
    fx.hive("b/SOFTWARE", "ProductName = Second\n");
    fx.hive("c/SYSTEM", "ProcessorArchitecture = x86\n");
    fx.hive("d/SYSTEM", "ProcessorArchitecture = AMD64\n");

    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let software_ids = evidence.file_ids(&HiveCategory::Software.filter()).unwrap();
    let system_ids = evidence.file_ids(&HiveCategory::System.filter()).unwrap();
    assert_eq!(software_ids.len(), 2);
    assert_eq!(system_ids.len(), 2);

    let content = FlakyContent {
        inner: &evidence,
        lookup_fails: system_ids[0],
        materialize_fails: software_ids[0],
    };
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();
    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &content,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };
    assert_eq!(module.state(), ModuleState::Ready);

    let software = report.category(HiveCategory::Software).unwrap();
    assert!(matches!(software.files[0].outcome, FileOutcome::MaterializeFailed { .. }));
    assert!(software.files[1].outcome.is_success());

    let system = report.category(HiveCategory::System).unwrap();
    assert!(matches!(system.files[0].outcome, FileOutcome::LookupFailed { .. }));
    assert!(system.files[1].outcome.is_success());
    assert_eq!(report.files_failed(), 2);

    let names = captures(&fx.report_dir());
    assert_eq!(
        names,
        vec![
            format!("SOFTWARE_{}.txt", software_ids[1]),
            format!("SYSTEM_{}.txt", system_ids[1]),
        ]
    );

    let values: Vec<&str> = store
        .artifacts()
        .iter()
        .flat_map(|a| a.attributes.iter())
        .map(|a| a.value.as_str())
        .collect();
    assert_eq!(values, vec!["Second", "x86-64"]);
}

#[test]
fn test_name_mismatch_is_skipped_without_running_tool() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let regular_ids: Vec<u64> = (1..=evidence.len() as u64)
        .filter(|id| {
            let file = evidence.file(*id).unwrap();
            HiveCategory::ALL.iter().any(|c| c.matches_name(&file.name))
        })
        .collect();
    assert_eq!(regular_ids.len(), 4);

    let loose = LooseCatalog(regular_ids);
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();
    let report = {
        let mut services = Services {
            catalog: &loose,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    for cat in &report.categories {
        assert_eq!(cat.candidates, 4);
        let mismatched = cat
            .files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::NameMismatch))
            .count();
        assert_eq!(mismatched, 3, "{}", cat.category);
        assert_eq!(cat.succeeded().count(), 1);
    }

    assert_eq!(captures(&fx.report_dir()).len(), 4);
    assert_eq!(store.artifacts().len(), 2);
}

#[test]
fn test_catalog_error_fails_report() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();

    let status = {
        let mut services = Services {
            catalog: &BrokenCatalog,
            content: &evidence,
            evidence: &mut store,
        };
        module.report(&mut services)
    };

    assert_eq!(status, Status::Fail);
    assert_eq!(module.state(), ModuleState::Failed);
    assert!(store.artifacts().is_empty());
}

// =============================================================================
// Capture files across runs
// =============================================================================

#[test]
fn test_rerun_appends_to_existing_captures() {
    let fx = Fixture::new();
    fx.hive("SYSTEM", "ProcessorArchitecture = AMD64\n");
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();

    for _ in 0..2 {
        let mut store = MemoryEvidenceStore::new();
        let mut module = fx.module();
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        assert_eq!(module.report(&mut services), Status::Ok);
        assert_eq!(module.finalize(), Status::Ok);
    }

    let capture = fs::read_to_string(fx.report_dir().join("SYSTEM_1.txt")).unwrap();
    assert_eq!(capture.matches("profile: system").count(), 2);

    let errors = fs::read_to_string(fx.error_file()).unwrap();
    assert_eq!(errors.lines().count(), 2);
}

#[test]
fn test_staging_materializes_copies() {
    let fx = Fixture::new();
    fx.hive("config/SAM", "sam hive\n");
    let staging = fx.output.parent().unwrap().join("staging");
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap().with_staging(&staging);
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();

    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    let sam = &report.category(HiveCategory::Sam).unwrap().files[0];
    let local = sam.local_path.as_ref().unwrap();
    assert!(local.starts_with(&staging));
    assert_eq!(fs::read_to_string(local).unwrap(), "sam hive\n");
}

// =============================================================================
// Evidence store
// =============================================================================

#[test]
fn test_jsonl_store_receives_recorded_artifacts() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let jsonl_path = fx.output.parent().unwrap().join("artifacts.jsonl");
    let mut store = JsonlEvidenceStore::new(&jsonl_path);
    let mut module = fx.module();

    {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        assert_eq!(module.report(&mut services), Status::Ok);
    }
    assert_eq!(store.flush().unwrap(), 2);

    let contents = fs::read_to_string(&jsonl_path).unwrap();
    let artifacts: Vec<Artifact> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(artifacts.len(), 2);
    assert!(artifacts.iter().all(|a| a.kind.as_str() == "TSK_OS_INFO"));
}

#[test]
fn test_report_without_fields_creates_no_artifact() {
    let fx = Fixture::new();
    fx.hive("SOFTWARE", "nothing interesting here\n");
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();

    let report = {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        module.run_report(&mut services).unwrap()
    };

    assert!(store.artifacts().is_empty());
    assert_eq!(report.recorded.len(), 1);
    assert_eq!(report.recorded[0].outcome, RecordOutcome::NoFields);
}

// =============================================================================
// Lifecycle states
// =============================================================================

#[test]
fn test_report_before_initialize_fails() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = HiveReportModule::new();

    let mut services = Services {
        catalog: &evidence,
        content: &evidence,
        evidence: &mut store,
    };
    assert_eq!(module.report(&mut services), Status::Fail);
    assert_eq!(module.state(), ModuleState::Uninitialized);
}

#[test]
fn test_initialize_fails_when_tool_missing() {
    let fx = Fixture::new();
    let mut module = HiveReportModule::new();
    let args = format!(
        "-e {};-o {}",
        fx.tool.with_file_name("missing.sh").display(),
        fx.output.display()
    );

    assert_eq!(module.initialize(&args, &StaticProperties::default()), Status::Fail);
    assert_eq!(module.state(), ModuleState::Failed);
    assert!(!fx.output.exists());

    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut services = Services {
        catalog: &evidence,
        content: &evidence,
        evidence: &mut store,
    };
    assert_eq!(module.report(&mut services), Status::Fail);
}

#[test]
fn test_initialize_fails_without_output_location() {
    let fx = Fixture::new();
    let mut module = HiveReportModule::new();
    let args = format!("-e {}", fx.tool.display());

    assert_eq!(module.initialize(&args, &StaticProperties::default()), Status::Fail);
    assert_eq!(module.state(), ModuleState::Failed);
}

#[test]
fn test_malformed_module_arguments_fail_the_module() {
    let fx = Fixture::new();
    let mut module = HiveReportModule::new();

    assert_eq!(module.initialize("-e", &StaticProperties::default()), Status::Fail);
    assert_eq!(module.state(), ModuleState::Failed);

    let args = format!("-e {};-o {}", fx.tool.display(), fx.output.display());
    assert_eq!(module.initialize(&args, &StaticProperties::default()), Status::Fail);
    assert_eq!(module.state(), ModuleState::Failed);
}

#[test]
fn test_initialize_twice_is_rejected() {
    let fx = Fixture::new();
    let mut module = fx.module();
    assert!(module
        .run_initialize(&fx.settings(), &StaticProperties::default())
        .is_err());
    assert_eq!(module.state(), ModuleState::Ready);
}

#[test]
fn test_finalize_removes_empty_outputs_once() {
    let fx = Fixture::new();
    fx.hive("notes.txt", "not a hive\n");
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();

    {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        assert_eq!(module.report(&mut services), Status::Ok);
    }
    assert!(captures(&fx.report_dir()).is_empty());

    let cleanup = module.run_finalize();
    assert!(cleanup.report_dir_removed);
    assert!(cleanup.error_capture_removed);
    assert!(cleanup.root_removed);
    assert!(!fx.output.exists());
    assert_eq!(module.state(), ModuleState::Finalized);

    let again = module.run_finalize();
    assert!(!again.root_removed);
    assert_eq!(module.finalize(), Status::Ok);
}

#[test]
fn test_finalize_keeps_non_empty_outputs() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();
    let mut module = fx.module();
    {
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: &mut store,
        };
        assert_eq!(module.report(&mut services), Status::Ok);
    }

    let cleanup = module.run_finalize();
    assert!(!cleanup.report_dir_removed);
    assert!(!cleanup.root_removed);
    assert_eq!(captures(&fx.report_dir()).len(), 4);
}

// =============================================================================
// Stop requests
// =============================================================================

#[test]
fn test_stop_request_ends_pass_with_stop_status() {
    let fx = Fixture::with_windows_hives();
    let evidence = DirectoryEvidence::open(&fx.evidence).unwrap();
    let mut store = MemoryEvidenceStore::new();

    let cancel = CancelToken::new();
    let mut module = HiveReportModule::with_cancel_token(cancel.clone());
    module
        .run_initialize(&fx.settings(), &StaticProperties::default())
        .unwrap();
    cancel.cancel();

    let mut services = Services {
        catalog: &evidence,
        content: &evidence,
        evidence: &mut store,
    };
    let report = module.run_report(&mut services).unwrap();
    assert!(report.stopped);
    assert!(report.recorded.is_empty());
    assert!(captures(&fx.report_dir()).is_empty());
    assert_eq!(module.state(), ModuleState::Ready);
    assert_eq!(module.report(&mut services), Status::Stop);
}
