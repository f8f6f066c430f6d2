//! Turns scanned report fields into operating-system evidence.

use serde::Serialize;
use thiserror::Error;

use hive_rip_scan::{scan_file, ScanError};

use crate::capture::CaptureTarget;
use crate::evidence::{
    ArtifactId, ArtifactKind, Attribute, AttributeKind, EvidenceError, EvidenceStore, HiveFileRef,
};
use crate::hive::HiveCategory;

/// Producer name stamped on every attribute.
pub const PRODUCER_NAME: &str = "RegRipper";

/// One report field and the attribute it becomes.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub attribute: AttributeKind,
    pub normalize: fn(&str) -> String,
}

const SOFTWARE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        field: "ProductName",
        attribute: AttributeKind::ProgramName,
        normalize: pass_through,
    },
    FieldSpec {
        field: "CSDVersion",
        attribute: AttributeKind::Version,
        normalize: pass_through,
    },
];

const SYSTEM_FIELDS: &[FieldSpec] = &[FieldSpec {
    field: "ProcessorArchitecture",
    attribute: AttributeKind::ProcessorArchitecture,
    normalize: normalize_architecture,
}];

/// Fields mined from a category's reports. Empty for hives that carry no
/// operating-system facts.
pub fn fields_for(category: HiveCategory) -> &'static [FieldSpec] {
    match category {
        HiveCategory::Software => SOFTWARE_FIELDS,
        HiveCategory::System => SYSTEM_FIELDS,
        HiveCategory::Ntuser | HiveCategory::Sam => &[],
    }
}

/// Categories whose reports are mined, in recording order.
pub const RECORDED_CATEGORIES: [HiveCategory; 2] = [HiveCategory::Software, HiveCategory::System];

/// Map the literal `AMD64` to `x86-64`; anything else is returned as is.
pub fn normalize_architecture(value: &str) -> String {
    match value {
        "AMD64" => "x86-64".to_string(),
        other => other.to_string(),
    }
}

fn pass_through(value: &str) -> String {
    value.to_string()
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),
}

/// What recording did for one hive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RecordOutcome {
    Recorded {
        artifact: ArtifactId,
        attributes: Vec<Attribute>,
    },
    /// No capture file on disk.
    NoCapture,
    /// The report held none of the category's fields.
    NoFields,
}

/// Creates one OS-info artifact per hive report that yields any field.
#[derive(Debug, Clone)]
pub struct ArtifactRecorder {
    producer: String,
}

impl Default for ArtifactRecorder {
    fn default() -> Self {
        Self::new(PRODUCER_NAME)
    }
}

impl ArtifactRecorder {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
        }
    }

    /// Attributes for every field value found in the report, in field order
    /// then file order. Values are trimmed; empty values are dropped.
    pub fn collect_attributes(
        &self,
        category: HiveCategory,
        target: &CaptureTarget,
    ) -> Result<Vec<Attribute>, ScanError> {
        let mut attributes = Vec::new();
        for spec in fields_for(category) {
            for raw in scan_file(target.path(), spec.field)? {
                let value = raw.trim();
                if value.is_empty() {
                    tracing::debug!(field = spec.field, "skipping empty field value");
                    continue;
                }
                attributes.push(Attribute::new(spec.attribute, &self.producer, (spec.normalize)(value)));
            }
        }
        Ok(attributes)
    }

    /// Scan `target` and record what it holds against `file`.
    ///
    /// One attribute per non-blank matched value: values are trimmed and
    /// blank ones dropped. A missing capture file is not an error.
    pub fn record(
        &self,
        store: &mut dyn EvidenceStore,
        file: &HiveFileRef,
        category: HiveCategory,
        target: &CaptureTarget,
    ) -> Result<RecordOutcome, RecordError> {
        let attributes = match self.collect_attributes(category, target) {
            Ok(attrs) => attrs,
            Err(e) if e.is_missing() => {
                tracing::debug!(file_id = file.id, file_name = %file.name, "no capture file, nothing to record");
                return Ok(RecordOutcome::NoCapture);
            }
            Err(e) => return Err(e.into()),
        };

        if attributes.is_empty() {
            return Ok(RecordOutcome::NoFields);
        }

        let artifact = store.create_artifact(file, ArtifactKind::OsInfo)?;
        for attribute in &attributes {
            store.add_attribute(artifact, attribute.clone())?;
        }
        tracing::info!(
            file_id = file.id,
            file_name = %file.name,
            %artifact,
            attributes = attributes.len(),
            "recorded OS info"
        );
        Ok(RecordOutcome::Recorded { artifact, attributes })
    }
}
