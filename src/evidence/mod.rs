//! Collaborator boundary: catalog, file content and evidence store.
//!
//! The report pass only talks to these traits. [`DirectoryEvidence`] backs
//! the catalog and content side with a directory of extracted evidence;
//! [`MemoryEvidenceStore`] and [`JsonlEvidenceStore`] back the store.

mod directory;
mod store;

pub use directory::DirectoryEvidence;
pub use store::{JsonlEvidenceStore, MemoryEvidenceStore};

use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One candidate file as the catalog reports it.
///
/// `path` is set once the content collaborator has materialized the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveFileRef {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl HiveFileRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            path: None,
        }
    }
}

/// Catalog filter: optionally only regular files, and the uppercased name
/// equal to a given value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub regular_files_only: bool,
    pub upper_name_equals: String,
}

/// Catalog `dir_type` for regular files.
pub const DIR_TYPE_REGULAR: u32 = 5;

impl FileFilter {
    pub fn regular_named(name: &str) -> Self {
        Self {
            regular_files_only: true,
            upper_name_equals: name.to_uppercase(),
        }
    }

    /// Render as a catalog condition expression.
    pub fn to_expression(&self) -> String {
        let name = self.upper_name_equals.replace('\'', "''");
        if self.regular_files_only {
            format!(
                "WHERE files.dir_type = {} AND UPPER(files.name) = '{}'",
                DIR_TYPE_REGULAR, name
            )
        } else {
            format!("WHERE UPPER(files.name) = '{}'", name)
        }
    }

    /// Evaluate against a single file record.
    pub fn matches(&self, name: &str, is_regular: bool) -> bool {
        (is_regular || !self.regular_files_only) && name.to_uppercase() == self.upper_name_equals
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Query(String),

    #[error("catalog I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no file with id {0}")]
    NotFound(u64),

    #[error("file {id}: {source}")]
    Io {
        id: u64,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("unknown artifact {0}")]
    UnknownArtifact(ArtifactId),

    #[error("evidence store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Resolves a filter to matching file ids.
pub trait Catalog {
    fn file_ids(&self, filter: &FileFilter) -> Result<Vec<u64>, CatalogError>;
}

/// Gives access to the bytes of catalogued files.
pub trait FileContent {
    /// Look up a file by id. The returned handle has no local path yet.
    fn file(&self, id: u64) -> Result<HiveFileRef, ContentError>;

    /// Persist the file's bytes locally and record the local path.
    fn materialize(&self, file: &mut HiveFileRef) -> Result<(), ContentError>;

    /// Read the file's content.
    fn open(&self, file: &HiveFileRef) -> Result<Box<dyn Read>, ContentError>;
}

/// Artifact kinds this module produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "TSK_OS_INFO")]
    OsInfo,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::OsInfo => "TSK_OS_INFO",
        }
    }
}

/// Attribute kinds this module produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    #[serde(rename = "TSK_PROG_NAME")]
    ProgramName,
    #[serde(rename = "TSK_VERSION")]
    Version,
    #[serde(rename = "TSK_PROCESSOR_ARCHITECTURE")]
    ProcessorArchitecture,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::ProgramName => "TSK_PROG_NAME",
            AttributeKind::Version => "TSK_VERSION",
            AttributeKind::ProcessorArchitecture => "TSK_PROCESSOR_ARCHITECTURE",
        }
    }
}

/// A typed value attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub kind: AttributeKind,
    /// Name of the producing module
    pub producer: String,
    /// Source tag; always empty for this module
    pub source: String,
    pub value: String,
}

impl Attribute {
    pub fn new(kind: AttributeKind, producer: &str, value: impl Into<String>) -> Self {
        Self {
            kind,
            producer: producer.to_string(),
            source: String::new(),
            value: value.into(),
        }
    }
}

/// Store-assigned artifact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted evidence artifact tied to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub file_id: u64,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub attributes: Vec<Attribute>,
}

/// Receives artifacts and their attributes.
pub trait EvidenceStore {
    fn create_artifact(&mut self, file: &HiveFileRef, kind: ArtifactKind) -> Result<ArtifactId, EvidenceError>;

    fn add_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<(), EvidenceError>;
}
