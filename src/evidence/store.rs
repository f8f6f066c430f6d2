//! Evidence store implementations.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{Artifact, ArtifactId, ArtifactKind, Attribute, EvidenceError, EvidenceStore, HiveFileRef};

/// Keeps artifacts in memory, ids assigned from 1.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    artifacts: Vec<Artifact>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        id.0.checked_sub(1).and_then(|idx| self.artifacts.get(idx as usize))
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn create_artifact(&mut self, file: &HiveFileRef, kind: ArtifactKind) -> Result<ArtifactId, EvidenceError> {
        let id = ArtifactId(self.artifacts.len() as u64 + 1);
        self.artifacts.push(Artifact {
            id,
            kind,
            file_id: file.id,
            file_name: file.name.clone(),
            created_at: Utc::now(),
            attributes: Vec::new(),
        });
        Ok(id)
    }

    fn add_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<(), EvidenceError> {
        let slot = artifact
            .0
            .checked_sub(1)
            .and_then(|idx| self.artifacts.get_mut(idx as usize))
            .ok_or(EvidenceError::UnknownArtifact(artifact))?;
        slot.attributes.push(attribute);
        Ok(())
    }
}

/// Appends artifacts to a JSON-lines file on [`flush`](Self::flush).
///
/// Artifacts are buffered until flushed so that each line carries the
/// artifact with all its attributes. Each artifact is written once.
#[derive(Debug)]
pub struct JsonlEvidenceStore {
    path: PathBuf,
    inner: MemoryEvidenceStore,
    flushed: usize,
}

impl JsonlEvidenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: MemoryEvidenceStore::new(),
            flushed: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artifacts(&self) -> &[Artifact] {
        self.inner.artifacts()
    }

    /// Write every artifact not yet written. Returns how many were written.
    pub fn flush(&mut self) -> Result<usize, EvidenceError> {
        let pending = &self.inner.artifacts()[self.flushed..];
        if pending.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for artifact in pending {
            serde_json::to_writer(&mut writer, artifact)
                .map_err(|e| EvidenceError::Serialization(e.to_string()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let written = pending.len();
        self.flushed += written;
        tracing::debug!(path = %self.path.display(), written, "flushed artifacts");
        Ok(written)
    }
}

impl EvidenceStore for JsonlEvidenceStore {
    fn create_artifact(&mut self, file: &HiveFileRef, kind: ArtifactKind) -> Result<ArtifactId, EvidenceError> {
        self.inner.create_artifact(file, kind)
    }

    fn add_attribute(&mut self, artifact: ArtifactId, attribute: Attribute) -> Result<(), EvidenceError> {
        if (artifact.0 as usize) <= self.flushed {
            // Already on disk; lines are never rewritten.
            return Err(EvidenceError::UnknownArtifact(artifact));
        }
        self.inner.add_attribute(artifact, attribute)
    }
}
