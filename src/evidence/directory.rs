//! Catalog and content collaborator over a directory of extracted evidence.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Catalog, CatalogError, ContentError, FileContent, FileFilter, HiveFileRef};

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    name: String,
    source: PathBuf,
    is_regular: bool,
}

/// Every entry below `root`, numbered from 1 in sorted walk order.
///
/// Symlinks are catalogued but never followed and never count as regular
/// files. With a staging directory, [`FileContent::materialize`] copies the
/// bytes to `{staging}/{id}/{name}`; without one, the source path is used
/// in place after checking it is readable.
#[derive(Debug, Clone)]
pub struct DirectoryEvidence {
    root: PathBuf,
    entries: Vec<Entry>,
    staging: Option<PathBuf>,
}

impl DirectoryEvidence {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CatalogError::Query(format!(
                "evidence root is not a directory: {}",
                root.display()
            )));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
            entries.push(Entry {
                id: entries.len() as u64 + 1,
                name: entry.file_name().to_string_lossy().to_string(),
                source: entry.path().to_path_buf(),
                is_regular: entry.file_type().is_file(),
            });
        }

        tracing::debug!(root = %root.display(), entries = entries.len(), "catalogued evidence directory");
        Ok(Self {
            root,
            entries,
            staging: None,
        })
    }

    /// Copy materialized files under `staging` instead of using them in place.
    pub fn with_staging(mut self, staging: impl Into<PathBuf>) -> Self {
        self.staging = Some(staging.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: u64) -> Result<&Entry, ContentError> {
        id.checked_sub(1)
            .and_then(|idx| self.entries.get(idx as usize))
            .ok_or(ContentError::NotFound(id))
    }
}

impl Catalog for DirectoryEvidence {
    fn file_ids(&self, filter: &FileFilter) -> Result<Vec<u64>, CatalogError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| filter.matches(&e.name, e.is_regular))
            .map(|e| e.id)
            .collect())
    }
}

impl FileContent for DirectoryEvidence {
    fn file(&self, id: u64) -> Result<HiveFileRef, ContentError> {
        let entry = self.entry(id)?;
        Ok(HiveFileRef::new(entry.id, entry.name.clone()))
    }

    fn materialize(&self, file: &mut HiveFileRef) -> Result<(), ContentError> {
        let entry = self.entry(file.id)?;
        let io_err = |source: std::io::Error| ContentError::Io { id: file.id, source };

        let local = match self.staging {
            Some(ref staging) => {
                let dir = staging.join(entry.id.to_string());
                fs::create_dir_all(&dir).map_err(io_err)?;
                let dest = dir.join(&entry.name);
                fs::copy(&entry.source, &dest).map_err(io_err)?;
                dest
            }
            None => {
                File::open(&entry.source).map_err(io_err)?;
                entry.source.clone()
            }
        };

        file.path = Some(local);
        Ok(())
    }

    fn open(&self, file: &HiveFileRef) -> Result<Box<dyn Read>, ContentError> {
        let path = match file.path {
            Some(ref p) => p.clone(),
            None => self.entry(file.id)?.source.clone(),
        };
        let f = File::open(&path).map_err(|source| ContentError::Io { id: file.id, source })?;
        Ok(Box::new(f))
    }
}
