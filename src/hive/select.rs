//! Catalog query and materialization for one category.

use std::io;
use std::path::PathBuf;

use super::HiveCategory;
use crate::evidence::{Catalog, CatalogError, ContentError, FileContent, HiveFileRef};

/// A catalog hit after its reported name has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Name equals the category's file name.
    Accepted(HiveFileRef),
    /// The catalog returned it, but the name is something else.
    NameMismatch(HiveFileRef),
}

/// File ids the catalog returns for `category`.
///
/// The catalog may return more than exact-name hits; callers go through
/// [`resolve_candidate`] before trusting an id.
pub fn query_candidates(catalog: &dyn Catalog, category: HiveCategory) -> Result<Vec<u64>, CatalogError> {
    let filter = category.filter();
    tracing::debug!(%category, condition = %filter.to_expression(), "querying catalog");
    let ids = catalog.file_ids(&filter)?;
    tracing::debug!(%category, candidates = ids.len(), "catalog query complete");
    Ok(ids)
}

/// Look up `id` and re-check its name against the category.
pub fn resolve_candidate(
    content: &dyn FileContent,
    category: HiveCategory,
    id: u64,
) -> Result<Candidate, ContentError> {
    let file = content.file(id)?;
    if category.matches_name(&file.name) {
        Ok(Candidate::Accepted(file))
    } else {
        Ok(Candidate::NameMismatch(file))
    }
}

/// Have the content collaborator write the file locally; return its path.
pub fn materialize(content: &dyn FileContent, file: &mut HiveFileRef) -> Result<PathBuf, ContentError> {
    content.materialize(file)?;
    file.path.clone().ok_or_else(|| ContentError::Io {
        id: file.id,
        source: io::Error::new(io::ErrorKind::NotFound, "materialized file has no local path"),
    })
}
