//! Hive categories and candidate selection.

mod select;

pub use select::{materialize, query_candidates, resolve_candidate, Candidate};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::evidence::FileFilter;

/// The registry hives the module runs the tool against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HiveCategory {
    Ntuser,
    System,
    Sam,
    Software,
}

impl HiveCategory {
    /// Processing order for a report pass.
    pub const ALL: [HiveCategory; 4] = [
        HiveCategory::Ntuser,
        HiveCategory::System,
        HiveCategory::Sam,
        HiveCategory::Software,
    ];

    /// On-disk file name of this hive, compared case-insensitively.
    pub fn canonical_filename(self) -> &'static str {
        match self {
            HiveCategory::Ntuser => "NTUSER.DAT",
            HiveCategory::System => "SYSTEM",
            HiveCategory::Sam => "SAM",
            HiveCategory::Software => "SOFTWARE",
        }
    }

    /// Extraction profile passed to the tool with `-f`.
    pub fn profile(self) -> &'static str {
        match self {
            HiveCategory::Ntuser => "ntuser",
            HiveCategory::System => "system",
            HiveCategory::Sam => "sam",
            HiveCategory::Software => "software",
        }
    }

    /// True if `name` is this hive's file name, ignoring ASCII case.
    pub fn matches_name(self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.canonical_filename())
    }

    /// Catalog filter for candidate files of this category.
    pub fn filter(self) -> FileFilter {
        FileFilter::regular_named(self.canonical_filename())
    }
}

impl fmt::Display for HiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HiveCategory::Ntuser => "NTUSER",
            HiveCategory::System => "SYSTEM",
            HiveCategory::Sam => "SAM",
            HiveCategory::Software => "SOFTWARE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown hive category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for HiveCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HiveCategory::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s) || c.profile().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
