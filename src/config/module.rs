//! Resolved, immutable module configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::settings::Settings;
use super::ConfigError;
use crate::capture::OutputLayout;

/// Tool location relative to the program directory when `-e` is not given.
pub const DEFAULT_TOOL_RELATIVE_PATH: &[&str] = &["RegRipper", "rip.exe"];

/// Module subdirectory of the host output directory when `-o` is not given.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "RegRipper";

/// Host-wide properties the module may fall back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemProperty {
    /// Directory the host program is installed in.
    ProgramDir,
    /// Host output directory for the current case.
    OutputDir,
}

/// Property lookup. An unset property is the empty string, never an error.
pub trait SystemProperties {
    fn get(&self, property: SystemProperty) -> String;
}

/// Fixed property values.
#[derive(Debug, Clone, Default)]
pub struct StaticProperties {
    pub program_dir: String,
    pub output_dir: String,
}

impl StaticProperties {
    pub fn new(program_dir: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            program_dir: program_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Properties from the `[properties]` settings table, falling back to
    /// `fallback` for anything unset there.
    pub fn from_settings(settings: &Settings, fallback: &dyn SystemProperties) -> Self {
        let props = &settings.properties;
        Self {
            program_dir: props
                .program_dir
                .clone()
                .unwrap_or_else(|| fallback.get(SystemProperty::ProgramDir)),
            output_dir: props
                .output_dir
                .clone()
                .unwrap_or_else(|| fallback.get(SystemProperty::OutputDir)),
        }
    }
}

impl SystemProperties for StaticProperties {
    fn get(&self, property: SystemProperty) -> String {
        match property {
            SystemProperty::ProgramDir => self.program_dir.clone(),
            SystemProperty::OutputDir => self.output_dir.clone(),
        }
    }
}

/// Configuration every component is constructed from.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Hive-dump executable.
    pub tool_path: PathBuf,
    /// Output directory tree.
    pub layout: OutputLayout,
    /// Bound on one tool invocation; `None` waits for exit.
    pub tool_timeout: Option<Duration>,
    /// How often a running child is polled for exit.
    pub poll_interval: Duration,
    /// Time between SIGTERM and kill after a timeout.
    pub termination_grace: Duration,
}

impl ModuleConfig {
    /// Resolve settings against host properties.
    ///
    /// Does not touch the filesystem; see [`verify_executable`] and
    /// [`OutputLayout::create`].
    pub fn resolve(settings: &Settings, properties: &dyn SystemProperties) -> Result<Self, ConfigError> {
        let tool_path = match settings.tool_path {
            Some(ref raw) => non_empty(normalize_path(raw), "tool_path")?,
            None => {
                let mut path = PathBuf::from(normalize_path(&properties.get(SystemProperty::ProgramDir)));
                for part in DEFAULT_TOOL_RELATIVE_PATH {
                    path.push(part);
                }
                path
            }
        };

        let output_root = match settings.output_dir {
            Some(ref raw) => non_empty(normalize_path(raw), "output_dir")?,
            None => {
                let out_dir = normalize_path(&properties.get(SystemProperty::OutputDir));
                if out_dir.is_empty() {
                    return Err(ConfigError::EmptyOutputPath);
                }
                Path::new(&out_dir).join(DEFAULT_OUTPUT_SUBDIR)
            }
        };

        Ok(Self {
            tool_path,
            layout: OutputLayout::new(output_root),
            tool_timeout: settings.tool_timeout_seconds.map(Duration::from_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            termination_grace: Duration::from_secs(settings.termination_grace_seconds),
        })
    }
}

fn non_empty(value: String, name: &str) -> Result<PathBuf, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{} is empty", name)));
    }
    Ok(PathBuf::from(value))
}

/// Trim whitespace and one pair of surrounding quotes.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Fail unless `path` is an existing file the current user may execute.
pub fn verify_executable(path: &Path) -> Result<(), ConfigError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Err(ConfigError::ToolNotExecutable(path.to_path_buf())),
    };
    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(ConfigError::ToolNotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}
