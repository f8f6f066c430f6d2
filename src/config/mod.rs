//! Configuration for the hive report module
//!
//! Settings are merged from four layers, last wins:
//! 1. Built-in defaults
//! 2. TOML settings file (`--config`)
//! 3. Module argument string (`-e<path>;-o<path>`)
//! 4. CLI flags
//!
//! The merged [`Settings`] are then resolved against the host's
//! [`SystemProperties`] into an immutable [`ModuleConfig`].

mod args;
mod defaults;
mod merge;
mod module;
mod settings;

pub use args::ModuleArgs;
pub use defaults::BuiltinDefaults;
pub use merge::{deep_merge, merge_layers};
pub use module::{
    normalize_path, verify_executable, ModuleConfig, StaticProperties, SystemProperties,
    SystemProperty, DEFAULT_OUTPUT_SUBDIR, DEFAULT_TOOL_RELATIVE_PATH,
};
pub use settings::{ConfigOrigin, ConfigSource, PropertySettings, Settings};

use std::path::PathBuf;

/// Configuration errors. All of them leave the module inoperable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing argument to -{flag} option")]
    MissingArgument { flag: char },

    #[error("empty output path")]
    EmptyOutputPath,

    #[error("{} does not exist or is not executable", .0.display())]
    ToolNotExecutable(PathBuf),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}
