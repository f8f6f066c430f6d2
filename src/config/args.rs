//! Module argument string parsing.
//!
//! The host pipeline hands the module a single semicolon-separated string:
//!
//! ```text
//! -e C:\Tools\RegRipper\rip.exe;-o D:\case\out\RegRipper
//! ```
//!
//! A flag's value is everything in its token past the first three
//! characters (the flag and one separator character).

use serde_json::{json, Map, Value};

use super::ConfigError;

/// Characters consumed before a flag's value (`-e` plus one separator).
const FLAG_PREFIX_CHARS: usize = 3;

/// Overrides parsed from the module argument string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleArgs {
    /// `-e`: path to the hive-dump executable.
    pub tool_path: Option<String>,
    /// `-o`: directory in which to place the module's output.
    pub output_dir: Option<String>,
}

impl ModuleArgs {
    /// Parse a semicolon-separated argument string.
    ///
    /// Unrecognised tokens are ignored. A recognised flag with nothing after
    /// its prefix is an error.
    pub fn parse(args: &str) -> Result<Self, ConfigError> {
        let mut parsed = Self::default();

        for token in args.split(';') {
            if token.starts_with("-e") {
                parsed.tool_path = Some(flag_value(token, 'e')?);
            } else if token.starts_with("-o") {
                parsed.output_dir = Some(flag_value(token, 'o')?);
            } else if !token.trim().is_empty() {
                tracing::debug!(token, "ignoring unrecognised module argument");
            }
        }

        Ok(parsed)
    }

    /// True when neither override was given.
    pub fn is_empty(&self) -> bool {
        self.tool_path.is_none() && self.output_dir.is_none()
    }

    /// Settings layer for merging. Absent flags contribute no keys.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(ref path) = self.tool_path {
            map.insert("tool_path".to_string(), json!(path));
        }
        if let Some(ref dir) = self.output_dir {
            map.insert("output_dir".to_string(), json!(dir));
        }
        Value::Object(map)
    }
}

fn flag_value(token: &str, flag: char) -> Result<String, ConfigError> {
    let value = token
        .char_indices()
        .nth(FLAG_PREFIX_CHARS)
        .map(|(idx, _)| &token[idx..])
        .unwrap_or("");

    if value.is_empty() {
        return Err(ConfigError::MissingArgument { flag });
    }
    Ok(value.to_string())
}
