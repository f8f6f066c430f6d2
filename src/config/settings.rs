//! Merged settings with provenance

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::args::ModuleArgs;
use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::ConfigError;

/// Origin of a settings layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    Builtin,
    File,
    ModuleArgs,
    Cli,
}

/// A contributing settings layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Host property values supplied through settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertySettings {
    #[serde(default)]
    pub program_dir: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// Fully merged settings, before resolution against system properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Explicit hive-dump executable path
    #[serde(default)]
    pub tool_path: Option<String>,

    /// Explicit module output directory
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Upper bound on one tool invocation; unset means wait for exit
    #[serde(default)]
    pub tool_timeout_seconds: Option<u64>,

    pub poll_interval_ms: u64,

    pub termination_grace_seconds: u64,

    #[serde(default)]
    pub properties: PropertySettings,

    /// Contributing layers in precedence order
    #[serde(skip)]
    pub sources: Vec<ConfigSource>,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            tool_path: None,
            output_dir: None,
            tool_timeout_seconds: None,
            poll_interval_ms: defaults.poll_interval_ms,
            termination_grace_seconds: defaults.termination_grace_seconds,
            properties: PropertySettings::default(),
            sources: vec![ConfigSource {
                origin: ConfigOrigin::Builtin,
                path: None,
                digest: None,
            }],
        }
    }
}

impl Settings {
    /// Merge every layer into settings.
    ///
    /// A `settings_file` that does not exist is an error: it was asked for
    /// explicitly.
    pub fn build(
        settings_file: Option<&Path>,
        module_args: &ModuleArgs,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = settings_file {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if !module_args.is_empty() {
            layers.push(module_args.to_value());
            sources.push(ConfigSource {
                origin: ConfigOrigin::ModuleArgs,
                path: None,
                digest: None,
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let mut settings: Settings = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(format!("settings: {}", e)))?;
        settings.sources = sources;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from a module argument string alone.
    pub fn from_module_args(args: &str) -> Result<Self, ConfigError> {
        let module_args = ModuleArgs::parse(args)?;
        Self::build(None, &module_args, None)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".to_string()));
        }
        if self.tool_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "tool_timeout_seconds must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml_value), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
