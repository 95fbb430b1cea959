use crate::ast::Value;
use crate::compiler::CompileOptions;
use crate::error::RunError;
use crate::loader::json_to_value;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// Run settings read from a JSON file.
///
/// ```json
/// {
///   "externals": { "artifactId": "demo", "features": ["web", "db"] },
///   "defaults": { "version": "1.0.0" },
///   "interactive": false,
///   "compile": { "obfuscate": false, "inline_single_use": true }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub externals: AHashMap<String, serde_json::Value>,
    pub defaults: AHashMap<String, serde_json::Value>,
    pub interactive: bool,
    pub compile: Option<CompileOptions>,
    /// Directory sourced scripts are loaded from, relative paths resolved by the caller.
    pub script_dir: Option<String>,
}

impl RunConfig {
    pub fn from_file(path: &str) -> Result<Self, RunError> {
        let json = fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("Could not read '{}': {}", path, e)))?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self, RunError> {
        serde_json::from_str(json).map_err(|e| RunError::Config(e.to_string()))
    }

    pub fn external_values(&self) -> Result<AHashMap<String, Value>, RunError> {
        convert(&self.externals)
    }

    pub fn default_values(&self) -> Result<AHashMap<String, Value>, RunError> {
        convert(&self.defaults)
    }
}

fn convert(raw: &AHashMap<String, serde_json::Value>) -> Result<AHashMap<String, Value>, RunError> {
    raw.iter()
        .map(|(path, value)| {
            json_to_value(value)
                .map(|value| (path.clone(), value))
                .ok_or_else(|| RunError::Config(format!("unsupported value for '{}': {}", path, value)))
        })
        .collect()
}
