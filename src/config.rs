use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Knobs that select between the translation strategies front-ends expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Route global reads and writes through the lexical mechanism with no definer.
    pub globals_as_lexical: bool,
    /// Declare unknown names as globals instead of failing.
    pub implicit_globals: bool,
    /// Function statements directly in a script declare a global.
    pub top_level_functions_in_global_scope: bool,
    /// Keep one local slot per captured variable and refresh it after every call.
    pub local_values_for_lexical_vars: bool,
    pub calls_may_throw: bool,
    /// Record declared default values in each entity's constant table.
    pub default_init_values: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            globals_as_lexical: false,
            implicit_globals: true,
            top_level_functions_in_global_scope: true,
            local_values_for_lexical_vars: false,
            calls_may_throw: true,
            default_init_values: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl TranslatorConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
