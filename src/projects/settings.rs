use crate::backends::elaboration::abort_boundary::{KNOWN_POLICIES, policy_by_name};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::runtime::interpreter::DEFAULT_MAX_STEPS;
use crate::{return_config_error, return_file_error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "derefmove.toml";
pub const JSON_PROGRAM_EXTENSION: &str = "json";
pub const TOML_PROGRAM_EXTENSION: &str = "toml";
pub const DEFAULT_ENTRY_FUNCTION: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analysis: AnalysisSettings,
    pub elaboration: ElaborationSettings,
    pub output: OutputSettings,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    pub warn_unused_capabilities: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            warn_unused_capabilities: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElaborationSettings {
    pub panic_policy: String,
}

impl Default for ElaborationSettings {
    fn default() -> Self {
        ElaborationSettings {
            panic_policy: String::from("abort"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub show_warnings: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            format: OutputFormat::Text,
            show_warnings: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    pub max_steps: usize,
    pub entry: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            max_steps: DEFAULT_MAX_STEPS,
            entry: String::from(DEFAULT_ENTRY_FUNCTION),
        }
    }
}

impl Config {
    /// Parses a config from TOML text. Missing tables and keys fall back to defaults.
    pub fn from_toml(source: &str, path: &Path) -> Result<Config, CompilerError> {
        let config: Config = match toml::from_str(source) {
            Ok(config) => config,
            Err(error) => {
                return_config_error!(
                    format!("Could not parse {}: {}", CONFIG_FILE_NAME, error.message()),
                    ErrorLocation::in_file(path)
                );
            }
        };

        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), CompilerError> {
        if policy_by_name(&self.elaboration.panic_policy).is_none() {
            return_config_error!(
                format!("Unknown panic policy '{}'", self.elaboration.panic_policy),
                ErrorLocation::in_file(path),
                {
                    VariableName => "elaboration.panic_policy",
                    PrimarySuggestion => format!("Known policies: {}", KNOWN_POLICIES.join(", ")),
                }
            );
        }

        if self.runtime.max_steps == 0 {
            return_config_error!(
                "runtime.max_steps must be greater than zero",
                ErrorLocation::in_file(path),
                { VariableName => "runtime.max_steps" }
            );
        }

        Ok(())
    }
}

/// Loads the config for a program.
///
/// An explicit path must exist. Without one, `derefmove.toml` is looked up
/// next to the program file and defaults are used when there isn't one.
pub fn load_config(explicit: Option<&Path>, program_path: &Path) -> Result<Config, CompilerError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let beside_program = program_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(CONFIG_FILE_NAME);

            if !beside_program.is_file() {
                return Ok(Config::default());
            }

            beside_program
        }
    };

    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(error) => {
            return_file_error!(&path, format!("Could not read config file: {}", error));
        }
    };

    Config::from_toml(&source, &path)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
