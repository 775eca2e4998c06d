//! Program files are serialized compilation units: a HIR module plus the
//! capability declarations that go with it. JSON and TOML are both accepted,
//! chosen by file extension.

use crate::backends::lir::lir_display::display_elaborated_module;
use crate::backends::lir::lir_nodes::ElaboratedModule;
use crate::compiler_frontend::analysis::capabilities::CapabilityDeclaration;
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_frontend::hir::hir_nodes::HirModule;
use crate::projects::settings::{JSON_PROGRAM_EXTENSION, OutputFormat, TOML_PROGRAM_EXTENSION};
use crate::{return_compiler_error, return_file_error, return_malformed_program_error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramFile {
    pub module: HirModule,
    #[serde(default)]
    pub capabilities: Vec<CapabilityDeclaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFormat {
    Json,
    Toml,
}

impl ProgramFormat {
    pub fn from_path(path: &Path) -> Option<ProgramFormat> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(JSON_PROGRAM_EXTENSION) => Some(ProgramFormat::Json),
            Some(TOML_PROGRAM_EXTENSION) => Some(ProgramFormat::Toml),
            _ => None,
        }
    }
}

impl ProgramFile {
    pub fn parse(source: &str, format: ProgramFormat, path: &Path) -> Result<ProgramFile, CompilerError> {
        let parsed = match format {
            ProgramFormat::Json => {
                serde_json::from_str::<ProgramFile>(source).map_err(|error| error.to_string())
            }
            ProgramFormat::Toml => {
                toml::from_str::<ProgramFile>(source).map_err(|error| error.message().to_owned())
            }
        };

        let mut program = match parsed {
            Ok(program) => program,
            Err(message) => {
                return_malformed_program_error!(
                    format!("Could not parse program file: {}", message),
                    ErrorLocation::in_file(path)
                );
            }
        };

        program.module.source_path = path.to_path_buf();
        Ok(program)
    }
}

/// Reads a program file from disk. The extension picks the format.
pub fn load_program_file(path: &Path) -> Result<ProgramFile, CompilerError> {
    let Some(format) = ProgramFormat::from_path(path) else {
        return_file_error!(path, "Program files must end in .json or .toml", {
            PrimarySuggestion => "Rename the file or export it as JSON",
        });
    };

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            return_file_error!(path, format!("Could not read program file: {}", error));
        }
    };

    ProgramFile::parse(&source, format, path)
}

/// Renders elaborated output the way the config asks for it.
pub fn render_elaborated(
    module: &ElaboratedModule,
    format: OutputFormat,
) -> Result<String, CompilerError> {
    match format {
        OutputFormat::Text => Ok(display_elaborated_module(module)),
        OutputFormat::Json => match serde_json::to_string_pretty(module) {
            Ok(json) => Ok(json),
            Err(error) => {
                return_compiler_error!("Could not serialize elaborated output: {}", error)
            }
        },
    }
}

#[cfg(test)]
#[path = "tests/program_file_tests.rs"]
mod tests;
