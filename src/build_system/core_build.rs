// Core build pipeline shared by every CLI command
//
// Runs one compilation unit through the stages in order:
// - Type table validation
// - Capability registration and contract checks
// - HIR validation
// - Move analysis
// - Elaboration
//
// Units are independent of each other, so several files are built in parallel.

use crate::backends::elaboration::abort_boundary::policy_by_name;
use crate::backends::elaboration::elaborate;
use crate::backends::lir::lir_nodes::ElaboratedModule;
use crate::compiler_frontend::analysis::capabilities::CapabilityRegistry;
use crate::compiler_frontend::analysis::move_checker::MoveCheckReport;
use crate::compiler_frontend::compiler_errors::{CompilerMessages, ErrorLocation};
use crate::compiler_frontend::compiler_warnings::CompilerWarning;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_display::display_module;
use crate::compiler_frontend::{CompilerFrontend, Flag};
use crate::projects::program_file::{ProgramFile, load_program_file};
use crate::projects::settings::{Config, load_config};
use crate::{create_error, timer_log};
use rayon::prelude::*;
use saying::say;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything move analysis produced for one unit, before any lowering.
pub struct AnalyzedProgram<'a> {
    pub types: TypeContext<'a>,
    pub registry: CapabilityRegistry,
    pub report: MoveCheckReport,
    pub warnings: Vec<CompilerWarning>,
}

pub struct CompiledProgram {
    pub source_path: PathBuf,
    pub config: Config,
    pub elaborated: ElaboratedModule,
    pub warnings: Vec<CompilerWarning>,
}

/// One loaded unit with the config that applies to it.
pub struct LoadedProgram {
    pub program: ProgramFile,
    pub config: Config,
}

pub fn load_program(
    path: &Path,
    config_path: Option<&Path>,
) -> Result<LoadedProgram, CompilerMessages> {
    let time = Instant::now();

    let config = load_config(config_path, path).map_err(CompilerMessages::from_error)?;
    let program = load_program_file(path).map_err(CompilerMessages::from_error)?;

    timer_log!(time, "Program file loaded in: ");
    Ok(LoadedProgram { program, config })
}

/// Runs every check that can reject the unit. Nothing is lowered yet.
pub fn analyze_program<'a>(
    program: &'a ProgramFile,
    config: &Config,
    flags: &[Flag],
) -> Result<AnalyzedProgram<'a>, CompilerMessages> {
    let frontend = CompilerFrontend::new(config);
    let module = &program.module;

    // ----------------------------------
    //        Type declarations
    // ----------------------------------
    frontend.validate_type_declarations(module)?;
    let types = TypeContext::new(&module.types);

    if flags.contains(&Flag::ShowHir) {
        say!(Bright Black "------------------------------------");
        let source = module.source_path.to_string_lossy();
        say!(Green Bold "HIR: ", Dark Magenta source);
        let dump = display_module(module);
        say!(dump);
    }

    // ----------------------------------
    //     Capability registration
    // ----------------------------------
    let registry = frontend.register_capabilities(module, &types, &program.capabilities)?;

    let time = Instant::now();
    frontend.validate_contracts(&registry, &types)?;
    timer_log!(time, "Capability contracts validated in: ");

    // ----------------------------------
    //     HIR validation and moves
    // ----------------------------------
    frontend.validate_hir(module, &types, &registry)?;
    let report = frontend.check_moves(module, &types, &registry)?;

    let mut warnings = Vec::new();
    if !flags.contains(&Flag::DisableWarnings) {
        warnings = frontend.unused_capability_warnings(&registry, &report, &types);
    }

    Ok(AnalyzedProgram {
        types,
        registry,
        report,
        warnings,
    })
}

/// Analyzes and elaborates one unit.
pub fn compile_program(
    program: &ProgramFile,
    config: &Config,
    flags: &[Flag],
) -> Result<CompiledProgram, CompilerMessages> {
    let analyzed = analyze_program(program, config, flags)?;
    let module = &program.module;

    // ----------------------------------
    //           Elaboration
    // ----------------------------------
    let Some(policy) = policy_by_name(&config.elaboration.panic_policy) else {
        return Err(CompilerMessages::from_error(create_error!(
            Config,
            format!("Unknown panic policy '{}'", config.elaboration.panic_policy),
            ErrorLocation::in_file(&module.source_path)
        )));
    };

    let time = Instant::now();
    let elaborated = elaborate(
        module,
        &analyzed.types,
        &analyzed.registry,
        &analyzed.report.analysis,
        policy.as_ref(),
    )
    .map_err(CompilerMessages::from_error)?;
    timer_log!(time, "Elaborated in: ");

    let mut warnings = analyzed.warnings;
    if !flags.contains(&Flag::DisableWarnings) {
        warnings.extend(elaborated.warnings.iter().cloned());
    }

    Ok(CompiledProgram {
        source_path: module.source_path.to_owned(),
        config: config.to_owned(),
        elaborated,
        warnings,
    })
}

/// Loads and compiles each file as its own unit.
/// Results come back in the order the paths were given.
pub fn compile_programs(
    paths: &[PathBuf],
    config_path: Option<&Path>,
    flags: &[Flag],
) -> Vec<Result<CompiledProgram, CompilerMessages>> {
    let time = Instant::now();

    let results = paths
        .par_iter()
        .map(|path| {
            let loaded = load_program(path, config_path)?;
            compile_program(&loaded.program, &loaded.config, flags)
        })
        .collect();

    timer_log!(time, "All programs compiled in: ");
    results
}

/// Folds per-unit results into one set of messages for printing.
pub fn collect_messages(
    results: Vec<Result<CompiledProgram, CompilerMessages>>,
    show_warnings: bool,
) -> CompilerMessages {
    let mut messages = CompilerMessages::new();

    for result in results {
        match result {
            Ok(compiled) => {
                if show_warnings && compiled.config.output.show_warnings {
                    messages.warnings.extend(compiled.warnings);
                }
            }
            Err(failed) => {
                messages.errors.extend(failed.errors);
                if show_warnings {
                    messages.warnings.extend(failed.warnings);
                }
            }
        }
    }

    messages
}

#[cfg(test)]
#[path = "tests/core_build_tests.rs"]
mod tests;
