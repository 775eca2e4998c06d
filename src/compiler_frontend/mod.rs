pub mod compiler_messages {
    pub mod compiler_dev_logging;
    pub mod compiler_errors;
    pub mod compiler_warnings;
    pub mod display_messages;
}
pub use compiler_messages::compiler_errors;
pub use compiler_messages::compiler_warnings;
pub use compiler_messages::display_messages;

pub mod analysis;
pub mod hir;

use crate::compiler_frontend::analysis::capabilities::{
    CapabilityDeclaration, CapabilityRegistry, register_capabilities as run_registration,
};
use crate::compiler_frontend::analysis::move_checker::move_paths::PathProjection;
use crate::compiler_frontend::analysis::move_checker::{
    MoveCheckReport, check_moves as run_move_checker,
};
use crate::compiler_frontend::compiler_errors::CompilerMessages;
use crate::compiler_frontend::compiler_warnings::{CompilerWarning, WarningKind};
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::HirModule;
use crate::compiler_frontend::hir::hir_validation::{validate_hir_module, validate_type_declarations};
use crate::projects::settings::Config;
use crate::timer_log;
use std::time::Instant;

/// Flags change the behavior of the core pipeline.
/// For the built-in CLI these are added as cli flags, but embedders can decide how to choose flags
#[derive(PartialEq, Debug, Clone)]
pub enum Flag {
    DisableWarnings,
    ShowHir,
}

pub struct CompilerFrontend<'a> {
    pub(crate) config: &'a Config,
}

impl<'a> CompilerFrontend<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// ---------------------------
    /// TYPE DECLARATIONS
    /// ---------------------------
    /// The type table is checked on its own first.
    /// Capability registration asks questions about types (is this an owner,
    /// does it implement DerefMut) and needs every answer to be well defined.
    pub fn validate_type_declarations(&self, module: &HirModule) -> Result<(), CompilerMessages> {
        validate_type_declarations(module).map_err(CompilerMessages::from_error)
    }

    /// ---------------------------
    /// CAPABILITY REGISTRATION
    /// ---------------------------
    /// The only write phase of the registry. Everything after this point
    /// gets a shared reference to the finished registry.
    pub fn register_capabilities(
        &self,
        module: &HirModule,
        types: &TypeContext,
        declarations: &[CapabilityDeclaration],
    ) -> Result<CapabilityRegistry, CompilerMessages> {
        run_registration(declarations, types, &module.source_path)
            .map_err(CompilerMessages::from_errors)
    }

    /// ---------------------------
    /// CAPABILITY CONTRACTS
    /// ---------------------------
    /// Accessor signatures are checked before any analysis relies on them.
    /// This stage always runs: nothing downstream handles a malformed accessor.
    pub fn validate_contracts(
        &self,
        registry: &CapabilityRegistry,
        types: &TypeContext,
    ) -> Result<(), CompilerMessages> {
        registry
            .validate_contracts(types)
            .map_err(CompilerMessages::from_errors)
    }

    /// ---------------------------
    /// HIR VALIDATION
    /// ---------------------------
    /// Structural checks over function bodies: ids resolve, places type-check,
    /// control flow stays inside its function.
    pub fn validate_hir(
        &self,
        module: &HirModule,
        types: &TypeContext,
        registry: &CapabilityRegistry,
    ) -> Result<(), CompilerMessages> {
        let time = Instant::now();
        let result = validate_hir_module(module, types, registry);
        timer_log!(time, "HIR validated in: ");

        result.map_err(CompilerMessages::from_error)
    }

    // ------------------------------
    //  MOVE ANALYSIS
    // ------------------------------
    // All user-facing move errors of a unit are found here, before anything is
    // elaborated, so a rejected unit never produces partial output.
    pub fn check_moves(
        &self,
        module: &HirModule,
        types: &TypeContext,
        registry: &CapabilityRegistry,
    ) -> Result<MoveCheckReport, CompilerMessages> {
        let time = Instant::now();
        let result = run_move_checker(module, types, registry);
        timer_log!(time, "Move analysis completed in: ");

        result.map_err(CompilerMessages::from_errors)
    }

    /// Capabilities whose content no function ever dereferences.
    pub fn unused_capability_warnings(
        &self,
        registry: &CapabilityRegistry,
        report: &MoveCheckReport,
        types: &TypeContext,
    ) -> Vec<CompilerWarning> {
        if !self.config.analysis.warn_unused_capabilities {
            return Vec::new();
        }

        registry
            .iter()
            .filter(|capability| {
                !report.analysis.function_paths.values().any(|paths| {
                    paths.iter().any(|(_, path)| {
                        path.projection == PathProjection::Content
                            && path.mentioned
                            && path
                                .parent
                                .is_some_and(|owner| paths.path(owner).ty == capability.ty)
                    })
                })
            })
            .map(|capability| {
                CompilerWarning::new(
                    &types.name(capability.ty),
                    registry.location(capability.ty),
                    WarningKind::UnusedCapability,
                )
            })
            .collect()
    }
}
