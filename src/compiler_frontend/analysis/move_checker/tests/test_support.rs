#![cfg(test)]

use crate::compiler_frontend::analysis::capabilities::{
    AccessorReceiver, AccessorReturn, CapabilityDeclaration, CapabilityRegistry, Construction,
    StorageAccessor, register_capabilities,
};
use crate::compiler_frontend::analysis::move_checker::{MoveCheckReport, check_moves};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorType};
use crate::compiler_frontend::hir::hir_builder::HirModuleBuilder;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{DerefKind, HirModule, TextLocation, TypeId};
use crate::compiler_frontend::hir::hir_validation::{validate_hir_module, validate_type_declarations};

/// The types most move and elaboration tests share.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellTypes {
    pub int: TypeId,
    pub boolean: TypeId,

    /// A heap string. Dropping one is observable.
    pub text: TypeId,

    /// `Cell<Str>` with a place capability that supports construction.
    pub cell: TypeId,

    /// `struct Pair { left: Str, right: Str }`
    pub pair: TypeId,

    /// `PairCell<Pair>` with a place capability, no construction.
    pub pair_cell: TypeId,

    /// `Boxed<Str>` implements DerefMut but never registered a capability.
    pub boxed: TypeId,

    /// `&mut Str`
    pub text_mut: TypeId,
}

pub(crate) fn cell_types(builder: &mut HirModuleBuilder) -> CellTypes {
    let int = builder.int_type();
    let boolean = builder.bool_type();
    let text = builder.resource_type("Str");
    let cell = builder.owner_type("Cell", text, DerefKind::Mutable);
    let pair = builder.struct_type("Pair", &[("left", text), ("right", text)]);
    let pair_cell = builder.owner_type("PairCell", pair, DerefKind::Mutable);
    let boxed = builder.owner_type("Boxed", text, DerefKind::Mutable);
    let text_mut = builder.ref_type("&mut Str", text, true);

    CellTypes {
        int,
        boolean,
        text,
        cell,
        pair,
        pair_cell,
        boxed,
        text_mut,
    }
}

pub(crate) fn storage_capability(
    ty: TypeId,
    target: TypeId,
    construction: Option<Construction>,
) -> CapabilityDeclaration {
    CapabilityDeclaration {
        ty,
        target,
        accessor: StorageAccessor {
            name: String::from("storage"),
            receiver: AccessorReceiver::MutRef,
            returns: AccessorReturn::RawMut(target),
        },
        construction,
        location: TextLocation::default(),
    }
}

pub(crate) fn cell_capabilities(types: &CellTypes) -> Vec<CapabilityDeclaration> {
    vec![
        storage_capability(types.cell, types.text, Some(Construction::default())),
        storage_capability(types.pair_cell, types.pair, None),
    ]
}

/// Runs every stage up to and including move analysis, the way the frontend does.
pub(crate) fn run_move_checker(
    module: &HirModule,
    declarations: &[CapabilityDeclaration],
) -> Result<MoveCheckReport, Vec<CompilerError>> {
    let (types, registry) = prepare(module, declarations)?;
    check_moves(module, &types, &registry)
}

pub(crate) fn prepare<'a>(
    module: &'a HirModule,
    declarations: &[CapabilityDeclaration],
) -> Result<(TypeContext<'a>, CapabilityRegistry), Vec<CompilerError>> {
    validate_type_declarations(module).map_err(|error| vec![error])?;

    let types = TypeContext::new(&module.types);
    let registry = register_capabilities(declarations, &types, &module.source_path)?;
    registry.validate_contracts(&types)?;
    validate_hir_module(module, &types, &registry).map_err(|error| vec![error])?;

    Ok((types, registry))
}

pub(crate) fn expect_clean(
    result: Result<MoveCheckReport, Vec<CompilerError>>,
) -> MoveCheckReport {
    match result {
        Ok(report) => report,
        Err(errors) => panic!("expected move analysis to succeed, got {errors:#?}"),
    }
}

pub(crate) fn expect_errors(
    result: Result<MoveCheckReport, Vec<CompilerError>>,
) -> Vec<CompilerError> {
    match result {
        Ok(_) => panic!("expected move analysis to fail"),
        Err(errors) => errors,
    }
}

pub(crate) fn expect_single_error(
    result: Result<MoveCheckReport, Vec<CompilerError>>,
    error_type: ErrorType,
) -> CompilerError {
    let mut errors = expect_errors(result);
    assert_eq!(errors.len(), 1, "expected exactly one error, got {errors:#?}");

    let error = errors.remove(0);
    assert_eq!(error.error_type, error_type, "unexpected error: {error:#?}");
    error
}

pub(crate) fn build_module(build: impl FnOnce(&mut HirModuleBuilder, &CellTypes)) -> (HirModule, CellTypes) {
    let mut builder = HirModuleBuilder::new();
    let types = cell_types(&mut builder);
    build(&mut builder, &types);
    (builder.finish(), types)
}
