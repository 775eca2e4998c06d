use crate::compiler_frontend::analysis::move_checker::diagnostics::MoveDiagnostics;
use crate::compiler_frontend::analysis::move_checker::effects::{
    apply_drop, apply_operand, apply_write, statement_operands, statement_write,
    terminator_operand,
};
use crate::compiler_frontend::analysis::move_checker::move_paths::{MovePathTable, PlaceAccess};
use crate::compiler_frontend::analysis::move_checker::state::OwnershipState;
use crate::compiler_frontend::analysis::move_checker::types::OwnershipFact;
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, FunctionId, HirBlock, HirNodeId, HirOperand, HirPlace, HirStatementKind, LocalId,
    TypeId,
};
use crate::move_log;
use rustc_hash::FxHashMap;

pub(super) struct MoveTransferContext<'a> {
    pub types: &'a TypeContext<'a>,
    pub paths: &'a MovePathTable,
    pub local_types: &'a FxHashMap<LocalId, TypeId>,
    pub diagnostics: &'a MoveDiagnostics<'a>,
    pub function: FunctionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TransferMode {
    /// Effects only, while the worklist converges.
    Fixpoint,

    /// Effects, checks and facts, once per block on the converged entry state.
    Report,
}

#[derive(Debug, Default)]
pub(super) struct BlockTransferStats {
    pub statements_analyzed: usize,
    pub terminators_analyzed: usize,
    pub statement_facts: Vec<(HirNodeId, OwnershipFact)>,
    pub terminator_fact: Option<(BlockId, OwnershipFact)>,
    pub errors: Vec<CompilerError>,
}

pub(super) fn transfer_block(
    context: &MoveTransferContext,
    block: &HirBlock,
    state: &mut OwnershipState,
    mode: TransferMode,
) -> BlockTransferStats {
    let mut stats = BlockTransferStats::default();
    let reporting = mode == TransferMode::Report;

    for statement in &block.statements {
        stats.statements_analyzed += 1;

        if reporting {
            stats.statement_facts.push((
                statement.id,
                OwnershipFact {
                    function: context.function,
                    state: state.clone(),
                },
            ));
        }

        let location = context.diagnostics.statement_error_location(statement);

        for operand in statement_operands(&statement.kind) {
            if reporting {
                check_operand(context, state, operand, &location, &mut stats.errors);
            }
            apply_operand(context.paths, context.types, state, operand);
        }

        if let HirStatementKind::Drop(local) = &statement.kind {
            move_log!(Dark Yellow "[Move] drop ", context.diagnostics.place_name(&HirPlace::Local(*local)));
            apply_drop(context.paths, state, *local);
        }

        if let Some(place) = statement_write(&statement.kind) {
            if reporting {
                check_write(context, state, place, &location, &mut stats.errors);
            }
            apply_write(context.paths, state, place);
        }
    }

    stats.terminators_analyzed += 1;

    if reporting {
        stats.terminator_fact = Some((
            block.id,
            OwnershipFact {
                function: context.function,
                state: state.clone(),
            },
        ));
    }

    if let Some(operand) = terminator_operand(&block.terminator) {
        if reporting {
            let location = context.diagnostics.terminator_error_location(block);
            check_operand(context, state, operand, &location, &mut stats.errors);
        }
        apply_operand(context.paths, context.types, state, operand);
    }

    stats
}

fn check_operand(
    context: &MoveTransferContext,
    state: &OwnershipState,
    operand: &HirOperand,
    location: &ErrorLocation,
    errors: &mut Vec<CompilerError>,
) {
    match operand {
        HirOperand::Copy(place) | HirOperand::Borrow { place, .. } => {
            check_read(context, state, place, location, errors);
        }

        HirOperand::Move(place) => {
            check_read(context, state, place, location, errors);

            let Some(PlaceAccess::Indirect { via, .. }) = context.paths.resolve(place) else {
                return;
            };

            let is_copy = context
                .types
                .place_type(context.local_types, place)
                .is_some_and(|ty| context.types.is_copy(ty));

            if !is_copy {
                errors.push(
                    context
                        .diagnostics
                        .move_out_of_reference(place, via, location.clone()),
                );
            }
        }

        HirOperand::Const(_) => {}
    }
}

/// Reading a place needs all of it. Reading part of a place-capable content
/// needs all of the content, so a partially moved `*x` can't be read at all.
fn check_read(
    context: &MoveTransferContext,
    state: &OwnershipState,
    place: &HirPlace,
    location: &ErrorLocation,
    errors: &mut Vec<CompilerError>,
) {
    let Some(access) = context.paths.resolve(place) else {
        errors.push(context.diagnostics.internal(
            format!(
                "Move analysis has no path for '{}' in function '{}'",
                context.diagnostics.place_name(place),
                context.diagnostics.function_name()
            ),
            location.clone(),
        ));
        return;
    };

    let required = match access {
        PlaceAccess::Tracked(path) => context.paths.content_root(path).unwrap_or(path),
        PlaceAccess::Indirect { anchor, .. } => anchor,
    };

    if let Some(missing) = state.first_not_definitely_init(context.paths.subtree(required)) {
        move_log!(Red "[Move] use of moved value ", context.diagnostics.place_name(place));
        errors.push(
            context
                .diagnostics
                .use_of_moved_value(place, missing, state, location.clone()),
        );
    }
}

/// Writing a place needs everything it projects from to be alive, but not the place itself.
fn check_write(
    context: &MoveTransferContext,
    state: &OwnershipState,
    place: &HirPlace,
    location: &ErrorLocation,
    errors: &mut Vec<CompilerError>,
) {
    match context.paths.resolve(place) {
        Some(PlaceAccess::Tracked(path)) => {
            // Nearest first, so the error names the innermost dead parent.
            for ancestor in context.paths.ancestors(path) {
                if !state.is_definitely_init(ancestor) {
                    errors.push(context.diagnostics.assign_to_moved_value(
                        place,
                        ancestor,
                        state,
                        location.clone(),
                    ));
                    return;
                }
            }
        }

        Some(PlaceAccess::Indirect { anchor, .. }) => {
            if let Some(missing) = state.first_not_definitely_init(context.paths.subtree(anchor)) {
                errors.push(
                    context
                        .diagnostics
                        .use_of_moved_value(place, missing, state, location.clone()),
                );
            }
        }

        None => errors.push(context.diagnostics.internal(
            format!(
                "Move analysis has no path for write target '{}'",
                context.diagnostics.place_name(place)
            ),
            location.clone(),
        )),
    }
}
