//! Gen/kill effects of HIR program points on an `OwnershipState`.
//!
//! Move analysis and the deferred elaborator both step a state through a
//! block with these functions, so the elaborator's view of each program
//! point can be checked against the facts move analysis handed over.

use crate::compiler_frontend::analysis::move_checker::move_paths::{MovePathTable, PlaceAccess};
use crate::compiler_frontend::analysis::move_checker::state::OwnershipState;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{
    HirOperand, HirPlace, HirStatementKind, HirTerminator, LocalId,
};

/// Operands of a statement, in evaluation order.
pub fn statement_operands(kind: &HirStatementKind) -> Vec<&HirOperand> {
    match kind {
        HirStatementKind::Assign { value, .. } => value.operands(),

        HirStatementKind::Construct { args, value, .. } => {
            let mut operands = args.iter().collect::<Vec<_>>();
            operands.extend(value.operands());
            operands
        }

        HirStatementKind::Call { args, .. } => args.iter().collect(),

        HirStatementKind::Observe(operand) => vec![operand],

        HirStatementKind::Drop(_) => Vec::new(),
    }
}

/// The place a statement initializes once its operands are evaluated.
pub fn statement_write(kind: &HirStatementKind) -> Option<&HirPlace> {
    match kind {
        HirStatementKind::Assign { target, .. } | HirStatementKind::Construct { target, .. } => {
            Some(target)
        }
        HirStatementKind::Call { result, .. } => result.as_ref(),
        HirStatementKind::Observe(_) | HirStatementKind::Drop(_) => None,
    }
}

pub fn terminator_operand(terminator: &HirTerminator) -> Option<&HirOperand> {
    match terminator {
        HirTerminator::If { condition, .. } => Some(condition),
        HirTerminator::Return { value } => value.as_ref(),
        HirTerminator::Jump { .. } | HirTerminator::Panic { .. } => None,
    }
}

/// True when a `Move` of this place invalidates it. Copy types and places
/// behind an untracked deref are only read.
pub fn move_invalidates(paths: &MovePathTable, types: &TypeContext, place: &HirPlace) -> bool {
    match paths.resolve(place) {
        Some(PlaceAccess::Tracked(path)) => !types.is_copy(paths.path(path).ty),
        _ => false,
    }
}

pub fn apply_operand(
    paths: &MovePathTable,
    types: &TypeContext,
    state: &mut OwnershipState,
    operand: &HirOperand,
) {
    let HirOperand::Move(place) = operand else {
        return;
    };

    if !move_invalidates(paths, types, place) {
        return;
    }

    if let Some(PlaceAccess::Tracked(path)) = paths.resolve(place) {
        state.uninitialize(paths.subtree(path));
    }
}

pub fn apply_write(paths: &MovePathTable, state: &mut OwnershipState, place: &HirPlace) {
    if let Some(PlaceAccess::Tracked(path)) = paths.resolve(place) {
        state.initialize(paths.subtree(path));
    }
}

pub fn apply_drop(paths: &MovePathTable, state: &mut OwnershipState, local: LocalId) {
    if let Some(root) = paths.root(local) {
        state.uninitialize(paths.subtree(root));
    }
}

pub fn apply_statement(
    paths: &MovePathTable,
    types: &TypeContext,
    state: &mut OwnershipState,
    kind: &HirStatementKind,
) {
    for operand in statement_operands(kind) {
        apply_operand(paths, types, state, operand);
    }

    if let HirStatementKind::Drop(local) = kind {
        apply_drop(paths, state, *local);
    }

    if let Some(place) = statement_write(kind) {
        apply_write(paths, state, place);
    }
}

pub fn apply_terminator(
    paths: &MovePathTable,
    types: &TypeContext,
    state: &mut OwnershipState,
    terminator: &HirTerminator,
) {
    if let Some(operand) = terminator_operand(terminator) {
        apply_operand(paths, types, state, operand);
    }
}
