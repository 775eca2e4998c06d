//! Deferred operations.
//!
//! Each HIR program point that touches a tracked place becomes one or more
//! deferred operations. Lowering an operation emits its LIR, steps the
//! ownership state with the same effect move analysis applied, and keeps
//! the drop flags of every affected path in sync.

use crate::backends::elaboration::place_lowering::AccessMode;
use crate::backends::elaboration::{ElaborationPass, FunctionElaborator};
use crate::backends::lir::lir_nodes::{
    DerefOrigin, LirOperand, LirPlace, LirRvalue, LirStatement, LirTempType, LirTerminator,
};
use crate::compiler_frontend::analysis::move_checker::effects::{
    apply_drop, apply_operand, apply_write, move_invalidates,
};
use crate::compiler_frontend::analysis::move_checker::move_paths::PlaceAccess;
use crate::compiler_frontend::analysis::move_checker::state::PathSet;
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_nodes::{
    CallTarget, HirOperand, HirPlace, HirRvalue, HirStatement, HirStatementKind, HirTerminator,
    LocalId, TypeId,
};
use crate::elaboration_log;

#[derive(Debug)]
pub(super) enum DeferredOperation<'hir> {
    /// Copy or borrow. The place must be fully initialized and stays that way.
    ReadShared(&'hir HirOperand),

    /// Move out. The place's whole subtree becomes uninitialized.
    ReadThenInvalidate(&'hir HirPlace),

    /// Store, dropping the old value first if there may be one.
    WriteThenValidate {
        target: &'hir HirPlace,
        value: LirRvalue,
    },

    /// Drop whatever parts of a local are still initialized.
    DropIfInitialized(LocalId),

    /// `target = Owner::new(value)`, in place when the capability allows it.
    ConstructInPlace {
        target: &'hir HirPlace,
        ty: TypeId,
        args: Option<LirOperand>,
        value: LirRvalue,
    },
}

impl<'a> FunctionElaborator<'a> {
    pub(super) fn defer(
        &mut self,
        operation: DeferredOperation<'a>,
    ) -> Result<Option<LirOperand>, CompilerError> {
        self.stats.deferred_operations += 1;

        match operation {
            DeferredOperation::ReadShared(operand) => self.read_shared(operand).map(Some),

            DeferredOperation::ReadThenInvalidate(place) => {
                self.read_then_invalidate(place).map(Some)
            }

            DeferredOperation::WriteThenValidate { target, value } => {
                self.write_with(target, |_, dest| {
                    Ok(vec![LirStatement::Assign { dest, value }])
                })?;
                Ok(None)
            }

            DeferredOperation::DropIfInitialized(local) => {
                self.drop_local(local)?;
                Ok(None)
            }

            DeferredOperation::ConstructInPlace {
                target,
                ty,
                args,
                value,
            } => {
                self.construct(target, ty, args, value)?;
                Ok(None)
            }
        }
    }

    // ------------------------------
    //  Statements
    // ------------------------------
    pub(super) fn lower_statement(
        &mut self,
        statement: &'a HirStatement,
    ) -> Result<(), CompilerError> {
        match &statement.kind {
            HirStatementKind::Assign { target, value } => {
                let value = self.lower_rvalue(value)?;
                self.defer(DeferredOperation::WriteThenValidate { target, value })?;
            }

            HirStatementKind::Construct {
                target,
                ty,
                args,
                value,
            } => {
                let args = match args {
                    Some(args) => Some(self.lower_operand(args)?),
                    None => None,
                };
                let value = self.lower_rvalue(value)?;

                self.defer(DeferredOperation::ConstructInPlace {
                    target,
                    ty: *ty,
                    args,
                    value,
                })?;
            }

            HirStatementKind::Call {
                target: CallTarget::Function(function),
                args,
                result,
            } => {
                let mut lowered_args = Vec::with_capacity(args.len());
                for arg in args {
                    lowered_args.push(self.lower_operand(arg)?);
                }

                let function = *function;
                match result {
                    Some(result) => {
                        self.write_with(result, |_, dest| {
                            Ok(vec![LirStatement::Call {
                                function,
                                args: lowered_args,
                                result: Some(dest),
                            }])
                        })?;
                    }
                    None => self.statements.push(LirStatement::Call {
                        function,
                        args: lowered_args,
                        result: None,
                    }),
                }
            }

            HirStatementKind::Call {
                target: CallTarget::UserDeref { mutable },
                args,
                result,
            } => self.lower_user_deref(*mutable, args, result.as_ref())?,

            HirStatementKind::Observe(operand) => {
                let operand = self.lower_operand(operand)?;
                self.statements.push(LirStatement::Observe(operand));
            }

            HirStatementKind::Drop(local) => {
                self.defer(DeferredOperation::DropIfInitialized(*local))?;
            }
        }

        Ok(())
    }

    /// An explicit `Deref::deref(&x)` stays a call, even on place-capable types.
    fn lower_user_deref(
        &mut self,
        mutable: bool,
        args: &'a [HirOperand],
        result: Option<&'a HirPlace>,
    ) -> Result<(), CompilerError> {
        let Some(HirOperand::Borrow { place: owner, .. }) = args.first() else {
            return Err(self.internal_error(String::from(
                "Explicit deref call without a borrowed owner reached elaboration",
            )));
        };

        self.expect_readable(owner)?;

        let mode = if mutable {
            AccessMode::Write
        } else {
            AccessMode::Read
        };
        let owner_place = self.lower_place(owner, mode)?;
        let owner_type = self.place_type(owner)?;

        let Some(target) = self.types.deref_target(owner_type) else {
            return Err(self.internal_error(format!(
                "'{}' reached elaboration as the owner of an explicit deref call",
                self.types.name(owner_type)
            )));
        };

        let dest = match result {
            Some(result) => self.lower_place(result, AccessMode::Write)?,
            None => LirPlace::temp(self.new_temp(LirTempType::Ref { target, mutable })),
        };

        self.statements.push(LirStatement::Deref {
            dest,
            owner: owner_place,
            mutable,
            origin: DerefOrigin::Explicit,
        });

        if let Some(result) = result {
            self.finish_write(result);
        }

        Ok(())
    }

    // ------------------------------
    //  Terminators
    // ------------------------------
    pub(super) fn lower_terminator(
        &mut self,
        terminator: &'a HirTerminator,
    ) -> Result<LirTerminator, CompilerError> {
        match terminator {
            HirTerminator::Jump { target } => Ok(LirTerminator::Goto { target: *target }),

            HirTerminator::If {
                condition,
                then_block,
                else_block,
            } => Ok(LirTerminator::If {
                condition: self.lower_operand(condition)?,
                then_block: *then_block,
                else_block: *else_block,
            }),

            HirTerminator::Return { value } => {
                let value = match value {
                    Some(operand) => {
                        let lowered = self.lower_operand(operand)?;

                        let Some(return_type) = self.function.return_type else {
                            return Err(self.internal_error(format!(
                                "'{}' returns a value but declares no return type",
                                self.function.name
                            )));
                        };

                        // The value leaves before the locals it may come from are dropped.
                        let temp = self.new_temp(LirTempType::Value(return_type));
                        self.statements.push(LirStatement::Assign {
                            dest: LirPlace::temp(temp),
                            value: LirRvalue::Use(lowered),
                        });
                        Some(LirOperand::Move(LirPlace::temp(temp)))
                    }
                    None => None,
                };

                self.drop_all_locals()?;
                Ok(LirTerminator::Return { value })
            }

            HirTerminator::Panic { message } => Ok(LirTerminator::Panic {
                message: message.to_owned(),
            }),
        }
    }

    // ------------------------------
    //  Operands
    // ------------------------------
    pub(super) fn lower_operand(
        &mut self,
        operand: &'a HirOperand,
    ) -> Result<LirOperand, CompilerError> {
        let lowered = match operand {
            HirOperand::Const(value) => return Ok(LirOperand::Const(*value)),

            HirOperand::Move(place) if move_invalidates(self.paths, self.types, place) => {
                self.defer(DeferredOperation::ReadThenInvalidate(place))?
            }

            _ => self.defer(DeferredOperation::ReadShared(operand))?,
        };

        match lowered {
            Some(lowered) => Ok(lowered),
            None => Err(self.internal_error(String::from(
                "A read operation produced no operand during elaboration",
            ))),
        }
    }

    pub(super) fn lower_rvalue(&mut self, rvalue: &'a HirRvalue) -> Result<LirRvalue, CompilerError> {
        match rvalue {
            HirRvalue::Use(operand) => Ok(LirRvalue::Use(self.lower_operand(operand)?)),

            HirRvalue::Aggregate { ty, fields } => {
                let mut lowered = Vec::with_capacity(fields.len());
                for (field, operand) in fields {
                    lowered.push((*field, self.lower_operand(operand)?));
                }

                Ok(LirRvalue::Aggregate {
                    ty: *ty,
                    fields: lowered,
                })
            }
        }
    }

    fn read_shared(&mut self, operand: &'a HirOperand) -> Result<LirOperand, CompilerError> {
        match operand {
            HirOperand::Copy(place) | HirOperand::Move(place) => {
                self.expect_readable(place)?;
                Ok(LirOperand::Copy(self.lower_place(place, AccessMode::Read)?))
            }

            HirOperand::Borrow { place, mutable } => {
                self.expect_readable(place)?;

                let mode = if *mutable {
                    AccessMode::Write
                } else {
                    AccessMode::Read
                };

                Ok(LirOperand::Ref {
                    place: self.lower_place(place, mode)?,
                    mutable: *mutable,
                })
            }

            HirOperand::Const(value) => Ok(LirOperand::Const(*value)),
        }
    }

    fn read_then_invalidate(&mut self, place: &'a HirPlace) -> Result<LirOperand, CompilerError> {
        self.expect_readable(place)?;
        let lowered = self.lower_place(place, AccessMode::Write)?;

        let operand = HirOperand::Move(place.clone());
        apply_operand(self.paths, self.types, &mut self.state, &operand);

        if let Some(PlaceAccess::Tracked(path)) = self.paths.resolve(place) {
            elaboration_log!(Dark Yellow "[Elab] move out of ", format!("{:?}", place));
            let paths = self.paths;
            self.sync_flags(paths.subtree(path));
        }

        Ok(LirOperand::Move(lowered))
    }

    /// A read of a place that isn't definitely initialized passed move
    /// analysis. That can only be a bug in the analysis or in elaboration.
    pub(super) fn expect_readable(&self, place: &HirPlace) -> Result<(), CompilerError> {
        let Some(access) = self.paths.resolve(place) else {
            return Err(self.internal_error(format!(
                "Elaboration found no move path for {:?} in '{}'",
                place, self.function.name
            )));
        };

        let required = match access {
            PlaceAccess::Tracked(path) => self.paths.content_root(path).unwrap_or(path),
            PlaceAccess::Indirect { anchor, .. } => anchor,
        };

        if self.state.all_definitely_init(self.paths.subtree(required)) {
            return Ok(());
        }

        Err(self.internal_error(format!(
            "Ownership fact says {:?} is not definitely initialized, but it is read in '{}'",
            place, self.function.name
        )))
    }

    // ------------------------------
    //  Writes
    // ------------------------------
    /// Stores into `target` through the statements `emit` builds for a destination.
    ///
    /// When the target may still hold a value that needs drop, `emit` writes
    /// into a temp first, then the old value is dropped, then the temp moves in.
    pub(super) fn write_with<F>(&mut self, target: &'a HirPlace, emit: F) -> Result<(), CompilerError>
    where
        F: FnOnce(&mut Self, LirPlace) -> Result<Vec<LirStatement>, CompilerError>,
    {
        let target_type = self.place_type(target)?;

        let Some(access) = self.paths.resolve(target) else {
            return Err(self.internal_error(format!(
                "Elaboration found no move path for write target {:?}",
                target
            )));
        };

        let replaces = self.types.needs_drop(target_type)
            && match access {
                PlaceAccess::Tracked(path) => self.state.any_maybe_init(self.paths.subtree(path)),
                PlaceAccess::Indirect { .. } => true,
            };

        if replaces {
            let temp = self.new_temp(LirTempType::Value(target_type));
            let statements = emit(self, LirPlace::temp(temp))?;
            self.statements.extend(statements);

            let dest = self.lower_place(target, AccessMode::Write)?;
            match access {
                PlaceAccess::Tracked(path) => {
                    let drops = self.drop_path(path, &dest)?;
                    self.statements.extend(drops);
                }
                PlaceAccess::Indirect { .. } => {
                    let drop = self.drop_in_place(dest.clone());
                    self.statements.push(drop);
                }
            }

            self.statements.push(LirStatement::Assign {
                dest,
                value: LirRvalue::Use(LirOperand::Move(LirPlace::temp(temp))),
            });
        } else {
            let dest = self.lower_place(target, AccessMode::Write)?;
            let statements = emit(self, dest)?;
            self.statements.extend(statements);
        }

        self.finish_write(target);
        Ok(())
    }

    fn finish_write(&mut self, target: &HirPlace) {
        apply_write(self.paths, &mut self.state, target);

        if let Some(PlaceAccess::Tracked(path)) = self.paths.resolve(target) {
            let paths = self.paths;
            self.sync_flags(paths.subtree(path));
        }
    }

    // ------------------------------
    //  Drops of locals
    // ------------------------------
    fn drop_local(&mut self, local: LocalId) -> Result<(), CompilerError> {
        let Some(root) = self.paths.root(local) else {
            return Err(self.internal_error(format!(
                "Local {} of '{}' has no move path",
                local, self.function.name
            )));
        };

        let drops = self.drop_path(root, &LirPlace::local(local))?;
        self.statements.extend(drops);

        apply_drop(self.paths, &mut self.state, local);
        let paths = self.paths;
        self.sync_flags(paths.subtree(root));
        Ok(())
    }

    /// Scope end: every local, in reverse declaration order.
    fn drop_all_locals(&mut self) -> Result<(), CompilerError> {
        let function = self.function;

        for local in function.locals.iter().rev() {
            let Some(root) = self.paths.root(local.id) else {
                return Err(self.internal_error(format!(
                    "Local {} of '{}' has no move path",
                    local.id, function.name
                )));
            };

            let drops = self.drop_path(root, &LirPlace::local(local.id))?;
            self.statements.extend(drops);
            apply_drop(self.paths, &mut self.state, local.id);
        }

        Ok(())
    }

    // ------------------------------
    //  Drop flags
    // ------------------------------
    /// Writes the current status of every flagged path in `paths` to its flag.
    /// Only called right after an effect, when each of them is definite.
    pub(super) fn sync_flags(&mut self, paths: &PathSet) {
        if self.pass == ElaborationPass::Discover || self.drop_flags.is_empty() {
            return;
        }

        for path in paths.iter_ones() {
            if let Some(flag) = self.drop_flags.get(&path) {
                self.statements.push(LirStatement::SetDropFlag {
                    flag: *flag,
                    value: self.state.is_maybe_init(path),
                });
            }
        }
    }
}
