use crate::backends::elaboration::FunctionElaborator;
use crate::backends::elaboration::abort_boundary::SynthesizedSite;
use crate::backends::lir::lir_nodes::{
    DerefOrigin, LirBase, LirPlace, LirStatement, LirTemp, LirTempType, TempId,
};
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_nodes::{DerefKind, HirPlace, TypeId, TypeKind};
use crate::elaboration_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AccessMode {
    Read,

    /// Writes, moves and mutable borrows.
    Write,
}

impl FunctionElaborator<'_> {
    /// Lowers a HIR place to an LIR place, emitting the accessor and deref
    /// calls its projections need into the current block.
    pub(super) fn lower_place(
        &mut self,
        place: &HirPlace,
        mode: AccessMode,
    ) -> Result<LirPlace, CompilerError> {
        match place {
            HirPlace::Local(local) => Ok(LirPlace::local(*local)),

            HirPlace::Field { base, field } => Ok(self.lower_place(base, mode)?.field(*field)),

            HirPlace::Deref(base) => {
                let base_type = self.place_type(base)?;
                let owner = self.lower_place(base, mode)?;

                match self.types.kind(base_type) {
                    Some(TypeKind::Ref { .. }) => Ok(owner.pointee()),

                    Some(TypeKind::Owner { target, deref }) => {
                        if self.registry.has_capability(base_type) {
                            let (temp, call) = self.accessor_call(owner, base_type)?;
                            self.statements.push(call);
                            return Ok(LirPlace::temp(temp).pointee());
                        }

                        // Plain overloaded deref: a call returning a reference.
                        let mutable = mode == AccessMode::Write && *deref == DerefKind::Mutable;
                        let temp = self.new_temp(LirTempType::Ref {
                            target: *target,
                            mutable,
                        });

                        self.statements.push(LirStatement::Deref {
                            dest: LirPlace::temp(temp),
                            owner,
                            mutable,
                            origin: DerefOrigin::Overloaded,
                        });

                        Ok(LirPlace::temp(temp).pointee())
                    }

                    _ => Err(self.internal_error(format!(
                        "Elaboration can't dereference a value of type '{}'",
                        self.types.name(base_type)
                    ))),
                }
            }
        }
    }

    /// `%t = accessor(&mut owner)`. The statement is returned rather than
    /// pushed so drops can nest it under a drop flag.
    pub(super) fn accessor_call(
        &mut self,
        owner: LirPlace,
        owner_type: TypeId,
    ) -> Result<(TempId, LirStatement), CompilerError> {
        let Some(capability) = self.registry.lookup(owner_type) else {
            return Err(self.internal_error(format!(
                "'{}' has no place capability, but elaboration needs its storage accessor",
                self.types.name(owner_type)
            )));
        };

        let accessor = capability.accessor.name.to_owned();
        let temp = self.new_accessor_temp(capability.target);

        elaboration_log!(Cyan "[Elab] accessor ", accessor, " -> ", Bold format!("{}", temp));
        self.stats.accessor_calls += 1;

        Ok((
            temp,
            LirStatement::CallAccessor {
                dest: temp,
                owner,
                accessor,
                unwind: self.policy.on_panic(SynthesizedSite::StorageAccessor),
            },
        ))
    }

    pub(super) fn new_temp(&mut self, ty: LirTempType) -> TempId {
        let id = TempId(self.temps.len() as u32);
        self.temps.push(LirTemp { id, ty });
        id
    }

    pub(super) fn new_accessor_temp(&mut self, target: TypeId) -> TempId {
        let temp = self.new_temp(LirTempType::RawMut(target));
        self.accessor_temps.insert(temp);
        temp
    }

    /// True when the place is reached through a pointer a storage accessor returned.
    pub(super) fn is_content_place(&self, place: &LirPlace) -> bool {
        match place.base {
            LirBase::Temp(temp) => self.accessor_temps.contains(&temp),
            LirBase::Local(_) => false,
        }
    }

    pub(super) fn place_type(&self, place: &HirPlace) -> Result<TypeId, CompilerError> {
        match self.types.place_type(&self.local_types, place) {
            Some(ty) => Ok(ty),
            None => Err(self.internal_error(format!(
                "Elaboration could not resolve the type of {:?} in '{}'",
                place, self.function.name
            ))),
        }
    }
}
