use crate::backends::elaboration::FunctionElaborator;
use crate::backends::elaboration::abort_boundary::SynthesizedSite;
use crate::backends::lir::lir_nodes::{
    LirOperand, LirPlace, LirRvalue, LirStatement, LirTempType,
};
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_nodes::{HirPlace, TypeId, TypeKind};
use crate::elaboration_log;

impl<'a> FunctionElaborator<'a> {
    /// `target = Owner::new(value)`.
    ///
    /// With a constructible capability the value is written once, straight
    /// into storage from `new_uninit`. Otherwise it is built in a temp and
    /// copied into freshly allocated storage.
    pub(super) fn construct(
        &mut self,
        target: &'a HirPlace,
        ty: TypeId,
        args: Option<LirOperand>,
        value: LirRvalue,
    ) -> Result<(), CompilerError> {
        let in_place = self
            .registry
            .lookup(ty)
            .is_some_and(|capability| capability.supports_construction());

        if in_place {
            elaboration_log!(Green "[Elab] in-place construction of ", Bold self.types.name(ty));
            self.stats.in_place_constructions += 1;

            let new_uninit_unwind = self.policy.on_panic(SynthesizedSite::NewUninit);

            return self.write_with(target, move |this, dest| {
                let (storage, call) = this.accessor_call(dest.clone(), ty)?;

                Ok(vec![
                    LirStatement::NewUninit {
                        dest,
                        ty,
                        args,
                        unwind: new_uninit_unwind,
                    },
                    call,
                    LirStatement::Assign {
                        dest: LirPlace::temp(storage).pointee(),
                        value,
                    },
                ])
            });
        }

        let Some(TypeKind::Owner {
            target: content_type,
            ..
        }) = self.types.kind(ty)
        else {
            return Err(self.internal_error(format!(
                "'{}' reached construction but is not an owner type",
                self.types.name(ty)
            )));
        };

        self.stats.temp_constructions += 1;

        let temp = self.new_temp(LirTempType::Value(*content_type));
        self.statements.push(LirStatement::Assign {
            dest: LirPlace::temp(temp),
            value,
        });

        self.write_with(target, move |_, dest| {
            Ok(vec![LirStatement::AllocStorage {
                dest,
                ty,
                args,
                value: LirOperand::Move(LirPlace::temp(temp)),
            }])
        })
    }
}
