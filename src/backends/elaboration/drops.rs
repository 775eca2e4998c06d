//! Drop elaboration.
//!
//! Every drop point picks a style per move path from the current state:
//!  - Dead: nothing under the path may be initialized
//!  - Static: all of it is initialized and nothing inside needs opening
//!  - Conditional: a leaf that may or may not be initialized, guarded by its flag
//!  - Open: the drop is split into its parts
//!
//! Capability owners are always opened. Their content is dropped through
//! the storage accessor, then the owner's own drop runs on the husk.

use crate::backends::elaboration::abort_boundary::{SynthesizedSite, UnwindAction};
use crate::backends::elaboration::{ElaborationPass, FunctionElaborator};
use crate::backends::lir::lir_nodes::{DropFlagId, LirPlace, LirStatement};
use crate::compiler_frontend::analysis::move_checker::move_paths::{
    MovePathIndex, PathProjection,
};
use crate::compiler_frontend::analysis::move_checker::state::InitStatus;
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_nodes::{TypeId, TypeKind};
use crate::elaboration_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropStyle {
    Dead,
    Static,
    Conditional,
    Open,
}

impl FunctionElaborator<'_> {
    /// The drop of everything still initialized under `path`, stored at `place`.
    ///
    /// Doesn't touch the ownership state. Callers apply the drop effect themselves.
    pub(super) fn drop_path(
        &mut self,
        path: MovePathIndex,
        place: &LirPlace,
    ) -> Result<Vec<LirStatement>, CompilerError> {
        let paths = self.paths;
        let move_path = paths.path(path);
        let ty = move_path.ty;

        let style = self.drop_style(path);
        elaboration_log!(Dark Magenta "[Elab] ", format!("{:?}", style), " drop of ", format!("{:?}", move_path.place));

        match style {
            DropStyle::Dead => Ok(Vec::new()),

            DropStyle::Static => Ok(vec![self.drop_in_place(place.clone())]),

            DropStyle::Conditional => {
                let flag = self.flag_for(path)?;
                Ok(vec![LirStatement::IfDropFlag {
                    flag,
                    body: vec![self.drop_in_place(place.clone())],
                }])
            }

            DropStyle::Open => {
                self.expect_live_parent(path)?;

                if move_path.capability_owner {
                    return self.open_owner_drop(path, place);
                }

                match self.types.kind(ty) {
                    Some(TypeKind::Struct { .. }) => self.open_struct_drop(path, place, ty),
                    _ => Err(self.internal_error(format!(
                        "Elaboration can't open the drop of a '{}'",
                        self.types.name(ty)
                    ))),
                }
            }
        }
    }

    fn drop_style(&mut self, path: MovePathIndex) -> DropStyle {
        let paths = self.paths;
        let subtree = paths.subtree(path);
        let move_path = paths.path(path);

        if !self.state.any_maybe_init(subtree) || !self.types.needs_drop(move_path.ty) {
            return DropStyle::Dead;
        }

        if self.opens_capability(move_path.ty) {
            return DropStyle::Open;
        }

        if self.state.all_definitely_init(subtree) {
            return DropStyle::Static;
        }

        if move_path.children.is_empty() {
            DropStyle::Conditional
        } else {
            DropStyle::Open
        }
    }

    /// Content, through the accessor, then the husk. Guarded by the owner's
    /// flag when the owner itself may already be gone.
    fn open_owner_drop(
        &mut self,
        path: MovePathIndex,
        place: &LirPlace,
    ) -> Result<Vec<LirStatement>, CompilerError> {
        let paths = self.paths;
        let owner_type = paths.path(path).ty;

        let Some(content) = paths.content_child(path) else {
            return Err(self.internal_error(format!(
                "Capability owner {:?} has no content path",
                paths.path(path).place
            )));
        };

        let mut body = Vec::new();

        if self.state.any_maybe_init(paths.subtree(content)) {
            let (temp, call) = self.accessor_call(place.clone(), owner_type)?;
            body.push(call);
            body.extend(self.drop_path(content, &LirPlace::temp(temp).pointee())?);
        }

        // The owner's own drop never touches the content, so it never needs the policy.
        body.push(LirStatement::DropHusk {
            place: place.clone(),
            unwind: UnwindAction::Propagate,
        });
        self.stats.husk_drops += 1;

        self.guard_by_own_bit(path, body)
    }

    /// Fields in declaration order. Fields without a move path of their own
    /// share the struct's own bit.
    fn open_struct_drop(
        &mut self,
        path: MovePathIndex,
        place: &LirPlace,
        struct_type: TypeId,
    ) -> Result<Vec<LirStatement>, CompilerError> {
        let paths = self.paths;
        let types = self.types;
        let mut statements = Vec::new();

        for field in types.fields(struct_type) {
            let field_place = place.clone().field(field.id);

            match paths.child(path, PathProjection::Field(field.id)) {
                Some(child) => statements.extend(self.drop_path(child, &field_place)?),

                None => {
                    let body = self.drop_value(field_place, field.ty)?;
                    if !body.is_empty() {
                        statements.extend(self.guard_by_own_bit(path, body)?);
                    }
                }
            }
        }

        Ok(statements)
    }

    fn guard_by_own_bit(
        &mut self,
        path: MovePathIndex,
        body: Vec<LirStatement>,
    ) -> Result<Vec<LirStatement>, CompilerError> {
        match self.state.status(path) {
            InitStatus::Init => Ok(body),
            InitStatus::Maybe => Ok(vec![LirStatement::IfDropFlag {
                flag: self.flag_for(path)?,
                body,
            }]),
            InitStatus::Uninit => Ok(Vec::new()),
        }
    }

    /// The full drop of a value no move path tracks, with capability owners opened.
    fn drop_value(
        &mut self,
        place: LirPlace,
        ty: TypeId,
    ) -> Result<Vec<LirStatement>, CompilerError> {
        if !self.types.needs_drop(ty) {
            return Ok(Vec::new());
        }

        if let Some(capability) = self.registry.lookup(ty) {
            let content_type = capability.target;
            let (temp, call) = self.accessor_call(place.clone(), ty)?;

            let mut statements = vec![call];
            statements.extend(self.drop_value(LirPlace::temp(temp).pointee(), content_type)?);
            statements.push(LirStatement::DropHusk {
                place,
                unwind: UnwindAction::Propagate,
            });
            self.stats.husk_drops += 1;
            return Ok(statements);
        }

        if self.opens_capability(ty) {
            let types = self.types;
            let mut statements = Vec::new();
            for field in types.fields(ty) {
                statements.extend(self.drop_value(place.clone().field(field.id), field.ty)?);
            }
            return Ok(statements);
        }

        Ok(vec![self.drop_in_place(place)])
    }

    /// `drop_in_place`, with the abort boundary applied when the place is content
    /// reached through a storage accessor.
    pub(super) fn drop_in_place(&mut self, place: LirPlace) -> LirStatement {
        let unwind = if self.is_content_place(&place) {
            self.stats.content_drops += 1;
            self.policy.on_panic(SynthesizedSite::ContentDrop)
        } else {
            UnwindAction::Propagate
        };

        LirStatement::DropInPlace { place, unwind }
    }

    /// A capability owner, or a struct with one somewhere in its fields.
    fn opens_capability(&mut self, ty: TypeId) -> bool {
        if let Some(known) = self.opens_capability.get(&ty) {
            return *known;
        }

        let types = self.types;
        let opens = self.registry.has_capability(ty)
            || types
                .fields(ty)
                .iter()
                .any(|field| self.opens_capability(field.ty));

        self.opens_capability.insert(ty, opens);
        opens
    }

    /// Something under a path can't still be alive when the path itself is definitely gone.
    fn expect_live_parent(&self, path: MovePathIndex) -> Result<(), CompilerError> {
        if self.state.status(path) != InitStatus::Uninit {
            return Ok(());
        }

        let paths = self.paths;
        let alive_child = paths
            .path(path)
            .children
            .iter()
            .any(|child| self.state.any_maybe_init(paths.subtree(*child)));

        if alive_child {
            return Err(self.internal_error(format!(
                "Ownership fact has {:?} moved out while parts of it are still initialized",
                paths.path(path).place
            )));
        }

        Ok(())
    }

    fn flag_for(&mut self, path: MovePathIndex) -> Result<DropFlagId, CompilerError> {
        if let Some(flag) = self.drop_flags.get(&path) {
            return Ok(*flag);
        }

        match self.pass {
            ElaborationPass::Discover => {
                let flag = DropFlagId(self.drop_flags.len() as u32);
                self.drop_flags.insert(path, flag);
                Ok(flag)
            }

            ElaborationPass::Emit => Err(self.internal_error(format!(
                "Drop of {:?} needs a flag the discovery pass never allocated",
                self.paths.path(path).place
            ))),
        }
    }
}
