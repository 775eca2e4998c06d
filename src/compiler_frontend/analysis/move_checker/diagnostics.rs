use crate::compiler_frontend::analysis::move_checker::move_paths::{
    Indirection, MovePathIndex, MovePathTable,
};
use crate::compiler_frontend::analysis::move_checker::state::{InitStatus, OwnershipState};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_display::HirDisplayContext;
use crate::compiler_frontend::hir::hir_nodes::{HirBlock, HirFunction, HirModule, HirPlace, HirStatement};
use crate::{create_error, create_use_of_moved_value_error};

pub(super) struct MoveDiagnostics<'a> {
    module: &'a HirModule,
    function: &'a HirFunction,
    paths: &'a MovePathTable,
    display: HirDisplayContext<'a>,
}

impl<'a> MoveDiagnostics<'a> {
    pub(super) fn new(
        module: &'a HirModule,
        types: &'a TypeContext<'a>,
        function: &'a HirFunction,
        paths: &'a MovePathTable,
    ) -> Self {
        Self {
            module,
            function,
            paths,
            display: HirDisplayContext::for_function(function, types),
        }
    }

    pub(super) fn function_name(&self) -> &str {
        &self.function.name
    }

    pub(super) fn place_name(&self, place: &HirPlace) -> String {
        self.display.place(place)
    }

    pub(super) fn path_name(&self, path: MovePathIndex) -> String {
        self.display.place(&self.paths.path(path).place)
    }

    pub(super) fn statement_error_location(&self, statement: &HirStatement) -> ErrorLocation {
        statement.location.to_error_location(&self.module.source_path)
    }

    /// Terminators carry no location of their own, so they borrow the last statement's.
    pub(super) fn terminator_error_location(&self, block: &HirBlock) -> ErrorLocation {
        block
            .statements
            .last()
            .map(|statement| statement.location.clone())
            .unwrap_or_else(|| self.function.location.clone())
            .to_error_location(&self.module.source_path)
    }

    pub(super) fn function_error_location(&self) -> ErrorLocation {
        self.function
            .location
            .to_error_location(&self.module.source_path)
    }

    pub(super) fn use_of_moved_value(
        &self,
        place: &HirPlace,
        missing: MovePathIndex,
        state: &OwnershipState,
        location: ErrorLocation,
    ) -> CompilerError {
        let hint = self.uninit_hint(missing, state);
        create_use_of_moved_value_error!(self.place_name(place), location, hint)
    }

    pub(super) fn assign_to_moved_value(
        &self,
        place: &HirPlace,
        ancestor: MovePathIndex,
        state: &OwnershipState,
        location: ErrorLocation,
    ) -> CompilerError {
        let ancestor_name = self.path_name(ancestor);
        let mut error =
            create_use_of_moved_value_error!(ancestor_name, location, self.uninit_hint(ancestor, state));

        error.msg = format!(
            "assign to part of moved value: `{}` is written but `{}` is not initialized",
            self.place_name(place),
            self.path_name(ancestor)
        );
        error
    }

    pub(super) fn move_out_of_reference(
        &self,
        place: &HirPlace,
        via: Indirection,
        location: ErrorLocation,
    ) -> CompilerError {
        let behind = match via {
            Indirection::Reference { mutable: true } => "a mutable reference",
            Indirection::Reference { mutable: false } => "a shared reference",
            Indirection::Owner => "an owner without a place capability",
        };

        create_error!(
            MoveOutOfReference,
            format!("cannot move out of `{}`, which is behind {}", self.place_name(place), behind),
            location,
            {
                MovedPlace => self.place_name(place),
                CompilationStage => "Move Analysis",
                PrimarySuggestion => "Copy the value instead, or register a place capability for the owner type",
            }
        )
    }

    pub(super) fn internal(&self, msg: String, location: ErrorLocation) -> CompilerError {
        create_error!(Compiler, msg, location, {
            CompilationStage => "Move Analysis",
        })
    }

    fn uninit_hint(&self, missing: MovePathIndex, state: &OwnershipState) -> String {
        let missing_name = self.path_name(missing);
        match state.status(missing) {
            InitStatus::Maybe => format!(
                "`{}` is moved out on at least one path reaching this point",
                missing_name
            ),
            _ => format!(
                "`{}` is moved out, or was never initialized, on every path reaching this point",
                missing_name
            ),
        }
    }
}
