//! HIR Validation
//!
//! Always-on structural validation for incoming HIR modules.
//! Program files are written by hand or by other tools, so nothing about them
//! is trusted: ids must resolve, places must type-check, and control flow must
//! stay inside its function. Everything downstream relies on this contract.

use crate::compiler_frontend::analysis::capabilities::CapabilityRegistry;
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_frontend::hir::hir_datatypes::{TypeContext, local_types};
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, CallTarget, ConstValue, DerefKind, FunctionId, HirBlock, HirFunction, HirModule,
    HirNodeId, HirOperand, HirPlace, HirRvalue, HirStatement, HirStatementKind, HirTerminator,
    LocalId, TextLocation, TypeId, TypeKind,
};
use crate::{create_error, return_malformed_program_error};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn validate_hir_module(
    module: &HirModule,
    types: &TypeContext,
    registry: &CapabilityRegistry,
) -> Result<(), CompilerError> {
    let mut validator = HirValidator::new(module, types, registry);
    validator.validate()
}

/// Type declarations are checked on their own so capability registration can
/// trust the type table before bodies are looked at.
pub fn validate_type_declarations(module: &HirModule) -> Result<(), CompilerError> {
    let location = ErrorLocation::in_file(&module.source_path);
    let mut seen = FxHashSet::default();

    for ty in &module.types {
        if !seen.insert(ty.id) {
            return_malformed_program_error!(
                format!("Duplicate type id {} ('{}')", ty.id, ty.name),
                location,
                { TypeName => ty.name }
            );
        }
    }

    let types = TypeContext::new(&module.types);

    for ty in &module.types {
        match &ty.kind {
            TypeKind::Struct { fields } => {
                let mut field_ids = FxHashSet::default();
                for field in fields {
                    if !field_ids.insert(field.id) {
                        return_malformed_program_error!(
                            format!("Struct '{}' declares field id {} twice", ty.name, field.id),
                            location,
                            { TypeName => ty.name }
                        );
                    }

                    if !types.contains(field.ty) {
                        return_malformed_program_error!(
                            format!(
                                "Field '{}' of struct '{}' has unknown type {}",
                                field.name, ty.name, field.ty
                            ),
                            location,
                            { TypeName => ty.name }
                        );
                    }
                }
            }

            TypeKind::Ref { target, .. } | TypeKind::Owner { target, .. } => {
                if !types.contains(*target) {
                    return_malformed_program_error!(
                        format!("Type '{}' points at unknown type {}", ty.name, target),
                        location,
                        { TypeName => ty.name }
                    );
                }
            }

            TypeKind::Int | TypeKind::Bool | TypeKind::Resource => {}
        }
    }

    // There are no enums or options, so any recursive type is uninhabitable.
    // Rejecting them keeps every type walk finite.
    let mut state = FxHashMap::default();
    for ty in &module.types {
        if let Some(cycle_type) = find_type_cycle(&types, ty.id, &mut state) {
            return_malformed_program_error!(
                format!("Type '{}' contains itself", types.name(cycle_type)),
                location,
                {
                    TypeName => types.name(cycle_type),
                    PrimarySuggestion => "Recursive types can't be constructed without an optional link",
                }
            );
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

fn find_type_cycle(
    types: &TypeContext,
    ty: TypeId,
    state: &mut FxHashMap<TypeId, VisitState>,
) -> Option<TypeId> {
    match state.get(&ty) {
        Some(VisitState::Done) => return None,
        Some(VisitState::Visiting) => return Some(ty),
        None => {}
    }

    state.insert(ty, VisitState::Visiting);

    let children = match types.kind(ty) {
        Some(TypeKind::Struct { fields }) => fields.iter().map(|field| field.ty).collect(),
        Some(TypeKind::Ref { target, .. } | TypeKind::Owner { target, .. }) => vec![*target],
        _ => Vec::new(),
    };

    for child in children {
        if let Some(cycle) = find_type_cycle(types, child, state) {
            return Some(cycle);
        }
    }

    state.insert(ty, VisitState::Done);
    None
}

/// What an operand evaluates to, before it is matched against an expected type.
#[derive(Debug, Clone, Copy)]
enum OperandShape {
    Typed(TypeId),
    Const(ConstValue),
    Borrow { target: TypeId, mutable: bool },
}

struct HirValidator<'a> {
    module: &'a HirModule,
    types: &'a TypeContext<'a>,
    registry: &'a CapabilityRegistry,

    block_index_by_id: FxHashMap<BlockId, usize>,
    functions_by_id: FxHashMap<FunctionId, &'a HirFunction>,
    block_owner: FxHashMap<BlockId, FunctionId>,
    statement_ids: FxHashSet<HirNodeId>,
}

impl<'a> HirValidator<'a> {
    fn new(
        module: &'a HirModule,
        types: &'a TypeContext<'a>,
        registry: &'a CapabilityRegistry,
    ) -> Self {
        Self {
            module,
            types,
            registry,
            block_index_by_id: FxHashMap::default(),
            functions_by_id: FxHashMap::default(),
            block_owner: FxHashMap::default(),
            statement_ids: FxHashSet::default(),
        }
    }

    fn validate(&mut self) -> Result<(), CompilerError> {
        self.collect_definition_ids()?;

        let module = self.module;
        for function in &module.functions {
            self.validate_function_signature(function)?;
            self.validate_function_body(function)?;
        }

        Ok(())
    }

    fn collect_definition_ids(&mut self) -> Result<(), CompilerError> {
        let module = self.module;

        for (index, block) in module.blocks.iter().enumerate() {
            if self.block_index_by_id.insert(block.id, index).is_some() {
                return Err(self.error(format!("Duplicate block id {}", block.id), None));
            }
        }

        for function in &module.functions {
            if self.functions_by_id.insert(function.id, function).is_some() {
                return Err(self.error(
                    format!("Duplicate function id {} ('{}')", function.id, function.name),
                    Some(&function.location),
                ));
            }
        }

        Ok(())
    }

    fn validate_function_signature(&self, function: &HirFunction) -> Result<(), CompilerError> {
        let mut local_ids = FxHashSet::default();

        for local in &function.locals {
            if !local_ids.insert(local.id) {
                return_malformed_program_error!(
                    format!(
                        "Function '{}' declares local {} twice",
                        function.name, local.id
                    ),
                    self.location(&local.location),
                    { VariableName => local.name }
                );
            }

            if !self.types.contains(local.ty) {
                return_malformed_program_error!(
                    format!("Local '{}' has unknown type {}", local.name, local.ty),
                    self.location(&local.location),
                    { VariableName => local.name }
                );
            }
        }

        for param in &function.params {
            if !local_ids.contains(param) {
                return_malformed_program_error!(
                    format!(
                        "Parameter {} of function '{}' is not one of its locals",
                        param, function.name
                    ),
                    self.location(&function.location)
                );
            }
        }

        if let Some(return_type) = function.return_type {
            if !self.types.contains(return_type) {
                return_malformed_program_error!(
                    format!(
                        "Function '{}' returns unknown type {}",
                        function.name, return_type
                    ),
                    self.location(&function.location)
                );
            }
        }

        Ok(())
    }

    fn validate_function_body(&mut self, function: &'a HirFunction) -> Result<(), CompilerError> {
        let locals = local_types(function);
        let mut stack = vec![function.entry];
        let mut visited = FxHashSet::default();

        while let Some(block_id) = stack.pop() {
            if !visited.insert(block_id) {
                continue;
            }

            let Some(index) = self.block_index_by_id.get(&block_id).copied() else {
                return_malformed_program_error!(
                    format!(
                        "Function '{}' jumps to unknown block {}",
                        function.name, block_id
                    ),
                    self.location(&function.location)
                );
            };

            if let Some(owner) = self.block_owner.insert(block_id, function.id) {
                if owner != function.id {
                    return_malformed_program_error!(
                        format!(
                            "Block {} is reachable from more than one function ('{}' and {})",
                            block_id, function.name, owner
                        ),
                        self.location(&function.location)
                    );
                }
            }

            let module = self.module;
            let block = &module.blocks[index];
            self.validate_block(function, &locals, block)?;
            stack.extend(block.terminator.successors());
        }

        Ok(())
    }

    fn validate_block(
        &mut self,
        function: &HirFunction,
        locals: &FxHashMap<LocalId, TypeId>,
        block: &HirBlock,
    ) -> Result<(), CompilerError> {
        for statement in &block.statements {
            if !self.statement_ids.insert(statement.id) {
                return_malformed_program_error!(
                    format!("Duplicate statement id {}", statement.id),
                    self.location(&statement.location)
                );
            }

            self.validate_statement(function, locals, statement)?;
        }

        let location = block
            .statements
            .last()
            .map(|statement| statement.location.clone())
            .unwrap_or_else(|| function.location.clone());

        match &block.terminator {
            HirTerminator::Jump { .. } | HirTerminator::Panic { .. } => Ok(()),

            HirTerminator::If { condition, .. } => {
                let shape = self.operand_shape(locals, condition, &location)?;
                if !self.shape_fits(shape, |kind| matches!(kind, TypeKind::Bool)) {
                    return_malformed_program_error!(
                        format!("Branch condition in block {} is not a Bool", block.id),
                        self.location(&location)
                    );
                }
                Ok(())
            }

            HirTerminator::Return { value } => match (value, function.return_type) {
                (None, None) => Ok(()),
                (Some(value), Some(return_type)) => {
                    let shape = self.operand_shape(locals, value, &location)?;
                    self.expect_type(shape, return_type, &location, "return value")
                }
                (Some(_), None) => {
                    return_malformed_program_error!(
                        format!(
                            "Function '{}' has no return type but returns a value",
                            function.name
                        ),
                        self.location(&location)
                    );
                }
                (None, Some(_)) => {
                    return_malformed_program_error!(
                        format!("Function '{}' must return a value", function.name),
                        self.location(&location)
                    );
                }
            },
        }
    }

    fn validate_statement(
        &self,
        function: &HirFunction,
        locals: &FxHashMap<LocalId, TypeId>,
        statement: &HirStatement,
    ) -> Result<(), CompilerError> {
        let location = &statement.location;

        match &statement.kind {
            HirStatementKind::Assign { target, value } => {
                let target_type = self.place_type(locals, target, location)?;
                self.expect_writable(locals, target, location)?;
                self.validate_rvalue(locals, value, target_type, location)
            }

            HirStatementKind::Construct {
                target,
                ty,
                args,
                value,
            } => {
                let Some(TypeKind::Owner { target: content, .. }) = self.types.kind(*ty) else {
                    return_malformed_program_error!(
                        format!(
                            "Only owner types can be constructed, '{}' is not one",
                            self.types.name(*ty)
                        ),
                        self.location(location),
                        { TypeName => self.types.name(*ty) }
                    );
                };

                let target_type = self.place_type(locals, target, location)?;
                if target_type != *ty {
                    return_malformed_program_error!(
                        format!(
                            "Constructed '{}' is stored into a place of type '{}'",
                            self.types.name(*ty),
                            self.types.name(target_type)
                        ),
                        self.location(location)
                    );
                }
                self.expect_writable(locals, target, location)?;
                self.validate_rvalue(locals, value, *content, location)?;

                let declared_args = self
                    .registry
                    .lookup(*ty)
                    .and_then(|capability| capability.construction.as_ref())
                    .map(|construction| construction.args);

                match (declared_args, args) {
                    (Some(Some(args_type)), Some(args)) => {
                        let shape = self.operand_shape(locals, args, location)?;
                        self.expect_type(shape, args_type, location, "constructor arguments")
                    }
                    (Some(Some(args_type)), None) => {
                        return_malformed_program_error!(
                            format!(
                                "'{}' needs constructor arguments of type '{}'",
                                self.types.name(*ty),
                                self.types.name(args_type)
                            ),
                            self.location(location)
                        );
                    }
                    (Some(None), Some(_)) => {
                        return_malformed_program_error!(
                            format!("'{}' takes no constructor arguments", self.types.name(*ty)),
                            self.location(location)
                        );
                    }
                    (_, Some(args)) => self.operand_shape(locals, args, location).map(|_| ()),
                    (_, None) => Ok(()),
                }
            }

            HirStatementKind::Call {
                target: CallTarget::Function(callee_id),
                args,
                result,
            } => {
                let Some(callee) = self.functions_by_id.get(callee_id).copied() else {
                    return_malformed_program_error!(
                        format!("Call to unknown function {}", callee_id),
                        self.location(location)
                    );
                };

                if callee.params.len() != args.len() {
                    return_malformed_program_error!(
                        format!(
                            "'{}' takes {} arguments but {} were given",
                            callee.name,
                            callee.params.len(),
                            args.len()
                        ),
                        self.location(location)
                    );
                }

                let callee_locals = local_types(callee);
                for (param, arg) in callee.params.iter().zip(args) {
                    let Some(param_type) = callee_locals.get(param).copied() else {
                        return_malformed_program_error!(
                            format!("'{}' has an undeclared parameter {}", callee.name, param),
                            self.location(location)
                        );
                    };

                    let shape = self.operand_shape(locals, arg, location)?;
                    self.expect_type(shape, param_type, location, "argument")?;
                }

                if let Some(result) = result {
                    let Some(return_type) = callee.return_type else {
                        return_malformed_program_error!(
                            format!("'{}' returns nothing to store", callee.name),
                            self.location(location)
                        );
                    };

                    let result_type = self.place_type(locals, result, location)?;
                    self.expect_writable(locals, result, location)?;
                    self.expect_type(
                        OperandShape::Typed(return_type),
                        result_type,
                        location,
                        "call result",
                    )?;
                }

                Ok(())
            }

            HirStatementKind::Call {
                target: CallTarget::UserDeref { mutable },
                args,
                result,
            } => {
                let [HirOperand::Borrow {
                    place,
                    mutable: borrow_mutable,
                }] = args.as_slice()
                else {
                    return_malformed_program_error!(
                        "An explicit deref call takes exactly one borrow of the owner",
                        self.location(location)
                    );
                };

                if borrow_mutable != mutable {
                    return_malformed_program_error!(
                        "Explicit deref call borrows the owner with the wrong mutability",
                        self.location(location)
                    );
                }

                let owner_type = self.place_type(locals, place, location)?;
                let Some(TypeKind::Owner { target, deref }) = self.types.kind(owner_type) else {
                    return_malformed_program_error!(
                        format!(
                            "'{}' does not implement the deref capability",
                            self.types.name(owner_type)
                        ),
                        self.location(location)
                    );
                };

                if *deref == DerefKind::None || (*mutable && *deref != DerefKind::Mutable) {
                    return_malformed_program_error!(
                        format!(
                            "'{}' does not implement {}",
                            self.types.name(owner_type),
                            if *mutable { "DerefMut" } else { "Deref" }
                        ),
                        self.location(location)
                    );
                }

                if *mutable {
                    self.expect_writable(locals, place, location)?;
                } else {
                    self.place_type(locals, place, location)?;
                }

                if let Some(result) = result {
                    let result_type = self.place_type(locals, result, location)?;
                    self.expect_writable(locals, result, location)?;
                    self.expect_type(
                        OperandShape::Borrow {
                            target: *target,
                            mutable: *mutable,
                        },
                        result_type,
                        location,
                        "deref result",
                    )?;
                }

                Ok(())
            }

            HirStatementKind::Observe(operand) => {
                self.operand_shape(locals, operand, location).map(|_| ())
            }

            HirStatementKind::Drop(local) => {
                if !locals.contains_key(local) {
                    return_malformed_program_error!(
                        format!("Function '{}' drops unknown local {}", function.name, local),
                        self.location(location)
                    );
                }
                Ok(())
            }
        }
    }

    fn validate_rvalue(
        &self,
        locals: &FxHashMap<LocalId, TypeId>,
        rvalue: &HirRvalue,
        expected: TypeId,
        location: &TextLocation,
    ) -> Result<(), CompilerError> {
        match rvalue {
            HirRvalue::Use(operand) => {
                let shape = self.operand_shape(locals, operand, location)?;
                self.expect_type(shape, expected, location, "value")
            }

            HirRvalue::Aggregate { ty, fields } => {
                if *ty != expected {
                    return_malformed_program_error!(
                        format!(
                            "Expected a '{}' but found a '{}' literal",
                            self.types.name(expected),
                            self.types.name(*ty)
                        ),
                        self.location(location)
                    );
                }

                let declared = self.types.fields(*ty);
                if !matches!(self.types.kind(*ty), Some(TypeKind::Struct { .. })) {
                    return_malformed_program_error!(
                        format!("'{}' is not a struct", self.types.name(*ty)),
                        self.location(location)
                    );
                }

                let mut seen = FxHashSet::default();
                for (field_id, operand) in fields {
                    let Some(field) = self.types.field(*ty, *field_id) else {
                        return_malformed_program_error!(
                            format!(
                                "'{}' has no field {}",
                                self.types.name(*ty),
                                field_id
                            ),
                            self.location(location)
                        );
                    };

                    if !seen.insert(*field_id) {
                        return_malformed_program_error!(
                            format!(
                                "Field '{}' of '{}' is initialized twice",
                                field.name,
                                self.types.name(*ty)
                            ),
                            self.location(location)
                        );
                    }

                    let shape = self.operand_shape(locals, operand, location)?;
                    self.expect_type(shape, field.ty, location, "field value")?;
                }

                if seen.len() != declared.len() {
                    return_malformed_program_error!(
                        format!("'{}' literal is missing fields", self.types.name(*ty)),
                        self.location(location)
                    );
                }

                Ok(())
            }
        }
    }

    fn operand_shape(
        &self,
        locals: &FxHashMap<LocalId, TypeId>,
        operand: &HirOperand,
        location: &TextLocation,
    ) -> Result<OperandShape, CompilerError> {
        match operand {
            HirOperand::Copy(place) | HirOperand::Move(place) => {
                Ok(OperandShape::Typed(self.place_type(locals, place, location)?))
            }
            HirOperand::Const(value) => Ok(OperandShape::Const(*value)),
            HirOperand::Borrow { place, mutable } => {
                let target = self.place_type(locals, place, location)?;
                if *mutable {
                    self.expect_writable(locals, place, location)?;
                }
                Ok(OperandShape::Borrow {
                    target,
                    mutable: *mutable,
                })
            }
        }
    }

    fn shape_fits(&self, shape: OperandShape, predicate: impl Fn(&TypeKind) -> bool) -> bool {
        match shape {
            OperandShape::Typed(ty) => self.types.kind(ty).is_some_and(predicate),
            OperandShape::Const(ConstValue::Bool(_)) => predicate(&TypeKind::Bool),
            OperandShape::Const(ConstValue::Int(_)) => predicate(&TypeKind::Int),
            OperandShape::Const(ConstValue::Resource(_)) => predicate(&TypeKind::Resource),
            OperandShape::Borrow { .. } => false,
        }
    }

    fn expect_type(
        &self,
        shape: OperandShape,
        expected: TypeId,
        location: &TextLocation,
        what: &str,
    ) -> Result<(), CompilerError> {
        let Some(expected_kind) = self.types.kind(expected) else {
            return_malformed_program_error!(
                format!("Unknown type {}", expected),
                self.location(location)
            );
        };

        let fits = match shape {
            OperandShape::Typed(ty) => ty == expected,
            OperandShape::Const(ConstValue::Int(_)) => matches!(expected_kind, TypeKind::Int),
            OperandShape::Const(ConstValue::Bool(_)) => matches!(expected_kind, TypeKind::Bool),
            OperandShape::Const(ConstValue::Resource(_)) => {
                matches!(expected_kind, TypeKind::Resource)
            }
            // A mutable borrow can stand in for a shared one.
            OperandShape::Borrow { target, mutable } => match expected_kind {
                TypeKind::Ref {
                    target: expected_target,
                    mutable: expected_mutable,
                } => *expected_target == target && (mutable || !*expected_mutable),
                _ => false,
            },
        };

        if fits {
            return Ok(());
        }

        return_malformed_program_error!(
            format!(
                "Mismatched {}: expected '{}'",
                what,
                self.types.name(expected)
            ),
            self.location(location),
            { TypeName => self.types.name(expected) }
        )
    }

    fn place_type(
        &self,
        locals: &FxHashMap<LocalId, TypeId>,
        place: &HirPlace,
        location: &TextLocation,
    ) -> Result<TypeId, CompilerError> {
        match place {
            HirPlace::Local(local) => match locals.get(local) {
                Some(ty) => Ok(*ty),
                None => {
                    return_malformed_program_error!(
                        format!("Unknown local {}", local),
                        self.location(location)
                    );
                }
            },

            HirPlace::Field { base, field } => {
                let base_type = self.place_type(locals, base, location)?;
                match self.types.field(base_type, *field) {
                    Some(field) => Ok(field.ty),
                    None => {
                        return_malformed_program_error!(
                            format!(
                                "'{}' has no field {}",
                                self.types.name(base_type),
                                field
                            ),
                            self.location(location)
                        );
                    }
                }
            }

            HirPlace::Deref(base) => {
                let base_type = self.place_type(locals, base, location)?;
                match self.types.deref_target(base_type) {
                    Some(target) => Ok(target),
                    None => {
                        return_malformed_program_error!(
                            format!("'{}' can't be dereferenced", self.types.name(base_type)),
                            self.location(location),
                            { TypeName => self.types.name(base_type) }
                        );
                    }
                }
            }
        }
    }

    /// Writes can't go through shared references or owners that only implement `Deref`.
    fn expect_writable(
        &self,
        locals: &FxHashMap<LocalId, TypeId>,
        place: &HirPlace,
        location: &TextLocation,
    ) -> Result<(), CompilerError> {
        let mut current = place;

        while let Some(base) = current.base() {
            if matches!(current, HirPlace::Deref(_)) {
                let base_type = self.place_type(locals, base, location)?;
                let writable = match self.types.kind(base_type) {
                    Some(TypeKind::Ref { mutable, .. }) => *mutable,
                    Some(TypeKind::Owner { deref, .. }) => *deref == DerefKind::Mutable,
                    _ => false,
                };

                if !writable {
                    return_malformed_program_error!(
                        format!(
                            "Can't write through a shared deref of '{}'",
                            self.types.name(base_type)
                        ),
                        self.location(location)
                    );
                }
            }

            current = base;
        }

        Ok(())
    }

    fn location(&self, location: &TextLocation) -> ErrorLocation {
        location.to_error_location(&self.module.source_path)
    }

    fn error(&self, msg: String, location: Option<&TextLocation>) -> CompilerError {
        let location = match location {
            Some(location) => self.location(location),
            None => ErrorLocation::in_file(&self.module.source_path),
        };

        create_error!(MalformedProgram, msg, location, {
            CompilationStage => "HIR Validation",
        })
    }
}
