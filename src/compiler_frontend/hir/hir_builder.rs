//! Programmatic HIR construction.
//!
//! Program files are the usual way into the pipeline, but embedders and tests
//! build modules directly. The builder hands out fresh ids and keeps blocks,
//! statement ids and locations consistent so the result passes validation.

use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, CallTarget, ConstValue, DerefKind, FieldId, FunctionId, HirBlock, HirField,
    HirFunction, HirLocal, HirModule, HirNodeId, HirOperand, HirPlace, HirRvalue, HirStatement,
    HirStatementKind, HirTerminator, HirType, LocalId, TextLocation, TypeId, TypeKind,
};

#[derive(Debug, Default)]
pub struct HirModuleBuilder {
    module: HirModule,
    next_node: u32,
    next_block: u32,
}

impl HirModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, name: &str, kind: TypeKind) -> TypeId {
        let id = TypeId(self.module.types.len() as u32);
        self.module.types.push(HirType {
            id,
            name: name.to_owned(),
            kind,
        });
        id
    }

    pub fn int_type(&mut self) -> TypeId {
        self.add_type("Int", TypeKind::Int)
    }

    pub fn bool_type(&mut self) -> TypeId {
        self.add_type("Bool", TypeKind::Bool)
    }

    pub fn resource_type(&mut self, name: &str) -> TypeId {
        self.add_type(name, TypeKind::Resource)
    }

    /// Fields get ids in declaration order, starting at zero.
    pub fn struct_type(&mut self, name: &str, fields: &[(&str, TypeId)]) -> TypeId {
        let fields = fields
            .iter()
            .enumerate()
            .map(|(index, (field_name, ty))| HirField {
                id: FieldId(index as u32),
                name: (*field_name).to_owned(),
                ty: *ty,
            })
            .collect::<Vec<_>>();

        self.add_type(name, TypeKind::Struct { fields })
    }

    pub fn ref_type(&mut self, name: &str, target: TypeId, mutable: bool) -> TypeId {
        self.add_type(name, TypeKind::Ref { target, mutable })
    }

    pub fn owner_type(&mut self, name: &str, target: TypeId, deref: DerefKind) -> TypeId {
        self.add_type(name, TypeKind::Owner { target, deref })
    }

    pub fn function(&mut self, name: &str) -> FunctionBuilder<'_> {
        let id = FunctionId(self.module.functions.len() as u32);
        let entry = self.fresh_block_id();

        let function = HirFunction {
            id,
            name: name.to_owned(),
            entry,
            params: Vec::new(),
            locals: Vec::new(),
            return_type: None,
            location: TextLocation::default(),
        };

        FunctionBuilder {
            module: self,
            function,
            blocks: vec![empty_block(entry)],
            current: 0,
            location: TextLocation::default(),
        }
    }

    pub fn finish(self) -> HirModule {
        self.module
    }

    fn fresh_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    fn fresh_node_id(&mut self) -> HirNodeId {
        let id = HirNodeId(self.next_node);
        self.next_node += 1;
        id
    }
}

pub struct FunctionBuilder<'m> {
    module: &'m mut HirModuleBuilder,
    function: HirFunction,
    blocks: Vec<HirBlock>,
    current: usize,
    location: TextLocation,
}

impl FunctionBuilder<'_> {
    pub fn id(&self) -> FunctionId {
        self.function.id
    }

    pub fn entry(&self) -> BlockId {
        self.function.entry
    }

    pub fn returns(&mut self, ty: TypeId) -> &mut Self {
        self.function.return_type = Some(ty);
        self
    }

    pub fn param(&mut self, name: &str, ty: TypeId) -> LocalId {
        let id = self.local(name, ty);
        self.function.params.push(id);
        id
    }

    pub fn local(&mut self, name: &str, ty: TypeId) -> LocalId {
        let id = LocalId(self.function.locals.len() as u32);
        self.function.locals.push(HirLocal {
            id,
            name: name.to_owned(),
            ty,
            location: self.location.clone(),
        });
        id
    }

    /// Subsequent statements get this source line.
    pub fn at_line(&mut self, line: i32) -> &mut Self {
        self.location = TextLocation::new_just_line(line);
        self
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = self.module.fresh_block_id();
        self.blocks.push(empty_block(id));
        id
    }

    pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
        if let Some(index) = self.blocks.iter().position(|candidate| candidate.id == block) {
            self.current = index;
        }
        self
    }

    pub fn current_block(&self) -> BlockId {
        self.blocks[self.current].id
    }

    pub fn push(&mut self, kind: HirStatementKind) -> HirNodeId {
        let id = self.module.fresh_node_id();
        let statement = HirStatement {
            id,
            kind,
            location: self.location.clone(),
        };
        self.blocks[self.current].statements.push(statement);
        id
    }

    pub fn assign(&mut self, target: HirPlace, value: HirRvalue) -> HirNodeId {
        self.push(HirStatementKind::Assign { target, value })
    }

    pub fn assign_operand(&mut self, target: HirPlace, operand: HirOperand) -> HirNodeId {
        self.assign(target, HirRvalue::Use(operand))
    }

    pub fn construct(&mut self, target: HirPlace, ty: TypeId, value: HirRvalue) -> HirNodeId {
        self.push(HirStatementKind::Construct {
            target,
            ty,
            args: None,
            value,
        })
    }

    pub fn construct_with_args(
        &mut self,
        target: HirPlace,
        ty: TypeId,
        args: HirOperand,
        value: HirRvalue,
    ) -> HirNodeId {
        self.push(HirStatementKind::Construct {
            target,
            ty,
            args: Some(args),
            value,
        })
    }

    pub fn call(
        &mut self,
        function: FunctionId,
        args: Vec<HirOperand>,
        result: Option<HirPlace>,
    ) -> HirNodeId {
        self.push(HirStatementKind::Call {
            target: CallTarget::Function(function),
            args,
            result,
        })
    }

    /// An explicit `Deref::deref(&owner)` / `DerefMut::deref_mut(&mut owner)` call.
    pub fn user_deref(&mut self, owner: HirPlace, mutable: bool, result: HirPlace) -> HirNodeId {
        self.push(HirStatementKind::Call {
            target: CallTarget::UserDeref { mutable },
            args: vec![HirOperand::Borrow {
                place: owner,
                mutable,
            }],
            result: Some(result),
        })
    }

    pub fn observe(&mut self, operand: HirOperand) -> HirNodeId {
        self.push(HirStatementKind::Observe(operand))
    }

    pub fn drop_local(&mut self, local: LocalId) -> HirNodeId {
        self.push(HirStatementKind::Drop(local))
    }

    pub fn terminate(&mut self, terminator: HirTerminator) -> &mut Self {
        self.blocks[self.current].terminator = terminator;
        self
    }

    pub fn goto(&mut self, target: BlockId) -> &mut Self {
        self.terminate(HirTerminator::Jump { target })
    }

    pub fn branch(
        &mut self,
        condition: HirOperand,
        then_block: BlockId,
        else_block: BlockId,
    ) -> &mut Self {
        self.terminate(HirTerminator::If {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn return_value(&mut self, value: Option<HirOperand>) -> &mut Self {
        self.terminate(HirTerminator::Return { value })
    }

    pub fn panic(&mut self, message: &str) -> &mut Self {
        self.terminate(HirTerminator::Panic {
            message: Some(message.to_owned()),
        })
    }

    pub fn finish(self) -> FunctionId {
        let id = self.function.id;
        self.module.module.functions.push(self.function);
        self.module.module.blocks.extend(self.blocks);
        id
    }
}

fn empty_block(id: BlockId) -> HirBlock {
    HirBlock {
        id,
        statements: Vec::new(),
        terminator: HirTerminator::Return { value: None },
    }
}

// ============================================================
// Place and operand shorthands
// ============================================================
pub fn local(local: LocalId) -> HirPlace {
    HirPlace::Local(local)
}

pub fn deref(place: HirPlace) -> HirPlace {
    place.deref()
}

pub fn field(place: HirPlace, field: u32) -> HirPlace {
    place.field(FieldId(field))
}

pub fn copy(place: HirPlace) -> HirOperand {
    HirOperand::Copy(place)
}

pub fn mv(place: HirPlace) -> HirOperand {
    HirOperand::Move(place)
}

pub fn int(value: i64) -> HirOperand {
    HirOperand::Const(ConstValue::Int(value))
}

pub fn boolean(value: bool) -> HirOperand {
    HirOperand::Const(ConstValue::Bool(value))
}

pub fn resource(payload: i64) -> HirOperand {
    HirOperand::Const(ConstValue::Resource(payload))
}

pub fn borrow(place: HirPlace, mutable: bool) -> HirOperand {
    HirOperand::Borrow { place, mutable }
}

pub fn value(operand: HirOperand) -> HirRvalue {
    HirRvalue::Use(operand)
}

pub fn aggregate(ty: TypeId, fields: Vec<HirOperand>) -> HirRvalue {
    HirRvalue::Aggregate {
        ty,
        fields: fields
            .into_iter()
            .enumerate()
            .map(|(index, operand)| (FieldId(index as u32), operand))
            .collect(),
    }
}
