//! ============================================================
//!                         LIR Nodes
//! ============================================================
//! The elaborated form of a module. Everything move analysis reasoned about
//! symbolically is explicit here:
//!  - Place-capable derefs are accessor calls returning raw pointers
//!  - Drops are explicit, in order, guarded by drop flags when needed
//!  - Construction either writes into fresh storage or copies from a temp
//!
//! No `Deref` of an owner survives. Projections only go through fields,
//! raw pointers returned by accessors, and ordinary references.

use crate::backends::elaboration::abort_boundary::UnwindAction;
use crate::compiler_frontend::analysis::capabilities::PlaceCapability;
use crate::compiler_frontend::compiler_warnings::CompilerWarning;
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, ConstValue, FieldId, FunctionId, HirType, LocalId, TypeId,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TempId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DropFlagId(pub u32);

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.0)
    }
}

impl fmt::Display for DropFlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flag{}", self.0)
    }
}

// ============================================================
// Module
// ============================================================
#[derive(Debug, Clone, Default, Serialize)]
pub struct ElaboratedModule {
    pub types: Vec<HirType>,
    pub functions: Vec<LirFunction>,
    pub capabilities: Vec<PlaceCapability>,
    pub stats: ElaborationStats,

    #[serde(skip)]
    pub warnings: Vec<CompilerWarning>,
}

impl ElaboratedModule {
    pub fn function_by_name(&self, name: &str) -> Option<&LirFunction> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn function(&self, id: FunctionId) -> Option<&LirFunction> {
        self.functions.iter().find(|function| function.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ElaborationStats {
    pub functions_elaborated: usize,
    pub deferred_operations: usize,
    pub accessor_calls: usize,
    pub content_drops: usize,
    pub husk_drops: usize,
    pub drop_flags: usize,
    pub in_place_constructions: usize,
    pub temp_constructions: usize,
}

// ============================================================
// Functions
// ============================================================
#[derive(Debug, Clone, Serialize)]
pub struct LirFunction {
    pub id: FunctionId,
    pub name: String,
    pub entry: BlockId,
    pub params: Vec<LocalId>,
    pub locals: Vec<LirLocal>,
    pub temps: Vec<LirTemp>,
    pub drop_flags: Vec<LirDropFlag>,
    pub return_type: Option<TypeId>,
    pub blocks: Vec<LirBlock>,
}

impl LirFunction {
    pub fn block(&self, id: BlockId) -> Option<&LirBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }

    /// Every statement of the function, nested flag bodies included.
    pub fn all_statements(&self) -> Vec<&LirStatement> {
        let mut statements = Vec::new();
        for block in &self.blocks {
            collect_statements(&block.statements, &mut statements);
        }
        statements
    }
}

fn collect_statements<'a>(statements: &'a [LirStatement], into: &mut Vec<&'a LirStatement>) {
    for statement in statements {
        into.push(statement);
        if let LirStatement::IfDropFlag { body, .. } = statement {
            collect_statements(body, into);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LirLocal {
    pub id: LocalId,
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct LirTemp {
    pub id: TempId,
    pub ty: LirTempType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirTempType {
    Value(TypeId),

    /// What a storage accessor returns.
    RawMut(TypeId),

    /// What an overloaded or explicit deref call returns.
    Ref { target: TypeId, mutable: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct LirDropFlag {
    pub id: DropFlagId,

    /// The place whose initialization the flag tracks, for dumps and warnings.
    pub place: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LirBlock {
    pub id: BlockId,
    pub statements: Vec<LirStatement>,
    pub terminator: LirTerminator,
}

// ============================================================
// Places and values
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirBase {
    Local(LocalId),
    Temp(TempId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirProjection {
    Field(FieldId),

    /// Through a raw pointer or a reference.
    Pointee,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LirPlace {
    pub base: LirBase,
    pub projections: Vec<LirProjection>,
}

impl LirPlace {
    pub fn local(local: LocalId) -> Self {
        LirPlace {
            base: LirBase::Local(local),
            projections: Vec::new(),
        }
    }

    pub fn temp(temp: TempId) -> Self {
        LirPlace {
            base: LirBase::Temp(temp),
            projections: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldId) -> Self {
        self.projections.push(LirProjection::Field(field));
        self
    }

    pub fn pointee(mut self) -> Self {
        self.projections.push(LirProjection::Pointee);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirOperand {
    Copy(LirPlace),
    Move(LirPlace),
    Const(ConstValue),
    Ref { place: LirPlace, mutable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirRvalue {
    Use(LirOperand),
    Aggregate {
        ty: TypeId,
        fields: Vec<(FieldId, LirOperand)>,
    },
}

// ============================================================
// Statements
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerefOrigin {
    /// Written by the user as `Deref::deref(&x)` / `DerefMut::deref_mut(&mut x)`.
    Explicit,

    /// `*x` on an owner without a place capability.
    Overloaded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirStatement {
    Assign {
        dest: LirPlace,
        value: LirRvalue,
    },

    /// `dest = Owner::accessor(&mut owner)`, synthesized by elaboration.
    CallAccessor {
        dest: TempId,
        owner: LirPlace,
        accessor: String,
        unwind: UnwindAction,
    },

    /// `dest = Owner::new_uninit(args)`: storage whose content is not initialized yet.
    NewUninit {
        dest: LirPlace,
        ty: TypeId,
        args: Option<LirOperand>,
        unwind: UnwindAction,
    },

    /// `dest = Owner::new(value)`: allocate storage, then copy `value` into it.
    AllocStorage {
        dest: LirPlace,
        ty: TypeId,
        args: Option<LirOperand>,
        value: LirOperand,
    },

    /// Run the full drop glue of the value at `place`.
    DropInPlace {
        place: LirPlace,
        unwind: UnwindAction,
    },

    /// The owner's own drop. Releases the storage and never touches the content.
    DropHusk {
        place: LirPlace,
        unwind: UnwindAction,
    },

    SetDropFlag {
        flag: DropFlagId,
        value: bool,
    },

    IfDropFlag {
        flag: DropFlagId,
        body: Vec<LirStatement>,
    },

    Call {
        function: FunctionId,
        args: Vec<LirOperand>,
        result: Option<LirPlace>,
    },

    Deref {
        dest: LirPlace,
        owner: LirPlace,
        mutable: bool,
        origin: DerefOrigin,
    },

    Observe(LirOperand),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LirTerminator {
    Goto {
        target: BlockId,
    },

    If {
        condition: LirOperand,
        then_block: BlockId,
        else_block: BlockId,
    },

    Return {
        value: Option<LirOperand>,
    },

    /// Ends the program. No cleanup runs.
    Panic {
        message: Option<String>,
    },
}
