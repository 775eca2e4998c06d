//! ============================================================
//!                         HIR Nodes
//! ============================================================
//! The place-based representation the move pipeline works over.
//!  - All symbols are resolved to stable IDs
//!  - Every memory access is an explicit place
//!  - Control flow is explicit blocks and terminators
//!
//! ============================================================
//!                     Memory Semantics
//! ============================================================
//!
//! Locals start uninitialized (parameters start initialized).
//! `Move` operands invalidate their place, `Copy` operands don't.
//! `Deref` of an `Owner` type whose type registered a place capability is
//! tracked exactly like a local: it can be moved out of and written back.
//! Every other deref is an ordinary borrow of the target.

use crate::compiler_frontend::compiler_errors::{CharPosition, ErrorLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================
// Stable IDs
// ============================================================
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HirNodeId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LocalId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FieldId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FunctionId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl fmt::Display for HirNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ty{}", self.0)
    }
}

// ============================================================
// Source locations
// ============================================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLocation {
    #[serde(default)]
    pub start_pos: CharPosition,
    #[serde(default)]
    pub end_pos: CharPosition,
}

impl TextLocation {
    pub fn new_just_line(line: i32) -> Self {
        let position = CharPosition {
            line_number: line,
            char_column: 1,
        };

        TextLocation {
            start_pos: position,
            end_pos: position,
        }
    }

    pub fn to_error_location(&self, scope: &Path) -> ErrorLocation {
        ErrorLocation::new(scope.to_path_buf(), self.start_pos, self.end_pos)
    }
}

// ============================================================
// Module
// ============================================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HirModule {
    /// File the module was loaded from, used for error locations.
    #[serde(skip)]
    pub source_path: PathBuf,

    #[serde(default)]
    pub types: Vec<HirType>,
    #[serde(default)]
    pub functions: Vec<HirFunction>,
    #[serde(default)]
    pub blocks: Vec<HirBlock>,
}

// ============================================================
// Types
// ============================================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HirType {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Int,
    Bool,

    /// Non-Copy scalar that needs drop (a heap string, a file handle).
    Resource,

    Struct {
        fields: Vec<HirField>,
    },

    /// A borrow. Shared borrows are Copy.
    Ref {
        target: TypeId,
        mutable: bool,
    },

    /// A user type owning storage that holds one `target` value.
    /// `deref` is what the generic deref resolution found for the type.
    Owner {
        target: TypeId,
        deref: DerefKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerefKind {
    None,
    Shared,
    Mutable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HirField {
    pub id: FieldId,
    pub name: String,
    pub ty: TypeId,
}

// ============================================================
// Functions
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirFunction {
    pub id: FunctionId,
    pub name: String,
    pub entry: BlockId,

    /// Owned parameters, initialized on entry.
    #[serde(default)]
    pub params: Vec<LocalId>,

    /// Every local of the function, parameters included, in declaration order.
    #[serde(default)]
    pub locals: Vec<HirLocal>,

    #[serde(default)]
    pub return_type: Option<TypeId>,

    #[serde(default)]
    pub location: TextLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirLocal {
    pub id: LocalId,
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub location: TextLocation,
}

// ============================================================
// Blocks
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirBlock {
    pub id: BlockId,
    #[serde(default)]
    pub statements: Vec<HirStatement>,
    pub terminator: HirTerminator,
}

// ============================================================
// Places (Canonical Memory Projection)
// ============================================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HirPlace {
    Local(LocalId),

    Field { base: Box<HirPlace>, field: FieldId },

    Deref(Box<HirPlace>),
}

impl HirPlace {
    pub fn local(local: LocalId) -> Self {
        HirPlace::Local(local)
    }

    pub fn field(self, field: FieldId) -> Self {
        HirPlace::Field {
            base: Box::new(self),
            field,
        }
    }

    pub fn deref(self) -> Self {
        HirPlace::Deref(Box::new(self))
    }

    pub fn root_local(&self) -> LocalId {
        match self {
            HirPlace::Local(local) => *local,
            HirPlace::Field { base, .. } | HirPlace::Deref(base) => base.root_local(),
        }
    }

    /// The place this one projects from, if it is a projection.
    pub fn base(&self) -> Option<&HirPlace> {
        match self {
            HirPlace::Local(_) => None,
            HirPlace::Field { base, .. } | HirPlace::Deref(base) => Some(base),
        }
    }
}

// ============================================================
// Operands and values
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HirOperand {
    /// Read without invalidating the place.
    Copy(HirPlace),

    /// Read, then invalidate the place (a plain read for Copy types).
    Move(HirPlace),

    Const(ConstValue),

    /// Take a reference to a place.
    Borrow { place: HirPlace, mutable: bool },
}

impl HirOperand {
    pub fn place(&self) -> Option<&HirPlace> {
        match self {
            HirOperand::Copy(place) | HirOperand::Move(place) => Some(place),
            HirOperand::Borrow { place, .. } => Some(place),
            HirOperand::Const(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Int(i64),
    Bool(bool),

    /// A fresh resource carrying a payload so drops can be told apart.
    Resource(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HirRvalue {
    Use(HirOperand),

    Aggregate {
        ty: TypeId,
        fields: Vec<(FieldId, HirOperand)>,
    },
}

impl HirRvalue {
    pub fn operands(&self) -> Vec<&HirOperand> {
        match self {
            HirRvalue::Use(operand) => vec![operand],
            HirRvalue::Aggregate { fields, .. } => {
                fields.iter().map(|(_, operand)| operand).collect()
            }
        }
    }
}

// ============================================================
// Statements
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirStatement {
    pub id: HirNodeId,
    pub kind: HirStatementKind,
    #[serde(default)]
    pub location: TextLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HirStatementKind {
    Assign {
        target: HirPlace,
        value: HirRvalue,
    },

    /// `target = Owner::new(value)`, optionally passing constructor args.
    /// Elaborated in place when the owner's capability supports construction.
    Construct {
        target: HirPlace,
        ty: TypeId,
        #[serde(default)]
        args: Option<HirOperand>,
        value: HirRvalue,
    },

    Call {
        target: CallTarget,
        #[serde(default)]
        args: Vec<HirOperand>,
        #[serde(default)]
        result: Option<HirPlace>,
    },

    /// Hands a value to the outside world (tests and the interpreter watch these).
    Observe(HirOperand),

    /// Explicit scope-end drop of a local.
    Drop(LocalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTarget {
    Function(FunctionId),

    /// An explicit call to the generic deref capability (`Deref::deref(&x)`).
    /// Never treated as a place access, even on place-capable types.
    UserDeref { mutable: bool },
}

// ============================================================
// Terminators (Explicit Control Flow)
// ============================================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HirTerminator {
    Jump {
        target: BlockId,
    },

    If {
        condition: HirOperand,
        then_block: BlockId,
        else_block: BlockId,
    },

    Return {
        #[serde(default)]
        value: Option<HirOperand>,
    },

    Panic {
        #[serde(default)]
        message: Option<String>,
    },
}

impl HirTerminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            HirTerminator::Jump { target } => vec![*target],

            HirTerminator::If {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],

            HirTerminator::Return { .. } | HirTerminator::Panic { .. } => Vec::new(),
        }
    }
}
