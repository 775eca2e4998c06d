use crate::backends::elaboration::abort_boundary::SynthesizedSite;
use crate::backends::lir::lir_nodes::TempId;
use crate::compiler_frontend::hir::hir_nodes::{ConstValue, FieldId, LocalId, TypeId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Never written.
    Uninit,

    /// Moved out of. Reading it is a bug in elaboration.
    Moved,

    Int(i64),
    Bool(bool),
    Resource(i64),

    Struct {
        ty: TypeId,
        fields: Vec<(FieldId, Value)>,
    },

    /// A handle to heap storage. The content lives in the slot.
    Owner {
        slot: SlotId,
        ty: TypeId,
    },

    /// References and raw pointers alike.
    Pointer(Location),
}

impl Value {
    pub fn from_const(value: ConstValue) -> Self {
        match value {
            ConstValue::Int(value) => Value::Int(value),
            ConstValue::Bool(value) => Value::Bool(value),
            ConstValue::Resource(payload) => Value::Resource(payload),
        }
    }

    /// False for uninitialized and moved-out values, or structs with such a part.
    pub fn is_whole(&self) -> bool {
        match self {
            Value::Uninit | Value::Moved => false,
            Value::Struct { fields, .. } => fields.iter().all(|(_, field)| field.is_whole()),
            _ => true,
        }
    }

    /// True when dropping or forgetting this value matters.
    pub fn holds_resources(&self) -> bool {
        match self {
            Value::Resource(_) | Value::Owner { .. } => true,
            Value::Struct { fields, .. } => fields.iter().any(|(_, field)| field.holds_resources()),
            _ => false,
        }
    }

    pub fn field(&self, field: FieldId) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => fields
                .iter()
                .find(|(id, _)| *id == field)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, field: FieldId) -> Option<&mut Value> {
        match self {
            Value::Struct { fields, .. } => fields
                .iter_mut()
                .find(|(id, _)| *id == field)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uninit => write!(f, "<uninit>"),
            Value::Moved => write!(f, "<moved>"),
            Value::Int(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Resource(payload) => write!(f, "resource({})", payload),
            Value::Struct { ty, fields } => {
                write!(f, "{} {{ ", ty)?;
                for (index, (field, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field, value)?;
                }
                write!(f, " }}")
            }
            Value::Owner { slot, .. } => write!(f, "owner({})", slot),
            Value::Pointer(location) => write!(f, "&{}", location),
        }
    }
}

// ============================================================
// Locations
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Root {
    Local { frame: usize, local: LocalId },
    Temp { frame: usize, temp: TempId },
    Slot(SlotId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub root: Root,
    pub fields: Vec<FieldId>,
}

impl Location {
    pub fn new(root: Root) -> Self {
        Location {
            root,
            fields: Vec::new(),
        }
    }

    pub fn slot(&self) -> Option<SlotId> {
        match self.root {
            Root::Slot(slot) => Some(slot),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Root::Local { frame, local } => write!(f, "frame{}.{}", frame, local)?,
            Root::Temp { frame, temp } => write!(f, "frame{}.{}", frame, temp)?,
            Root::Slot(slot) => write!(f, "{}", slot)?,
        }

        for field in &self.fields {
            write!(f, ".{}", field)?;
        }

        Ok(())
    }
}

// ============================================================
// What a run looked like from the outside
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEvent {
    Observed(Value),
    ResourceDropped(i64),
    HuskDropped { ty: TypeId, slot: SlotId },
    AccessorCalled { ty: TypeId, slot: SlotId },

    /// A store whose destination is owner storage.
    StorageWrite { slot: SlotId },

    /// Storage allocated from a value built elsewhere.
    StorageCopy { slot: SlotId },

    UserDerefCalled { mutable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Returned(Option<Value>),

    /// A recoverable failure reached the top of the program.
    Panicked { message: Option<String> },

    /// The process would have terminated at a compiler-synthesized call.
    Aborted { site: SynthesizedSite },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outcome: Outcome,
    pub events: Vec<RuntimeEvent>,
    pub steps: usize,
}

impl RunResult {
    pub fn observed(&self) -> Vec<&Value> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RuntimeEvent::Observed(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn dropped_resources(&self) -> Vec<i64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RuntimeEvent::ResourceDropped(payload) => Some(*payload),
                _ => None,
            })
            .collect()
    }

    pub fn storage_writes(&self) -> usize {
        self.count(|event| matches!(event, RuntimeEvent::StorageWrite { .. }))
    }

    pub fn storage_copies(&self) -> usize {
        self.count(|event| matches!(event, RuntimeEvent::StorageCopy { .. }))
    }

    pub fn husk_drops(&self) -> usize {
        self.count(|event| matches!(event, RuntimeEvent::HuskDropped { .. }))
    }

    pub fn accessor_calls(&self) -> usize {
        self.count(|event| matches!(event, RuntimeEvent::AccessorCalled { .. }))
    }

    fn count(&self, predicate: impl Fn(&RuntimeEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}
