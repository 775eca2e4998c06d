use crate::capability_log;
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorLocation};
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{DerefKind, TextLocation, TypeId, TypeKind};
use crate::return_capability_error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ======================================================
//                  CAPABILITY RECORDS
// ======================================================

/// The function a place-capable type exposes to reach its content storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageAccessor {
    pub name: String,
    pub receiver: AccessorReceiver,
    pub returns: AccessorReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorReceiver {
    Owned,
    SharedRef,
    MutRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorReturn {
    RawMut(TypeId),
    RawConst(TypeId),
    Value(TypeId),
}

impl fmt::Display for StorageAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let receiver = match self.receiver {
            AccessorReceiver::Owned => "self",
            AccessorReceiver::SharedRef => "&self",
            AccessorReceiver::MutRef => "&mut self",
        };

        let returns = match self.returns {
            AccessorReturn::RawMut(ty) => format!("*mut {}", ty),
            AccessorReturn::RawConst(ty) => format!("*const {}", ty),
            AccessorReturn::Value(ty) => format!("{}", ty),
        };

        write!(f, "fn {}({}) -> {}", self.name, receiver, returns)
    }
}

/// Present when the type can hand out uninitialized storage for in-place construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Construction {
    /// Extra arguments `new_uninit` takes (a capacity, an allocator handle).
    #[serde(default)]
    pub args: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceCapability {
    pub ty: TypeId,
    pub target: TypeId,
    pub accessor: StorageAccessor,
    #[serde(default)]
    pub construction: Option<Construction>,
}

impl PlaceCapability {
    pub fn supports_construction(&self) -> bool {
        self.construction.is_some()
    }

    pub fn constructor_args_type(&self) -> Option<TypeId> {
        self.construction.and_then(|construction| construction.args)
    }
}

/// A capability as written in a program file, with the source location of its impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    pub ty: TypeId,
    pub target: TypeId,
    pub accessor: StorageAccessor,
    #[serde(default)]
    pub construction: Option<Construction>,
    #[serde(default)]
    pub location: TextLocation,
}

impl CapabilityDeclaration {
    pub fn to_capability(&self) -> PlaceCapability {
        PlaceCapability {
            ty: self.ty,
            target: self.target,
            accessor: self.accessor.clone(),
            construction: self.construction,
        }
    }
}

// ======================================================
//                    WRITE PHASE
// ======================================================

/// Collects capabilities while a compilation unit is being set up.
#[derive(Debug, Default)]
pub struct CapabilityRegistryBuilder {
    capabilities: FxHashMap<TypeId, PlaceCapability>,
    locations: FxHashMap<TypeId, ErrorLocation>,
    order: Vec<TypeId>,
}

impl CapabilityRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        types: &TypeContext,
        capability: PlaceCapability,
        location: ErrorLocation,
    ) -> Result<(), CompilerError> {
        let type_name = types.name(capability.ty);

        // Place semantics extend DerefMut, so the generic capability must already be there.
        match types.kind(capability.ty) {
            Some(TypeKind::Owner {
                deref: DerefKind::Mutable,
                ..
            }) => {}

            Some(TypeKind::Owner { deref, .. }) => {
                let found = match deref {
                    DerefKind::Shared => "Deref only",
                    _ => "no Deref impl",
                };

                return_capability_error!(
                    MissingDerefMut,
                    format!(
                        "'{}' must implement DerefMut before it can register a place capability",
                        type_name
                    ),
                    location,
                    {
                        TypeName => type_name,
                        FoundSignature => found,
                        PrimarySuggestion => "Implement DerefMut for this type first",
                    }
                );
            }

            _ => {
                return_capability_error!(
                    MissingDerefMut,
                    format!(
                        "'{}' is not a dereferenceable owner type, so it can't register a place capability",
                        type_name
                    ),
                    location,
                    {
                        TypeName => type_name,
                        PrimarySuggestion => "Place capabilities can only be implemented for owner types that implement DerefMut",
                    }
                );
            }
        }

        if let Some(existing) = self.capabilities.get(&capability.ty) {
            if existing == &capability {
                capability_log!(Dark Yellow "[Capability] duplicate registration ignored for ", type_name);
                return Ok(());
            }

            let existing_target = types.name(existing.target);
            let requested_target = types.name(capability.target);
            let msg = if existing.target != capability.target {
                format!(
                    "'{}' already has a place capability targeting '{}', it can't also target '{}'",
                    type_name, existing_target, requested_target
                )
            } else {
                format!(
                    "'{}' already has a different place capability registered",
                    type_name
                )
            };

            return_capability_error!(
                DuplicateCapability,
                msg,
                location,
                {
                    TypeName => type_name,
                    ExistingTarget => existing_target,
                    RequestedTarget => requested_target,
                    PrimarySuggestion => "A type can register at most one place capability",
                }
            );
        }

        capability_log!(
            Green "[Capability] registered ",
            Bold type_name,
            " -> ",
            types.name(capability.target)
        );

        self.order.push(capability.ty);
        self.locations.insert(capability.ty, location);
        self.capabilities.insert(capability.ty, capability);
        Ok(())
    }

    pub fn lookup(&self, ty: TypeId) -> Option<&PlaceCapability> {
        self.capabilities.get(&ty)
    }

    /// Ends the write phase. The registry is read-only from here on.
    pub fn finish(self) -> CapabilityRegistry {
        CapabilityRegistry {
            capabilities: self.capabilities,
            locations: self.locations,
            order: self.order,
        }
    }
}

// ======================================================
//                     READ PHASE
// ======================================================

/// Immutable lookup table from type identity to its place capability.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: FxHashMap<TypeId, PlaceCapability>,
    locations: FxHashMap<TypeId, ErrorLocation>,
    order: Vec<TypeId>,
}

impl CapabilityRegistry {
    /// A registry with nothing registered, for units that declare no capabilities.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, ty: TypeId) -> Option<&PlaceCapability> {
        self.capabilities.get(&ty)
    }

    pub fn has_capability(&self, ty: TypeId) -> bool {
        self.capabilities.contains_key(&ty)
    }

    /// Capabilities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PlaceCapability> {
        self.order
            .iter()
            .filter_map(|ty| self.capabilities.get(ty))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn location(&self, ty: TypeId) -> ErrorLocation {
        self.locations.get(&ty).cloned().unwrap_or_default()
    }
}
