//! Accessor signature checks.
//!
//! The registry only knows a capability was declared. Before move analysis
//! trusts any of them, every accessor has to have the one shape the
//! elaborator can lower: `fn(&mut self) -> *mut Target`, where `Target` is
//! what the type's DerefMut already resolves to.

use crate::compiler_frontend::analysis::capabilities::registry::{
    AccessorReceiver, AccessorReturn, CapabilityRegistry, PlaceCapability, StorageAccessor,
};
use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{TypeId, TypeKind};
use crate::{capability_log, create_error};

impl CapabilityRegistry {
    /// Checks every registered accessor. All violations are reported, not just the first.
    pub fn validate_contracts(&self, types: &TypeContext) -> Result<(), Vec<CompilerError>> {
        let mut errors = Vec::new();

        for capability in self.iter() {
            if let Err(error) = self.validate_capability(types, capability) {
                errors.push(error);
            }
        }

        if errors.is_empty() {
            capability_log!(Green "[Capability] ", self.len(), " contract(s) validated");
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_capability(
        &self,
        types: &TypeContext,
        capability: &PlaceCapability,
    ) -> Result<(), CompilerError> {
        let type_name = types.name(capability.ty);

        let Some(TypeKind::Owner {
            target: owner_target,
            ..
        }) = types.kind(capability.ty)
        else {
            return Err(self.unsound(
                types,
                capability,
                format!("'{}' is not an owner type", type_name),
            ));
        };

        if capability.target != *owner_target {
            return Err(self.unsound(
                types,
                capability,
                format!(
                    "'{}' dereferences to '{}' but its place capability targets '{}'",
                    type_name,
                    types.name(*owner_target),
                    types.name(capability.target)
                ),
            ));
        }

        if capability.accessor.receiver != AccessorReceiver::MutRef {
            return Err(self.unsound(
                types,
                capability,
                format!(
                    "Storage accessor '{}' of '{}' must take '&mut self'",
                    capability.accessor.name, type_name
                ),
            ));
        }

        match capability.accessor.returns {
            AccessorReturn::RawMut(returned) if returned == capability.target => Ok(()),
            AccessorReturn::RawMut(returned) => Err(self.unsound(
                types,
                capability,
                format!(
                    "Storage accessor '{}' of '{}' returns '*mut {}', but the target is '{}'",
                    capability.accessor.name,
                    type_name,
                    types.name(returned),
                    types.name(capability.target)
                ),
            )),
            _ => Err(self.unsound(
                types,
                capability,
                format!(
                    "Storage accessor '{}' of '{}' must return a raw mutable pointer to its target",
                    capability.accessor.name, type_name
                ),
            )),
        }
    }

    fn unsound(
        &self,
        types: &TypeContext,
        capability: &PlaceCapability,
        msg: String,
    ) -> CompilerError {
        create_error!(
            UnsoundCapability,
            msg,
            self.location(capability.ty),
            {
                CompilationStage => "Capability Contract Validation",
                TypeName => types.name(capability.ty),
                ExpectedSignature => display_signature(types, &expected_accessor(capability)),
                FoundSignature => display_signature(types, &capability.accessor),
                PrimarySuggestion => "Storage accessors must have the signature 'fn(&mut self) -> *mut Target'",
            }
        )
    }
}

fn expected_accessor(capability: &PlaceCapability) -> StorageAccessor {
    StorageAccessor {
        name: capability.accessor.name.to_owned(),
        receiver: AccessorReceiver::MutRef,
        returns: AccessorReturn::RawMut(capability.target),
    }
}

/// Same shape as `StorageAccessor`'s Display, with type names instead of ids.
fn display_signature(types: &TypeContext, accessor: &StorageAccessor) -> String {
    let receiver = match accessor.receiver {
        AccessorReceiver::Owned => "self",
        AccessorReceiver::SharedRef => "&self",
        AccessorReceiver::MutRef => "&mut self",
    };

    let returns = |ty: TypeId| types.name(ty);
    let returns = match accessor.returns {
        AccessorReturn::RawMut(ty) => format!("*mut {}", returns(ty)),
        AccessorReturn::RawConst(ty) => format!("*const {}", returns(ty)),
        AccessorReturn::Value(ty) => returns(ty),
    };

    format!("fn {}({}) -> {}", accessor.name, receiver, returns)
}
