//! Place capabilities.
//!
//! A type opts into place semantics by registering a capability: its deref
//! content is then tracked by move analysis like a local, and reached through
//! the storage accessor after elaboration.

mod contract;
mod registry;

pub use registry::{
    AccessorReceiver, AccessorReturn, CapabilityDeclaration, CapabilityRegistry,
    CapabilityRegistryBuilder, Construction, PlaceCapability, StorageAccessor,
};

use crate::compiler_frontend::compiler_errors::CompilerError;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::timer_log;
use std::path::Path;
use std::time::Instant;

/// Registers every declaration of a compilation unit, then freezes the registry.
///
/// Every declaration is tried, so all registration errors of the unit are
/// reported together. No registry is returned if any of them failed.
pub fn register_capabilities(
    declarations: &[CapabilityDeclaration],
    types: &TypeContext,
    source_path: &Path,
) -> Result<CapabilityRegistry, Vec<CompilerError>> {
    let time = Instant::now();
    let mut builder = CapabilityRegistryBuilder::new();
    let mut errors = Vec::new();

    for declaration in declarations {
        if let Err(error) = builder.register(
            types,
            declaration.to_capability(),
            declaration.location.to_error_location(source_path),
        ) {
            errors.push(error);
        }
    }

    timer_log!(time, "Capabilities registered in: ");

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests;
