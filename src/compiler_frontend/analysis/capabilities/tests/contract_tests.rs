#![cfg(test)]

use crate::compiler_frontend::analysis::capabilities::{
    AccessorReceiver, AccessorReturn, CapabilityRegistry, CapabilityRegistryBuilder,
    PlaceCapability, StorageAccessor,
};
use crate::compiler_frontend::compiler_errors::{ErrorLocation, ErrorMetaDataKey, ErrorType};
use crate::compiler_frontend::hir::hir_builder::HirModuleBuilder;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{DerefKind, HirModule, TypeId};

fn cell_module() -> (HirModule, TypeId, TypeId, TypeId) {
    let mut builder = HirModuleBuilder::new();
    let int = builder.int_type();
    let resource = builder.resource_type("Str");
    let cell = builder.owner_type("Cell", resource, DerefKind::Mutable);
    (builder.finish(), int, resource, cell)
}

fn registry_with(
    context: &TypeContext,
    cell: TypeId,
    target: TypeId,
    receiver: AccessorReceiver,
    returns: AccessorReturn,
) -> CapabilityRegistry {
    let mut builder = CapabilityRegistryBuilder::new();
    builder
        .register(
            context,
            PlaceCapability {
                ty: cell,
                target,
                accessor: StorageAccessor {
                    name: String::from("storage"),
                    receiver,
                    returns,
                },
                construction: None,
            },
            ErrorLocation::default(),
        )
        .expect("registration should succeed");
    builder.finish()
}

#[test]
fn accepts_mut_ref_to_raw_mut_target() {
    let (module, _, resource, cell) = cell_module();
    let context = TypeContext::new(&module.types);
    let registry = registry_with(
        &context,
        cell,
        resource,
        AccessorReceiver::MutRef,
        AccessorReturn::RawMut(resource),
    );

    assert!(registry.validate_contracts(&context).is_ok());
}

#[test]
fn empty_registry_is_always_valid() {
    let (module, ..) = cell_module();
    let context = TypeContext::new(&module.types);

    assert!(CapabilityRegistry::empty().validate_contracts(&context).is_ok());
}

#[test]
fn rejects_wrong_receiver() {
    let (module, _, resource, cell) = cell_module();
    let context = TypeContext::new(&module.types);

    for receiver in [AccessorReceiver::Owned, AccessorReceiver::SharedRef] {
        let registry = registry_with(
            &context,
            cell,
            resource,
            receiver,
            AccessorReturn::RawMut(resource),
        );

        let errors = registry
            .validate_contracts(&context)
            .expect_err("contract should be rejected");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ErrorType::UnsoundCapability);
        assert_eq!(
            errors[0].metadata_value(ErrorMetaDataKey::ExpectedSignature),
            Some("fn storage(&mut self) -> *mut Str")
        );
    }
}

#[test]
fn rejects_non_raw_mut_return() {
    let (module, _, resource, cell) = cell_module();
    let context = TypeContext::new(&module.types);

    for returns in [
        AccessorReturn::RawConst(resource),
        AccessorReturn::Value(resource),
    ] {
        let registry = registry_with(&context, cell, resource, AccessorReceiver::MutRef, returns);

        let errors = registry
            .validate_contracts(&context)
            .expect_err("contract should be rejected");
        assert_eq!(errors[0].error_type, ErrorType::UnsoundCapability);
    }
}

#[test]
fn rejects_pointer_to_wrong_type() {
    let (module, int, resource, cell) = cell_module();
    let context = TypeContext::new(&module.types);
    let registry = registry_with(
        &context,
        cell,
        resource,
        AccessorReceiver::MutRef,
        AccessorReturn::RawMut(int),
    );

    let errors = registry
        .validate_contracts(&context)
        .expect_err("contract should be rejected");
    assert_eq!(
        errors[0].metadata_value(ErrorMetaDataKey::FoundSignature),
        Some("fn storage(&mut self) -> *mut Int")
    );
}

#[test]
fn rejects_target_that_disagrees_with_deref_target() {
    let (module, int, _, cell) = cell_module();
    let context = TypeContext::new(&module.types);
    let registry = registry_with(
        &context,
        cell,
        int,
        AccessorReceiver::MutRef,
        AccessorReturn::RawMut(int),
    );

    let errors = registry
        .validate_contracts(&context)
        .expect_err("contract should be rejected");
    assert_eq!(errors[0].error_type, ErrorType::UnsoundCapability);
    assert!(errors[0].msg.contains("dereferences to 'Str'"));
}
