#![cfg(test)]

use crate::compiler_frontend::analysis::capabilities::{
    AccessorReceiver, AccessorReturn, CapabilityDeclaration, CapabilityRegistryBuilder,
    Construction, PlaceCapability, StorageAccessor, register_capabilities,
};
use crate::compiler_frontend::compiler_errors::{ErrorLocation, ErrorMetaDataKey, ErrorType};
use crate::compiler_frontend::hir::hir_builder::HirModuleBuilder;
use crate::compiler_frontend::hir::hir_datatypes::TypeContext;
use crate::compiler_frontend::hir::hir_nodes::{DerefKind, HirModule, TextLocation, TypeId};
use std::path::Path;

struct Types {
    module: HirModule,
    int: TypeId,
    resource: TypeId,
    cell: TypeId,
    shared_only: TypeId,
    no_deref: TypeId,
}

fn types() -> Types {
    let mut builder = HirModuleBuilder::new();
    let int = builder.int_type();
    let resource = builder.resource_type("Str");
    let cell = builder.owner_type("Cell", resource, DerefKind::Mutable);
    let shared_only = builder.owner_type("Rc", resource, DerefKind::Shared);
    let no_deref = builder.owner_type("Opaque", resource, DerefKind::None);

    Types {
        module: builder.finish(),
        int,
        resource,
        cell,
        shared_only,
        no_deref,
    }
}

fn capability(ty: TypeId, target: TypeId) -> PlaceCapability {
    PlaceCapability {
        ty,
        target,
        accessor: StorageAccessor {
            name: String::from("storage"),
            receiver: AccessorReceiver::MutRef,
            returns: AccessorReturn::RawMut(target),
        },
        construction: None,
    }
}

#[test]
fn registers_and_looks_up_capability() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let mut builder = CapabilityRegistryBuilder::new();

    builder
        .register(
            &context,
            capability(types.cell, types.resource),
            ErrorLocation::default(),
        )
        .expect("registration should succeed");

    assert!(builder.lookup(types.cell).is_some());

    let registry = builder.finish();
    let found = registry
        .lookup(types.cell)
        .expect("capability should be registered");
    assert_eq!(found.target, types.resource);
    assert!(!found.supports_construction());
    assert!(registry.lookup(types.resource).is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn rejects_type_without_deref_mut() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let mut builder = CapabilityRegistryBuilder::new();

    for ty in [types.shared_only, types.no_deref, types.int] {
        let error = builder
            .register(
                &context,
                capability(ty, types.resource),
                ErrorLocation::default(),
            )
            .expect_err("registration should fail");

        assert_eq!(error.error_type, ErrorType::MissingDerefMut);
        assert_eq!(
            error.metadata_value(ErrorMetaDataKey::TypeName),
            Some(context.name(ty).as_str())
        );
    }

    assert!(builder.finish().is_empty());
}

#[test]
fn rejects_second_capability_with_different_target() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let mut builder = CapabilityRegistryBuilder::new();

    builder
        .register(
            &context,
            capability(types.cell, types.resource),
            ErrorLocation::default(),
        )
        .expect("first registration should succeed");

    let error = builder
        .register(
            &context,
            capability(types.cell, types.int),
            ErrorLocation::default(),
        )
        .expect_err("second registration should fail");

    assert_eq!(error.error_type, ErrorType::DuplicateCapability);
    assert_eq!(
        error.metadata_value(ErrorMetaDataKey::ExistingTarget),
        Some("Str")
    );
    assert_eq!(
        error.metadata_value(ErrorMetaDataKey::RequestedTarget),
        Some("Int")
    );

    // The first record survives the failed registration.
    let registry = builder.finish();
    assert_eq!(
        registry.lookup(types.cell).map(|found| found.target),
        Some(types.resource)
    );
}

#[test]
fn identical_registration_is_a_no_op() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let mut builder = CapabilityRegistryBuilder::new();

    for _ in 0..2 {
        builder
            .register(
                &context,
                capability(types.cell, types.resource),
                ErrorLocation::default(),
            )
            .expect("identical registration should succeed");
    }

    assert_eq!(builder.finish().len(), 1);
}

#[test]
fn conflicting_registration_with_same_target_is_rejected() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let mut builder = CapabilityRegistryBuilder::new();

    builder
        .register(
            &context,
            capability(types.cell, types.resource),
            ErrorLocation::default(),
        )
        .expect("first registration should succeed");

    let mut constructible = capability(types.cell, types.resource);
    constructible.construction = Some(Construction::default());

    let error = builder
        .register(&context, constructible, ErrorLocation::default())
        .expect_err("conflicting registration should fail");
    assert_eq!(error.error_type, ErrorType::DuplicateCapability);
}

#[test]
fn register_capabilities_reports_declaration_location() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let declaration = CapabilityDeclaration {
        ty: types.shared_only,
        target: types.resource,
        accessor: capability(types.shared_only, types.resource).accessor,
        construction: None,
        location: TextLocation::new_just_line(12),
    };

    let errors = register_capabilities(&[declaration], &context, Path::new("cells.json"))
        .expect_err("registration should fail");

    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.error_type, ErrorType::MissingDerefMut);
    assert_eq!(error.location.start_pos.line_number, 12);
    assert_eq!(error.location.scope, Path::new("cells.json"));
}

#[test]
fn registry_iterates_in_registration_order() {
    let mut builder = HirModuleBuilder::new();
    let resource = builder.resource_type("Str");
    let second = builder.owner_type("Second", resource, DerefKind::Mutable);
    let first = builder.owner_type("First", resource, DerefKind::Mutable);
    let module = builder.finish();
    let context = TypeContext::new(&module.types);

    let declarations = [second, first]
        .into_iter()
        .map(|ty| CapabilityDeclaration {
            ty,
            target: resource,
            accessor: capability(ty, resource).accessor,
            construction: None,
            location: TextLocation::default(),
        })
        .collect::<Vec<_>>();

    let registry = register_capabilities(&declarations, &context, Path::new(""))
        .expect("registration should succeed");

    let order = registry
        .iter()
        .map(|capability| capability.ty)
        .collect::<Vec<_>>();
    assert_eq!(order, vec![second, first]);
}

#[test]
fn register_capabilities_reports_every_bad_declaration() {
    let types = types();
    let context = TypeContext::new(&types.module.types);
    let declarations = [
        (types.shared_only, 3),
        (types.cell, 4),
        (types.no_deref, 5),
    ]
    .into_iter()
    .map(|(ty, line)| CapabilityDeclaration {
        ty,
        target: types.resource,
        accessor: capability(ty, types.resource).accessor,
        construction: None,
        location: TextLocation::new_just_line(line),
    })
    .collect::<Vec<_>>();

    let errors = register_capabilities(&declarations, &context, Path::new("cells.json"))
        .expect_err("registration should fail");

    let lines = errors
        .iter()
        .map(|error| (error.error_type, error.location.start_pos.line_number))
        .collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![(ErrorType::MissingDerefMut, 3), (ErrorType::MissingDerefMut, 5)]
    );
}
