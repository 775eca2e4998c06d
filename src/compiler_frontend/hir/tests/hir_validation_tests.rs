#![cfg(test)]

use crate::compiler_frontend::analysis::capabilities::Construction;
use crate::compiler_frontend::analysis::move_checker::tests::test_support::{
    build_module, cell_capabilities, cell_types, prepare, storage_capability,
};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorMetaDataKey, ErrorType};
use crate::compiler_frontend::hir::hir_builder::{
    HirModuleBuilder, borrow, copy, deref, field, int, local, mv, resource, value,
};
use crate::compiler_frontend::hir::hir_nodes::{
    DerefKind, FieldId, HirField, HirModule, TypeId, TypeKind,
};
use crate::compiler_frontend::hir::hir_validation::validate_type_declarations;

fn expect_malformed(module: &HirModule) -> CompilerError {
    let types = cell_types(&mut HirModuleBuilder::new());
    let result = prepare(module, &cell_capabilities(&types));

    let Err(mut errors) = result else {
        panic!("expected validation to fail");
    };

    assert_eq!(errors.len(), 1, "{errors:#?}");
    let error = errors.remove(0);
    assert_eq!(error.error_type, ErrorType::MalformedProgram, "{error:#?}");
    error
}

#[test]
fn accepts_a_well_formed_cell_program() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.local("c", t.cell);
        let r = f.local("r", t.text_mut);

        f.at_line(1).construct(local(c), t.cell, value(resource(5)));
        f.at_line(2).user_deref(local(c), true, local(r));
        f.at_line(3).observe(copy(deref(local(r))));
        f.at_line(4).drop_local(c);
        f.finish();
    });

    assert!(prepare(&module, &cell_capabilities(&types)).is_ok());
}

#[test]
fn rejects_deref_of_a_type_without_deref() {
    let (module, _) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let n = f.param("n", t.int);
        f.at_line(3).observe(copy(deref(local(n))));
        f.finish();
    });

    let error = expect_malformed(&module);
    assert!(error.msg.contains("can't be dereferenced"), "{}", error.msg);
    assert_eq!(error.metadata_value(ErrorMetaDataKey::TypeName), Some("Int"));
    assert_eq!(error.location.start_pos.line_number, 3);
}

#[test]
fn rejects_field_of_a_non_struct() {
    let (module, _) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.param("c", t.cell);
        f.observe(copy(field(local(c), 0)));
        f.finish();
    });

    let error = expect_malformed(&module);
    assert!(error.msg.contains("has no field"), "{}", error.msg);
}

#[test]
fn rejects_mismatched_assignment() {
    let (module, _) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let s = f.local("s", t.text);
        f.assign_operand(local(s), int(3));
        f.finish();
    });

    let error = expect_malformed(&module);
    assert_eq!(error.metadata_value(ErrorMetaDataKey::TypeName), Some("Str"));
}

#[test]
fn rejects_writes_through_a_shared_owner() {
    let mut builder = HirModuleBuilder::new();
    let types = cell_types(&mut builder);
    let shared = builder.owner_type("Rc", types.text, DerefKind::Shared);

    let mut f = builder.function("main");
    let rc = f.param("rc", shared);
    f.assign_operand(deref(local(rc)), resource(1));
    f.finish();

    let error = expect_malformed(&builder.finish());
    assert!(error.msg.contains("Can't write through a shared deref"), "{}", error.msg);
}

#[test]
fn rejects_explicit_deref_mut_on_a_shared_owner() {
    let mut builder = HirModuleBuilder::new();
    let types = cell_types(&mut builder);
    let shared = builder.owner_type("Rc", types.text, DerefKind::Shared);

    let mut f = builder.function("main");
    let rc = f.param("rc", shared);
    let r = f.local("r", types.text_mut);
    f.user_deref(local(rc), true, local(r));
    f.finish();

    let error = expect_malformed(&builder.finish());
    assert!(error.msg.contains("does not implement DerefMut"), "{}", error.msg);
}

#[test]
fn rejects_construct_missing_required_arguments() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.local("c", t.cell);
        f.construct(local(c), t.cell, value(resource(1)));
        f.finish();
    });

    let declarations = vec![storage_capability(
        types.cell,
        types.text,
        Some(Construction {
            args: Some(types.int),
        }),
    )];

    let Err(errors) = prepare(&module, &declarations) else {
        panic!("expected validation to fail");
    };

    assert_eq!(errors[0].error_type, ErrorType::MalformedProgram);
    assert!(errors[0].msg.contains("needs constructor arguments"), "{}", errors[0].msg);
}

#[test]
fn rejects_calls_with_the_wrong_argument_count() {
    let (module, _) = build_module(|builder, t| {
        let mut callee = builder.function("consume");
        callee.param("s", t.text);
        let callee_id = callee.finish();

        let mut f = builder.function("main");
        let s = f.param("s", t.text);
        f.call(callee_id, vec![mv(local(s)), borrow(local(s), false)], None);
        f.finish();
    });

    let error = expect_malformed(&module);
    assert!(error.msg.contains("takes 1 arguments but 2 were given"), "{}", error.msg);
}

#[test]
fn rejects_blocks_shared_between_functions() {
    let (mut module, _) = build_module(|builder, _| {
        builder.function("first").finish();
        builder.function("second").finish();
    });

    module.functions[1].entry = module.functions[0].entry;

    let error = expect_malformed(&module);
    assert!(error.msg.contains("more than one function"), "{}", error.msg);
}

#[test]
fn rejects_recursive_types() {
    let mut builder = HirModuleBuilder::new();
    builder.add_type(
        "Node",
        TypeKind::Struct {
            fields: vec![HirField {
                id: FieldId(0),
                name: String::from("next"),
                ty: TypeId(1),
            }],
        },
    );
    builder.add_type(
        "NodeBox",
        TypeKind::Owner {
            target: TypeId(0),
            deref: DerefKind::Mutable,
        },
    );

    let module = builder.finish();
    let error = validate_type_declarations(&module).expect_err("recursive types are rejected");

    assert_eq!(error.error_type, ErrorType::MalformedProgram);
    assert!(error.msg.contains("contains itself"), "{}", error.msg);
}

#[test]
fn rejects_duplicate_type_ids() {
    let mut builder = HirModuleBuilder::new();
    builder.int_type();
    let mut module = builder.finish();
    module.types.push(module.types[0].clone());

    let error = validate_type_declarations(&module).expect_err("duplicate ids are rejected");
    assert!(error.msg.contains("Duplicate type id"), "{}", error.msg);
}
