#![cfg(test)]

use crate::backends::elaboration::tests::test_support::{
    count_statements, elaborate_module, run_main,
};
use crate::backends::lir::lir_nodes::{LirOperand, LirStatement};
use crate::compiler_frontend::analysis::capabilities::Construction;
use crate::compiler_frontend::analysis::move_checker::tests::test_support::{
    build_module, cell_capabilities, storage_capability,
};
use crate::compiler_frontend::hir::hir_builder::{aggregate, int, local, resource, value};
use crate::compiler_frontend::hir::hir_nodes::{ConstValue, DerefKind, TypeId};
use crate::runtime::values::{Outcome, RuntimeEvent};

#[test]
fn constructible_capability_writes_the_value_once_into_storage() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.local("c", t.cell);

        f.at_line(1).construct(local(c), t.cell, value(resource(5)));
        f.at_line(2).drop_local(c);
        f.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    assert_eq!(elaborated.stats.in_place_constructions, 1);
    assert_eq!(elaborated.stats.temp_constructions, 0);

    let new_uninit = count_statements(&elaborated, "main", |statement| {
        matches!(statement, LirStatement::NewUninit { .. })
    });
    assert_eq!(new_uninit, 1);

    let result = run_main(&elaborated);
    assert_eq!(result.outcome, Outcome::Returned(None));
    assert_eq!(result.storage_writes(), 1);
    assert_eq!(result.storage_copies(), 0);
    assert_eq!(result.dropped_resources(), vec![5]);
}

#[test]
fn owner_without_construction_builds_in_a_temp_and_copies() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let pc = f.local("pc", t.pair_cell);

        f.at_line(1).construct(
            local(pc),
            t.pair_cell,
            aggregate(t.pair, vec![resource(1), resource(2)]),
        );
        f.at_line(2).drop_local(pc);
        f.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    assert_eq!(elaborated.stats.in_place_constructions, 0);
    assert_eq!(elaborated.stats.temp_constructions, 1);

    let alloc = count_statements(&elaborated, "main", |statement| {
        matches!(statement, LirStatement::AllocStorage { .. })
    });
    assert_eq!(alloc, 1);

    let result = run_main(&elaborated);
    assert_eq!(result.storage_writes(), 0);
    assert_eq!(result.storage_copies(), 1);
    assert_eq!(result.dropped_resources(), vec![1, 2]);
    assert_eq!(result.husk_drops(), 1);
}

#[test]
fn plain_owner_construction_falls_back_to_a_copy() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let b = f.local("b", t.boxed);

        f.at_line(1).construct(local(b), t.boxed, value(resource(3)));
        f.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    let result = run_main(&elaborated);

    assert_eq!(result.storage_copies(), 1);
    assert_eq!(result.storage_writes(), 0);
    assert_eq!(result.dropped_resources(), vec![3]);
}

#[test]
fn reconstructing_drops_the_previous_owner_first() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.local("c", t.cell);

        f.at_line(1).construct(local(c), t.cell, value(resource(1)));
        f.at_line(2).construct(local(c), t.cell, value(resource(2)));
        f.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    let result = run_main(&elaborated);

    assert_eq!(result.outcome, Outcome::Returned(None));
    assert_eq!(result.dropped_resources(), vec![1, 2]);
    assert_eq!(result.husk_drops(), 2);

    // The new value still goes straight into its own storage.
    assert_eq!(result.storage_writes(), 2);
    assert_eq!(result.storage_copies(), 0);
}

#[test]
fn constructor_arguments_reach_new_uninit() {
    let mut arena = TypeId(0);

    let (module, types) = build_module(|builder, t| {
        arena = builder.owner_type("Arena", t.text, DerefKind::Mutable);

        let mut f = builder.function("main");
        let a = f.local("a", arena);

        f.at_line(1)
            .construct_with_args(local(a), arena, int(64), value(resource(8)));
        f.finish();
    });

    let mut declarations = cell_capabilities(&types);
    declarations.push(storage_capability(
        arena,
        types.text,
        Some(Construction {
            args: Some(types.int),
        }),
    ));

    let elaborated = elaborate_module(&module, &declarations);

    let with_args = count_statements(&elaborated, "main", |statement| {
        matches!(
            statement,
            LirStatement::NewUninit {
                args: Some(LirOperand::Const(ConstValue::Int(64))),
                ..
            }
        )
    });
    assert_eq!(with_args, 1);

    let result = run_main(&elaborated);
    assert_eq!(result.storage_writes(), 1);
    assert_eq!(result.dropped_resources(), vec![8]);
    assert!(
        result
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::HuskDropped { ty, .. } if *ty == arena))
    );
}
