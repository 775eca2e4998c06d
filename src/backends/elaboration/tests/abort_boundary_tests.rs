#![cfg(test)]

use crate::backends::elaboration::abort_boundary::{
    AbortPolicy, KNOWN_POLICIES, PanicPolicy, SynthesizedSite, UnwindAction, policy_by_name,
    run_synthesized,
};
use crate::backends::elaboration::tests::test_support::{
    PropagatePolicy, elaborate_module, elaborate_with_policy, run_with,
};
use crate::compiler_frontend::analysis::move_checker::tests::test_support::{
    build_module, cell_capabilities,
};
use crate::compiler_frontend::hir::hir_builder::{copy, deref, local, resource, value};
use crate::runtime::interpreter::InterpreterHooks;
use crate::runtime::values::{Outcome, RuntimeEvent, Value};
use std::process::Command;

const CHILD_ENV: &str = "DEREFMOVE_ABORT_BOUNDARY_CHILD";

fn panicking_derefs() -> InterpreterHooks {
    InterpreterHooks {
        panicking_derefs: true,
        ..InterpreterHooks::default()
    }
}

#[test]
fn default_policy_aborts_at_every_synthesized_site() {
    let policy = AbortPolicy;

    for site in [
        SynthesizedSite::StorageAccessor,
        SynthesizedSite::ContentDrop,
        SynthesizedSite::NewUninit,
    ] {
        assert_eq!(policy.on_panic(site), UnwindAction::Abort);
    }
}

#[test]
fn policies_resolve_by_name() {
    for name in KNOWN_POLICIES {
        let policy = policy_by_name(name).expect("known policy");
        assert_eq!(policy.name(), *name);
    }

    assert!(policy_by_name("unwind-and-hope").is_none());
}

#[test]
fn panicking_accessor_aborts_but_explicit_deref_unwinds() {
    let (module, types) = build_module(|builder, t| {
        let mut synthesized = builder.function("synthesized");
        let c = synthesized.param("c", t.cell);
        synthesized.at_line(1).observe(copy(deref(local(c))));
        synthesized.finish();

        let mut explicit = builder.function("explicit");
        let c = explicit.param("c", t.cell);
        let r = explicit.local("r", t.text_mut);
        explicit.at_line(2).user_deref(local(c), true, local(r));
        explicit.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    let cell = types.cell;

    let synthesized = run_with(
        &elaborated,
        "synthesized",
        |interpreter| vec![interpreter.alloc_owner(cell, Value::Resource(1))],
        panicking_derefs(),
    );
    assert_eq!(
        synthesized.outcome,
        Outcome::Aborted {
            site: SynthesizedSite::StorageAccessor
        }
    );

    let explicit = run_with(
        &elaborated,
        "explicit",
        |interpreter| vec![interpreter.alloc_owner(cell, Value::Resource(1))],
        panicking_derefs(),
    );
    assert!(
        matches!(explicit.outcome, Outcome::Panicked { .. }),
        "{:?}",
        explicit.outcome
    );
    assert!(explicit
        .events
        .contains(&RuntimeEvent::UserDerefCalled { mutable: true }));
}

fn panicking_construction() -> InterpreterHooks {
    InterpreterHooks {
        panicking_new_uninit: true,
        panicking_derefs: true,
        ..InterpreterHooks::default()
    }
}

#[test]
fn panicking_new_uninit_aborts_but_explicit_deref_unwinds() {
    let (module, types) = build_module(|builder, t| {
        let mut construct = builder.function("construct");
        let c = construct.local("c", t.cell);
        construct.at_line(1).construct(local(c), t.cell, value(resource(5)));
        construct.at_line(2).drop_local(c);
        construct.finish();

        let mut explicit = builder.function("explicit");
        let c = explicit.param("c", t.cell);
        let r = explicit.local("r", t.text_mut);
        explicit.at_line(3).user_deref(local(c), true, local(r));
        explicit.finish();
    });

    let elaborated = elaborate_module(&module, &cell_capabilities(&types));
    assert_eq!(elaborated.stats.in_place_constructions, 1);
    let cell = types.cell;

    let constructed = run_with(&elaborated, "construct", |_| Vec::new(), panicking_construction());
    assert_eq!(
        constructed.outcome,
        Outcome::Aborted {
            site: SynthesizedSite::NewUninit
        }
    );
    assert_eq!(constructed.accessor_calls(), 0);
    assert!(constructed.dropped_resources().is_empty());

    let explicit = run_with(
        &elaborated,
        "explicit",
        |interpreter| vec![interpreter.alloc_owner(cell, Value::Resource(1))],
        panicking_construction(),
    );
    assert!(
        matches!(explicit.outcome, Outcome::Panicked { .. }),
        "{:?}",
        explicit.outcome
    );
}

#[test]
fn a_propagating_policy_would_unwind_out_of_new_uninit() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.local("c", t.cell);
        f.at_line(1).construct(local(c), t.cell, value(resource(5)));
        f.at_line(2).drop_local(c);
        f.finish();
    });

    let elaborated =
        elaborate_with_policy(&module, &cell_capabilities(&types), &PropagatePolicy);

    let hooks = InterpreterHooks {
        panicking_new_uninit: true,
        ..InterpreterHooks::default()
    };
    let result = run_with(&elaborated, "main", |_| Vec::new(), hooks);

    assert_eq!(
        result.outcome,
        Outcome::Panicked {
            message: Some(String::from("new_uninit for 'Cell' panicked"))
        }
    );
}

#[test]
fn a_propagating_policy_would_unwind_out_of_the_accessor() {
    let (module, types) = build_module(|builder, t| {
        let mut f = builder.function("main");
        let c = f.param("c", t.cell);
        f.at_line(1).observe(copy(deref(local(c))));
        f.finish();
    });

    let elaborated =
        elaborate_with_policy(&module, &cell_capabilities(&types), &PropagatePolicy);
    let cell = types.cell;

    let result = run_with(
        &elaborated,
        "main",
        |interpreter| vec![interpreter.alloc_owner(cell, Value::Resource(1))],
        panicking_derefs(),
    );

    assert!(matches!(result.outcome, Outcome::Panicked { .. }));
}

#[test]
fn synthesized_call_returns_what_it_computes() {
    assert_eq!(run_synthesized(|| 40 + 2), 42);

    // A panic caught inside the call never reaches the boundary.
    let caught = run_synthesized(|| std::panic::catch_unwind::<_, ()>(|| panic!("inner")).is_err());
    assert!(caught);
}

/// Re-runs itself in a child process where a panic escapes a synthesized call.
#[test]
fn panic_escaping_a_synthesized_call_aborts_the_process() {
    if std::env::var_os(CHILD_ENV).is_some() {
        run_synthesized::<()>(|| panic!("storage accessor panicked"));
        return;
    }

    let exe = std::env::current_exe().expect("test binary path");
    let output = Command::new(exe)
        .args([
            "--exact",
            "backends::elaboration::tests::abort_boundary_tests::panic_escaping_a_synthesized_call_aborts_the_process",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CHILD_ENV, "1")
        .output()
        .expect("spawn child test process");

    assert!(!output.status.success());

    // A failed test exits with 101. An abort never gets that far.
    assert_ne!(output.status.code(), Some(101), "{output:?}");

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "{output:?}");
    }
}
