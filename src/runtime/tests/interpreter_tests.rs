#![cfg(test)]

use crate::backends::elaboration::abort_boundary::UnwindAction;
use crate::backends::lir::lir_nodes::{
    DropFlagId, ElaboratedModule, LirBlock, LirFunction, LirLocal, LirOperand, LirPlace,
    LirRvalue, LirStatement, LirTemp, LirTempType, LirTerminator, TempId,
};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorMetaDataKey, ErrorType};
use crate::compiler_frontend::hir::hir_nodes::{
    BlockId, ConstValue, DerefKind, FunctionId, HirType, LocalId, TypeId, TypeKind,
};
use crate::runtime::interpreter::{Interpreter, InterpreterHooks};
use crate::runtime::values::{Outcome, RunResult, RuntimeEvent, Value};

const STR: TypeId = TypeId(0);
const CELL: TypeId = TypeId(1);

fn types() -> Vec<HirType> {
    vec![
        HirType {
            id: STR,
            name: String::from("Str"),
            kind: TypeKind::Resource,
        },
        HirType {
            id: CELL,
            name: String::from("Cell"),
            kind: TypeKind::Owner {
                target: STR,
                deref: DerefKind::Mutable,
            },
        },
    ]
}

fn function(
    id: u32,
    name: &str,
    locals: &[TypeId],
    temps: &[LirTempType],
    blocks: Vec<LirBlock>,
) -> LirFunction {
    LirFunction {
        id: FunctionId(id),
        name: name.to_owned(),
        entry: blocks.first().map(|block| block.id).unwrap_or(BlockId(0)),
        params: Vec::new(),
        locals: locals
            .iter()
            .enumerate()
            .map(|(index, ty)| LirLocal {
                id: LocalId(index as u32),
                name: format!("l{index}"),
                ty: *ty,
            })
            .collect(),
        temps: temps
            .iter()
            .enumerate()
            .map(|(index, ty)| LirTemp {
                id: TempId(index as u32),
                ty: *ty,
            })
            .collect(),
        drop_flags: Vec::new(),
        return_type: None,
        blocks,
    }
}

fn block(id: u32, statements: Vec<LirStatement>, terminator: LirTerminator) -> LirBlock {
    LirBlock {
        id: BlockId(id),
        statements,
        terminator,
    }
}

fn module(functions: Vec<LirFunction>) -> ElaboratedModule {
    ElaboratedModule {
        types: types(),
        functions,
        ..ElaboratedModule::default()
    }
}

fn returns() -> LirTerminator {
    LirTerminator::Return { value: None }
}

fn local(index: u32) -> LirPlace {
    LirPlace::local(LocalId(index))
}

fn temp(index: u32) -> LirPlace {
    LirPlace::temp(TempId(index))
}

fn store_resource(dest: LirPlace, payload: i64) -> LirStatement {
    LirStatement::Assign {
        dest,
        value: LirRvalue::Use(LirOperand::Const(ConstValue::Resource(payload))),
    }
}

fn accessor(dest: u32, owner: LirPlace) -> LirStatement {
    LirStatement::CallAccessor {
        dest: TempId(dest),
        owner,
        accessor: String::from("storage"),
        unwind: UnwindAction::Abort,
    }
}

fn new_uninit(dest: LirPlace) -> LirStatement {
    LirStatement::NewUninit {
        dest,
        ty: CELL,
        args: None,
        unwind: UnwindAction::Abort,
    }
}

fn run(module: &ElaboratedModule, hooks: InterpreterHooks) -> Result<RunResult, CompilerError> {
    Interpreter::new(module, hooks).run("main", Vec::new())
}

fn expect_runtime_error(result: Result<RunResult, CompilerError>, fragment: &str) -> CompilerError {
    match result {
        Ok(result) => panic!("expected a runtime error, got {result:#?}"),
        Err(error) => {
            assert_eq!(error.error_type, ErrorType::Runtime, "{error:#?}");
            assert!(error.msg.contains(fragment), "unexpected message: {}", error.msg);
            assert_eq!(
                error.metadata_value(ErrorMetaDataKey::CompilationStage),
                Some("Runtime")
            );
            error
        }
    }
}

#[test]
fn well_formed_storage_round_trip_runs_cleanly() {
    let main = function(
        0,
        "main",
        &[CELL],
        &[LirTempType::RawMut(STR), LirTempType::RawMut(STR)],
        vec![block(
            0,
            vec![
                new_uninit(local(0)),
                accessor(0, local(0)),
                store_resource(temp(0).pointee(), 5),
                accessor(1, local(0)),
                LirStatement::DropInPlace {
                    place: temp(1).pointee(),
                    unwind: UnwindAction::Abort,
                },
                LirStatement::DropHusk {
                    place: local(0),
                    unwind: UnwindAction::Propagate,
                },
            ],
            returns(),
        )],
    );

    let result = run(&module(vec![main]), InterpreterHooks::default()).expect("clean run");

    assert_eq!(result.outcome, Outcome::Returned(None));
    assert_eq!(result.dropped_resources(), vec![5]);
    assert_eq!(result.storage_writes(), 1);
    assert_eq!(result.accessor_calls(), 2);
    assert_eq!(result.husk_drops(), 1);
}

#[test]
fn overwriting_a_live_value_is_reported() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![store_resource(local(0), 1), store_resource(local(0), 2)],
            returns(),
        )],
    );

    expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "without dropping it",
    );
}

#[test]
fn reading_a_moved_value_is_reported() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![
                store_resource(local(0), 1),
                LirStatement::Observe(LirOperand::Move(local(0))),
                LirStatement::Observe(LirOperand::Copy(local(0))),
            ],
            returns(),
        )],
    );

    expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "<moved>",
    );
}

#[test]
fn husk_drop_with_live_content_is_a_leak() {
    let main = function(
        0,
        "main",
        &[CELL],
        &[LirTempType::RawMut(STR)],
        vec![block(
            0,
            vec![
                new_uninit(local(0)),
                accessor(0, local(0)),
                store_resource(temp(0).pointee(), 5),
                LirStatement::DropHusk {
                    place: local(0),
                    unwind: UnwindAction::Propagate,
                },
            ],
            returns(),
        )],
    );

    expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "still holds resource(5)",
    );
}

#[test]
fn pointer_kept_across_a_relocating_accessor_dangles() {
    let main = function(
        0,
        "main",
        &[CELL],
        &[LirTempType::RawMut(STR), LirTempType::RawMut(STR)],
        vec![block(
            0,
            vec![
                new_uninit(local(0)),
                accessor(0, local(0)),
                store_resource(temp(0).pointee(), 5),
                accessor(1, local(0)),
                LirStatement::Observe(LirOperand::Copy(temp(0).pointee())),
            ],
            returns(),
        )],
    );

    let hooks = InterpreterHooks {
        relocate_on_access: true,
        ..InterpreterHooks::default()
    };

    expect_runtime_error(run(&module(vec![main]), hooks), "after it was released");
}

#[test]
fn flag_read_before_it_is_set_is_reported() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![LirStatement::IfDropFlag {
                flag: DropFlagId(0),
                body: vec![LirStatement::DropInPlace {
                    place: local(0),
                    unwind: UnwindAction::Propagate,
                }],
            }],
            returns(),
        )],
    );

    expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "flag0 read before it was ever set",
    );
}

#[test]
fn cleared_flag_skips_its_drop() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![
                store_resource(local(0), 1),
                LirStatement::SetDropFlag {
                    flag: DropFlagId(0),
                    value: true,
                },
                LirStatement::Observe(LirOperand::Move(local(0))),
                LirStatement::SetDropFlag {
                    flag: DropFlagId(0),
                    value: false,
                },
                LirStatement::IfDropFlag {
                    flag: DropFlagId(0),
                    body: vec![LirStatement::DropInPlace {
                        place: local(0),
                        unwind: UnwindAction::Propagate,
                    }],
                },
            ],
            returns(),
        )],
    );

    let result = run(&module(vec![main]), InterpreterHooks::default()).expect("clean run");
    assert!(result.dropped_resources().is_empty());
}

#[test]
fn endless_loop_hits_the_step_limit() {
    let main = function(
        0,
        "main",
        &[],
        &[],
        vec![block(0, Vec::new(), LirTerminator::Goto { target: BlockId(0) })],
    );

    let hooks = InterpreterHooks {
        max_steps: 50,
        ..InterpreterHooks::default()
    };

    expect_runtime_error(run(&module(vec![main]), hooks), "more than 50 steps");
}

#[test]
fn local_still_holding_a_resource_at_return_is_a_leak() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(0, vec![store_resource(local(0), 3)], returns())],
    );

    let error = expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "still holds resource(3)",
    );
    assert_eq!(error.metadata_value(ErrorMetaDataKey::VariableName), Some("_0"));
}

#[test]
fn storage_nobody_releases_is_reported_at_the_end() {
    let main = function(
        0,
        "main",
        &[CELL],
        &[],
        vec![block(
            0,
            vec![
                new_uninit(local(0)),
                // The owner escapes without its husk ever being dropped.
                LirStatement::Observe(LirOperand::Move(local(0))),
            ],
            returns(),
        )],
    );

    expect_runtime_error(
        run(&module(vec![main]), InterpreterHooks::default()),
        "slot0 of type 'Cell' was never released",
    );
}

#[test]
fn panic_ends_the_program_without_cleanup() {
    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![store_resource(local(0), 1)],
            LirTerminator::Panic {
                message: Some(String::from("boom")),
            },
        )],
    );

    let result = run(&module(vec![main]), InterpreterHooks::default()).expect("panic is an outcome");

    assert_eq!(
        result.outcome,
        Outcome::Panicked {
            message: Some(String::from("boom"))
        }
    );
    assert!(result.dropped_resources().is_empty());
}

#[test]
fn call_results_are_stored_and_callee_frames_are_checked() {
    let mut make = function(
        1,
        "make",
        &[STR],
        &[],
        vec![block(
            0,
            vec![store_resource(local(0), 21)],
            LirTerminator::Return {
                value: Some(LirOperand::Move(local(0))),
            },
        )],
    );
    make.return_type = Some(STR);

    let main = function(
        0,
        "main",
        &[STR],
        &[],
        vec![block(
            0,
            vec![
                LirStatement::Call {
                    function: FunctionId(1),
                    args: Vec::new(),
                    result: Some(local(0)),
                },
                LirStatement::DropInPlace {
                    place: local(0),
                    unwind: UnwindAction::Propagate,
                },
            ],
            returns(),
        )],
    );

    let result = run(&module(vec![main, make]), InterpreterHooks::default()).expect("clean run");
    assert_eq!(result.dropped_resources(), vec![21]);
}

#[test]
fn unknown_entry_is_a_runtime_error() {
    let main = function(0, "main", &[], &[], vec![block(0, Vec::new(), returns())]);
    let module = module(vec![main]);

    let result = Interpreter::new(&module, InterpreterHooks::default()).run("start", Vec::new());
    expect_runtime_error(result, "No function named 'start'");
}

#[test]
fn owned_storage_in_the_return_value_is_not_a_leak() {
    let mut main = function(
        0,
        "main",
        &[CELL],
        &[LirTempType::RawMut(STR)],
        vec![block(
            0,
            vec![
                new_uninit(local(0)),
                accessor(0, local(0)),
                store_resource(temp(0).pointee(), 2),
            ],
            LirTerminator::Return {
                value: Some(LirOperand::Move(local(0))),
            },
        )],
    );
    main.return_type = Some(CELL);

    let result = run(&module(vec![main]), InterpreterHooks::default()).expect("clean run");

    assert!(matches!(
        result.outcome,
        Outcome::Returned(Some(Value::Owner { ty: CELL, .. }))
    ));
    assert!(result
        .events
        .iter()
        .all(|event| !matches!(event, RuntimeEvent::ResourceDropped(_))));
}
