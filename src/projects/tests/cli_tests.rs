//! Tests for CLI command parsing and the check, elaborate and run workflows.

use super::{CliOptions, Command, elaborate_file, get_command, get_options, run_file};
use crate::build_system::core_build::{collect_messages, compile_programs};
use crate::compiler_frontend::Flag;
use crate::compiler_frontend::compiler_errors::{CompilerMessages, ErrorType};
use crate::projects::test_programs::{
    cell_program, use_after_move_program, write_file, write_json_program,
};
use crate::runtime::values::{Outcome, RunResult, Value};
use std::path::PathBuf;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn expect_run(result: Result<RunResult, CompilerMessages>) -> RunResult {
    match result {
        Ok(result) => result,
        Err(messages) => panic!("expected the program to run, got {:#?}", messages.errors),
    }
}

fn expect_failure<T>(result: Result<T, CompilerMessages>) -> CompilerMessages {
    match result {
        Ok(_) => panic!("expected the command to fail"),
        Err(messages) => messages,
    }
}

#[test]
fn check_accepts_several_files() {
    let command = get_command(&args(&["check", "a.json", "b.toml"])).expect("command should parse");
    assert_eq!(
        command,
        Command::Check(vec![PathBuf::from("a.json"), PathBuf::from("b.toml")])
    );
}

#[test]
fn flag_values_are_not_taken_as_paths() {
    let arguments = args(&["run", "--config", "ci.toml", "main.json", "--entry", "start"]);

    let command = get_command(&arguments).expect("command should parse");
    assert_eq!(
        command,
        Command::Run {
            path: PathBuf::from("main.json"),
            entry: Some(String::from("start")),
        }
    );

    let options = get_options(&arguments).expect("options should parse");
    assert_eq!(options.config, Some(PathBuf::from("ci.toml")));
}

#[test]
fn elaborate_reads_the_json_switch() {
    let command =
        get_command(&args(&["elaborate", "main.json", "--json"])).expect("command should parse");
    assert_eq!(
        command,
        Command::Elaborate {
            path: PathBuf::from("main.json"),
            json: true,
        }
    );
}

#[test]
fn pipeline_flags_are_collected() {
    let options = get_options(&args(&["check", "a.json", "--hide-warnings", "--show-hir"]))
        .expect("options should parse");
    assert_eq!(
        options,
        CliOptions {
            config: None,
            flags: vec![Flag::DisableWarnings, Flag::ShowHir],
        }
    );
}

#[test]
fn malformed_command_lines_are_rejected() {
    let unknown = get_command(&args(&["check", "a.json", "--wat"])).expect_err("unknown flag");
    assert!(unknown.contains("Unknown flag"));

    let missing = get_command(&args(&["run"])).expect_err("missing path");
    assert!(missing.contains("needs a program file"));

    let two = get_command(&args(&["elaborate", "a.json", "b.json"])).expect_err("two paths");
    assert!(two.contains("exactly one"));

    let entry = get_command(&args(&["run", "a.json", "--entry"])).expect_err("missing entry");
    assert!(entry.contains("Missing value for --entry"));

    let invalid = get_command(&args(&["build", "a.json"])).expect_err("invalid command");
    assert!(invalid.contains("Invalid command"));

    let empty_check = get_command(&args(&["check"])).expect_err("nothing to check");
    assert!(empty_check.contains("at least one"));
}

#[test]
fn run_executes_the_elaborated_program() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_json_program(dir.path(), "cell.json", &cell_program());

    let result = expect_run(run_file(&path, None, &CliOptions::default()));

    assert_eq!(result.outcome, Outcome::Returned(None));
    assert_eq!(
        result.observed(),
        vec![&Value::Resource(5), &Value::Resource(5), &Value::Resource(7)]
    );
    assert_eq!(result.dropped_resources(), vec![7]);
    assert_eq!(result.husk_drops(), 1);
}

#[test]
fn run_reports_an_unknown_entry() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_json_program(dir.path(), "cell.json", &cell_program());

    let messages = expect_failure(run_file(&path, Some("start"), &CliOptions::default()));
    assert_eq!(messages.errors.len(), 1);
    assert_eq!(messages.errors[0].error_type, ErrorType::Runtime);
}

#[test]
fn config_beside_the_program_limits_the_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_json_program(dir.path(), "cell.json", &cell_program());
    write_file(dir.path(), "derefmove.toml", "[runtime]\nmax_steps = 3\n");

    let messages = expect_failure(run_file(&path, None, &CliOptions::default()));
    assert!(messages.errors[0].msg.contains("more than 3 steps"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_json_program(dir.path(), "cell.json", &cell_program());

    let options = CliOptions {
        config: Some(dir.path().join("missing.toml")),
        flags: Vec::new(),
    };

    let messages = expect_failure(run_file(&path, None, &options));
    assert_eq!(messages.errors[0].error_type, ErrorType::File);
}

#[test]
fn elaborate_prints_text_or_json() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_json_program(dir.path(), "cell.json", &cell_program());
    let options = CliOptions::default();

    let text = match elaborate_file(&path, false, &options) {
        Ok(text) => text,
        Err(messages) => panic!("elaboration failed: {:#?}", messages.errors),
    };
    assert!(text.contains("storage(&mut c)"), "{text}");
    assert!(text.contains("drop_husk(c)"), "{text}");

    let json = match elaborate_file(&path, true, &options) {
        Ok(json) => json,
        Err(messages) => panic!("elaboration failed: {:#?}", messages.errors),
    };
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("output should be JSON");
    assert_eq!(parsed["functions"][0]["name"], "main");
    assert_eq!(parsed["stats"]["in_place_constructions"], 1);
}

#[test]
fn check_keeps_results_in_argument_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let good = write_json_program(dir.path(), "good.json", &cell_program());
    let bad = write_json_program(dir.path(), "bad.json", &use_after_move_program());
    let missing = dir.path().join("missing.json");

    let results = compile_programs(&[good, bad, missing], None, &[]);

    assert!(results[0].is_ok());
    assert!(matches!(
        &results[1],
        Err(messages) if messages.errors[0].error_type == ErrorType::UseOfMovedValue
    ));
    assert!(matches!(
        &results[2],
        Err(messages) if messages.errors[0].error_type == ErrorType::File
    ));

    let messages = collect_messages(results, true);
    assert_eq!(messages.errors.len(), 2);
}
